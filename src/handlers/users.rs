use crate::error::AppError;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::user::{AccountInfo, UserInfo};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation("Invalid user ID"))
}

/// Public profile: id and username, nothing else.
///
/// Frontends use this to show who wrote a thread or comment, since those only carry
/// the creator's id.
pub async fn get_user_info(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserInfo>, AppError> {
    let id = parse_user_id(&user_id)?;
    let user = state.db.find_user(id).await?.found_or(AppError::NotFound("user"))?;
    Ok(Json(UserInfo::from(&user)))
}

/// Owner-only account view. Nobody else gets to see it, not even whether it exists.
pub async fn get_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<String>,
) -> Result<Json<AccountInfo>, AppError> {
    user.authorize_path(&user_id)?;

    // The resolver already proved the account exists, but it may have gone since.
    let account = state
        .db
        .find_user(user.user_id)
        .await?
        .found_or(AppError::NotFound("user"))?;

    Ok(Json(AccountInfo::from(&account)))
}
