use crate::db::{ConstraintKind, Lookup, StoreError};
use crate::error::{AppError, AuthFailure};
use crate::middleware::auth::{logout_cookie, session_cookie};
use crate::middleware::validated::ValidJson;
use crate::models::user::{AuthResponse, Credentials, NewUser, UserInfo};
use crate::state::AppState;
use crate::utils::auth::{hash_password, verify_password};
use crate::utils::validation::Validate;
use anyhow::Context;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use uuid::Uuid;

/// Creates an account.
///
/// Validation happens in `ValidJson` before anything else. The identity is generated
/// here, once, and never changes. Username uniqueness is left to the store: checking
/// first and inserting second would just race.
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<Credentials>,
) -> Result<(StatusCode, Json<UserInfo>), AppError> {
    // 1. Hash password
    let password_hash = hash_password(&payload.password)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    // 2. Create user
    let created = state
        .db
        .create_user(NewUser {
            id: Uuid::new_v4(),
            username: payload.username,
            password_hash,
        })
        .await
        .map_err(|e| match e {
            StoreError::Constraint(v) if v.kind == ConstraintKind::Unique && v.field == "username" => {
                AppError::Conflict("Username is already taken".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(user_id = %created.id, username = %created.username, "account created");

    Ok((StatusCode::CREATED, Json(UserInfo::from(&created))))
}

/// Checks a username/password pair and hands back a session cookie.
///
/// Every way this can fail from the client's side (bad input, unknown user, wrong
/// password) produces the same 401 so the endpoint can't be used to enumerate accounts.
/// Only a body that isn't JSON at all gets a 400.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::validation(format!("Failed to parse from JSON: {}", rejection.body_text()))
    })?;

    let bad_login = AppError::Unauthenticated(AuthFailure::BadLogin);

    // A name that could never have been registered can't log in either. Skip the store.
    if payload.validate().is_err() {
        return Err(bad_login);
    }

    // 1. Fetch user
    let user = match state.db.find_user_by_username(&payload.username).await? {
        Lookup::Found(user) => user,
        Lookup::NotFound => return Err(bad_login),
    };

    // 2. Verify password
    let matches = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash for {} is unreadable: {e}", user.id))?;
    if !matches {
        return Err(bad_login);
    }

    // 3. Issue the credential
    let issued = state
        .tokens
        .issue(user.id)
        .context("failed to issue session token")?;

    let jar = jar.add(session_cookie(&issued, state.config.production));

    Ok((
        jar,
        Json(AuthResponse {
            id: user.id,
            username: user.username,
            expires_at: issued.expires_at,
        }),
    ))
}

/// Clears the session cookie.
///
/// Tokens aren't tracked server-side, so this is purely a client-side logout: a copy
/// of the token captured elsewhere stays valid until it expires.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    (jar.add(logout_cookie(state.config.production)), Json(json!({})))
}
