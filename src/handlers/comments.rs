use crate::db::{ConstraintKind, StoreError};
use crate::error::AppError;
use crate::middleware::auth::resolve;
use crate::middleware::validated::ValidJson;
use crate::models::comment::{Comment, CommentPayload, NewComment};
use crate::models::thread::{ContentPayload, ContentUpdate};
use crate::state::AppState;
use crate::utils::pagination::{Page, PageRequest};
use crate::utils::validation::parse_resource_id;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use std::collections::HashMap;

/// Adds a comment to a thread.
///
/// We don't look the thread up first. The insert itself fails on the foreign key if
/// the thread is missing, which also covers a thread deleted mid-request.
pub async fn create_comment(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<CommentPayload>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let caller = resolve(&state.tokens, &*state.db, &jar).await?;

    let comment = state
        .db
        .create_comment(NewComment {
            content: payload.content,
            thread_id: payload.thread_id,
            creator_id: caller.user_id,
        })
        .await
        .map_err(|e| match e {
            StoreError::Constraint(v) if v.kind == ConstraintKind::ForeignKey && v.field == "thread_id" => {
                AppError::NotFound("thread")
            }
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Lists a thread's comments, oldest first.
///
/// `thread_id` is required. Unlike an empty page, a thread that doesn't exist is a 404.
pub async fn list_comments(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Page<Comment>, AppError> {
    let thread_id = parse_resource_id(
        params.get("thread_id").map(String::as_str).unwrap_or_default(),
        "thread",
    )?;
    let page = PageRequest::plan(
        params.get("page").map(String::as_str),
        params.get("limit").map(String::as_str),
    )?;

    state
        .db
        .get_thread(thread_id)
        .await?
        .found_or(AppError::NotFound("thread"))?;

    let items = state.db.list_comments(thread_id, page.offset(), page.limit).await?;
    let total = state.db.count_comments(thread_id).await?;

    Ok(Page { items, total })
}

/// Replaces a comment's content. Creator only.
pub async fn update_comment_content(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<ContentPayload>,
) -> Result<Json<ContentUpdate>, AppError> {
    let id = parse_resource_id(&comment_id, "comment")?;
    let caller = resolve(&state.tokens, &*state.db, &jar).await?;

    let owner = state
        .db
        .comment_owner(id)
        .await?
        .found_or(AppError::NotFound("comment"))?;
    caller.authorize(owner)?;

    let updated = state
        .db
        .update_comment_content(id, &payload.content)
        .await?
        .found_or(AppError::NotFound("comment"))?;

    Ok(Json(updated))
}

/// Deletes a comment. Creator only.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    jar: CookieJar,
) -> Result<StatusCode, AppError> {
    let id = parse_resource_id(&comment_id, "comment")?;
    let caller = resolve(&state.tokens, &*state.db, &jar).await?;

    let owner = state
        .db
        .comment_owner(id)
        .await?
        .found_or(AppError::NotFound("comment"))?;
    caller.authorize(owner)?;

    state
        .db
        .delete_comment(id)
        .await?
        .found_or(AppError::NotFound("comment"))?;

    Ok(StatusCode::NO_CONTENT)
}
