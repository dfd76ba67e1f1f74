use crate::error::AppError;
use crate::middleware::auth::resolve;
use crate::middleware::validated::ValidJson;
use crate::models::thread::{ContentPayload, ContentUpdate, NewThread, Thread, ThreadFilter, ThreadPayload};
use crate::state::AppState;
use crate::utils::pagination::{Page, PageRequest};
use crate::utils::validation::{parse_resource_id, parse_tag_filter};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use std::collections::HashMap;

/// Starts a new thread owned by the caller.
///
/// The creator is always the authenticated caller. There is no way to post on
/// someone else's behalf.
pub async fn create_thread(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<ThreadPayload>,
) -> Result<(StatusCode, Json<Thread>), AppError> {
    let caller = resolve(&state.tokens, &*state.db, &jar).await?;

    let thread = state
        .db
        .create_thread(NewThread {
            title: payload.title,
            content: payload.content,
            tags: payload.tags,
            creator_id: caller.user_id,
        })
        .await?;

    tracing::debug!(thread_id = thread.id, creator = %caller.user_id, "thread created");

    Ok((StatusCode::CREATED, Json(thread)))
}

/// Lists threads, most recently updated first.
///
/// Query parameters:
/// - tags: comma separated, a thread must carry all of them
/// - page / limit: see `PageRequest`
///
/// The total number of matching threads goes in `x-total-count`. An empty page is a
/// 204, not an error.
pub async fn list_threads(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Page<Thread>, AppError> {
    let filter = ThreadFilter {
        tags: parse_tag_filter(params.get("tags").map(String::as_str))?,
    };
    let page = PageRequest::plan(
        params.get("page").map(String::as_str),
        params.get("limit").map(String::as_str),
    )?;

    let items = state.db.list_threads(&filter, page.offset(), page.limit).await?;
    let total = state.db.count_threads(&filter).await?;

    Ok(Page { items, total })
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Thread>, AppError> {
    let id = parse_resource_id(&thread_id, "thread")?;
    let thread = state
        .db
        .get_thread(id)
        .await?
        .found_or(AppError::NotFound("thread"))?;
    Ok(Json(thread))
}

/// Replaces a thread's content. Creator only.
///
/// Order matters: input is validated first (no store access), then the caller is
/// authenticated, then the thread must exist, then the caller must own it, and only
/// then is anything written.
pub async fn update_thread_content(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    jar: CookieJar,
    ValidJson(payload): ValidJson<ContentPayload>,
) -> Result<Json<ContentUpdate>, AppError> {
    let id = parse_resource_id(&thread_id, "thread")?;
    let caller = resolve(&state.tokens, &*state.db, &jar).await?;

    let owner = state
        .db
        .thread_owner(id)
        .await?
        .found_or(AppError::NotFound("thread"))?;
    caller.authorize(owner)?;

    // Could still be gone if it was deleted between the owner check and now.
    let updated = state
        .db
        .update_thread_content(id, &payload.content)
        .await?
        .found_or(AppError::NotFound("thread"))?;

    Ok(Json(updated))
}

/// Deletes a thread. Creator only. Same ordering as the content update.
pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    jar: CookieJar,
) -> Result<StatusCode, AppError> {
    let id = parse_resource_id(&thread_id, "thread")?;
    let caller = resolve(&state.tokens, &*state.db, &jar).await?;

    let owner = state
        .db
        .thread_owner(id)
        .await?
        .found_or(AppError::NotFound("thread"))?;
    caller.authorize(owner)?;

    state
        .db
        .delete_thread(id)
        .await?
        .found_or(AppError::NotFound("thread"))?;

    tracing::debug!(thread_id = id, "thread deleted");

    Ok(StatusCode::NO_CONTENT)
}
