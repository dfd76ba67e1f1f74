use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub thread_id: i64,
    pub creator_id: Uuid,
    pub created_timestamp: DateTime<Utc>,
    pub updated_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub thread_id: i64,
    pub creator_id: Uuid,
}

/// Body of `POST /comments`.
#[derive(Debug, Deserialize)]
pub struct CommentPayload {
    pub content: String,
    pub thread_id: i64,
}
