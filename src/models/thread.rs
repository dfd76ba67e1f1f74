use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Thread {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub creator_id: Uuid,
    pub created_timestamp: DateTime<Utc>,
    pub updated_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewThread {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub creator_id: Uuid,
}

/// Body of `POST /threads`.
#[derive(Debug, Deserialize)]
pub struct ThreadPayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `PATCH /threads/{id}/content` and `PATCH /comments/{id}/content`.
#[derive(Debug, Deserialize)]
pub struct ContentPayload {
    pub content: String,
}

/// What a content update hands back: the new content and the bumped timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ContentUpdate {
    pub content: String,
    pub updated_timestamp: DateTime<Utc>,
}

/// Filter for the thread listing. An empty tag list matches everything.
#[derive(Debug, Clone, Default)]
pub struct ThreadFilter {
    pub tags: Vec<String>,
}

impl ThreadFilter {
    pub fn matches(&self, thread: &Thread) -> bool {
        self.tags.iter().all(|tag| thread.tags.contains(tag))
    }
}
