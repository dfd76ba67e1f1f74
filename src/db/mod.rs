//! Storage contracts.
//!
//! Handlers and the auth layer only ever talk to these traits. Which backend sits
//! behind them (Postgres in prod, memory for local runs and tests) is decided once
//! in `main`.

pub mod memory;
pub mod postgres;

use crate::models::comment::{Comment, NewComment};
use crate::models::thread::{ContentUpdate, NewThread, Thread, ThreadFilter};
use crate::models::user::{NewUser, User};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of a point lookup.
///
/// "No such row" is a perfectly normal answer, not a failure, so it gets its own
/// variant instead of hiding inside `StoreError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    /// Turns `NotFound` into an error of the caller's choosing.
    pub fn found_or<E>(self, err: E) -> Result<T, E> {
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Err(err),
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotFound, Self::Found)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
}

/// A write bounced off a schema constraint. `field` is the column involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    pub field: String,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
        };
        write!(f, "{kind} constraint violated on `{}`", self.field)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Constraint(ConstraintViolation),

    /// Connection drops, timeouts, bad SQL... anything the caller can't act on.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn unique(field: &str) -> Self {
        Self::Constraint(ConstraintViolation {
            kind: ConstraintKind::Unique,
            field: field.to_string(),
        })
    }

    pub fn foreign_key(field: &str) -> Self {
        Self::Constraint(ConstraintViolation {
            kind: ConstraintKind::ForeignKey,
            field: field.to_string(),
        })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Accounts. The auth layer only needs `find_user` (existence check);
/// registration and login use the rest.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fails with a unique violation on `username` if the name is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Lookup<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Lookup<User>>;
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn create_thread(&self, thread: NewThread) -> StoreResult<Thread>;
    async fn get_thread(&self, id: i64) -> StoreResult<Lookup<Thread>>;
    async fn thread_owner(&self, id: i64) -> StoreResult<Lookup<Uuid>>;
    /// Replaces the content and bumps `updated_timestamp`.
    async fn update_thread_content(&self, id: i64, content: &str) -> StoreResult<Lookup<ContentUpdate>>;
    async fn delete_thread(&self, id: i64) -> StoreResult<Lookup<()>>;
    /// Most recently updated first.
    async fn list_threads(&self, filter: &ThreadFilter, offset: i64, limit: i64) -> StoreResult<Vec<Thread>>;
    async fn count_threads(&self, filter: &ThreadFilter) -> StoreResult<i64>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Fails with a foreign key violation on `thread_id` if the thread is gone.
    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn comment_owner(&self, id: i64) -> StoreResult<Lookup<Uuid>>;
    async fn update_comment_content(&self, id: i64, content: &str) -> StoreResult<Lookup<ContentUpdate>>;
    async fn delete_comment(&self, id: i64) -> StoreResult<Lookup<()>>;
    /// Oldest first.
    async fn list_comments(&self, thread_id: i64, offset: i64, limit: i64) -> StoreResult<Vec<Comment>>;
    async fn count_comments(&self, thread_id: i64) -> StoreResult<i64>;
}

/// Everything the HTTP layer needs from a backend.
#[async_trait]
pub trait Store: IdentityStore + ThreadStore + CommentStore {
    /// Cheap liveness probe for `/health`.
    async fn ping(&self) -> StoreResult<()>;

    /// Short name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;
}

pub type DB = Arc<dyn Store>;

/// Picks a backend from the configured database URL.
///
/// With a URL we connect to Postgres and run migrations. Without one we fall back to
/// the in-memory store, which loses everything on restart. Fine for poking at the API,
/// useless for anything else.
pub async fn connect(database_url: Option<&str>) -> anyhow::Result<DB> {
    match database_url {
        Some(url) => Ok(Arc::new(PgStore::connect(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL is not set, using the in-memory store (data will not persist)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
