use super::{
    CommentStore, IdentityStore, Lookup, Store, StoreError, StoreResult, ThreadStore,
};
use crate::models::comment::{Comment, NewComment};
use crate::models::thread::{ContentUpdate, NewThread, Thread, ThreadFilter};
use crate::models::user::{NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store with the same observable behaviour as `PgStore`.
///
/// Used when no `DATABASE_URL` is configured, and by the test suite. Deleting a thread
/// leaves its comments alone; cascading is the Postgres schema's business.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    threads: BTreeMap<i64, Thread>,
    comments: BTreeMap<i64, Comment>,
    next_thread_id: i64,
    next_comment_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `offset`/`limit` come from the page planner and are never negative, but clamp
/// anyway so a bad caller can't panic the store.
fn window<T>(items: impl Iterator<Item = T>, offset: i64, limit: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    items.skip(offset).take(limit).collect()
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::unique("username"));
        }
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::unique("id"));
        }

        let created = User {
            id: user.id,
            username: user.username,
            password_hash: user.password_hash,
            created_timestamp: Utc::now(),
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Lookup<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned().into())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Lookup<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .into())
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn create_thread(&self, thread: NewThread) -> StoreResult<Thread> {
        let mut inner = self.inner.write().await;

        if !inner.users.contains_key(&thread.creator_id) {
            return Err(StoreError::foreign_key("creator_id"));
        }

        inner.next_thread_id += 1;
        let now = Utc::now();
        let created = Thread {
            id: inner.next_thread_id,
            title: thread.title,
            content: thread.content,
            tags: thread.tags,
            creator_id: thread.creator_id,
            created_timestamp: now,
            updated_timestamp: now,
        };
        inner.threads.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_thread(&self, id: i64) -> StoreResult<Lookup<Thread>> {
        let inner = self.inner.read().await;
        Ok(inner.threads.get(&id).cloned().into())
    }

    async fn thread_owner(&self, id: i64) -> StoreResult<Lookup<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner.threads.get(&id).map(|t| t.creator_id).into())
    }

    async fn update_thread_content(&self, id: i64, content: &str) -> StoreResult<Lookup<ContentUpdate>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .threads
            .get_mut(&id)
            .map(|thread| {
                thread.content = content.to_string();
                thread.updated_timestamp = Utc::now();
                ContentUpdate {
                    content: thread.content.clone(),
                    updated_timestamp: thread.updated_timestamp,
                }
            })
            .into())
    }

    async fn delete_thread(&self, id: i64) -> StoreResult<Lookup<()>> {
        let mut inner = self.inner.write().await;
        Ok(inner.threads.remove(&id).map(|_| ()).into())
    }

    async fn list_threads(&self, filter: &ThreadFilter, offset: i64, limit: i64) -> StoreResult<Vec<Thread>> {
        let inner = self.inner.read().await;

        let mut matching: Vec<&Thread> = inner.threads.values().filter(|t| filter.matches(t)).collect();
        matching.sort_by(|a, b| {
            b.updated_timestamp
                .cmp(&a.updated_timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(window(matching.into_iter().cloned(), offset, limit))
    }

    async fn count_threads(&self, filter: &ThreadFilter) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        Ok(count(inner.threads.values().filter(|t| filter.matches(t)).count()))
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut inner = self.inner.write().await;

        if !inner.threads.contains_key(&comment.thread_id) {
            return Err(StoreError::foreign_key("thread_id"));
        }
        if !inner.users.contains_key(&comment.creator_id) {
            return Err(StoreError::foreign_key("creator_id"));
        }

        inner.next_comment_id += 1;
        let now = Utc::now();
        let created = Comment {
            id: inner.next_comment_id,
            content: comment.content,
            thread_id: comment.thread_id,
            creator_id: comment.creator_id,
            created_timestamp: now,
            updated_timestamp: now,
        };
        inner.comments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn comment_owner(&self, id: i64) -> StoreResult<Lookup<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner.comments.get(&id).map(|c| c.creator_id).into())
    }

    async fn update_comment_content(&self, id: i64, content: &str) -> StoreResult<Lookup<ContentUpdate>> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .comments
            .get_mut(&id)
            .map(|comment| {
                comment.content = content.to_string();
                comment.updated_timestamp = Utc::now();
                ContentUpdate {
                    content: comment.content.clone(),
                    updated_timestamp: comment.updated_timestamp,
                }
            })
            .into())
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<Lookup<()>> {
        let mut inner = self.inner.write().await;
        Ok(inner.comments.remove(&id).map(|_| ()).into())
    }

    async fn list_comments(&self, thread_id: i64, offset: i64, limit: i64) -> StoreResult<Vec<Comment>> {
        let inner = self.inner.read().await;
        // BTreeMap iterates in id order, which is creation order here.
        let matching = inner.comments.values().filter(|c| c.thread_id == thread_id).cloned();
        Ok(window(matching, offset, limit))
    }

    async fn count_comments(&self, thread_id: i64) -> StoreResult<i64> {
        let inner = self.inner.read().await;
        Ok(count(inner.comments.values().filter(|c| c.thread_id == thread_id).count()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
