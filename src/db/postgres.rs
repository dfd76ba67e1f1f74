use super::{
    CommentStore, IdentityStore, Lookup, Store, StoreError, StoreResult, ThreadStore,
};
use crate::models::comment::{Comment, NewComment};
use crate::models::thread::{ContentUpdate, NewThread, Thread, ThreadFilter};
use crate::models::user::{NewUser, User};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use uuid::Uuid;

const THREAD_COLUMNS: &str = "id, title, content, tags, creator_id, created_timestamp, updated_timestamp";
const COMMENT_COLUMNS: &str = "id, content, thread_id, creator_id, created_timestamp, updated_timestamp";

/// Postgres-backed store.
///
/// This is the only place in the crate that knows about SQLSTATE codes. Everything
/// above it sees `Lookup` and `ConstraintViolation`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and runs the embedded migrations.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            // Fail the request instead of hanging forever if the pool is exhausted.
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

/// Translates driver errors into the store's vocabulary.
///
/// 23505 = unique_violation, 23503 = foreign_key_violation. Anything else is a backend
/// failure and will end up as a 500.
fn map_err(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        let field = db_err.constraint().map(constraint_field).unwrap_or_default();
        match db_err.code().as_deref() {
            Some("23505") => return StoreError::unique(&field),
            Some("23503") => return StoreError::foreign_key(&field),
            _ => {}
        }
    }
    StoreError::Backend(err.into())
}

/// Pulls the column name out of a Postgres default constraint name.
///
/// `users_username_key` -> `username`, `comments_thread_id_fkey` -> `thread_id`.
fn constraint_field(constraint: &str) -> String {
    let trimmed = constraint
        .strip_suffix("_fkey")
        .or_else(|| constraint.strip_suffix("_key"))
        .unwrap_or(constraint);

    trimmed
        .split_once('_')
        .map(|(_table, column)| column)
        .unwrap_or(trimmed)
        .to_string()
}

fn deleted(rows_affected: u64) -> Lookup<()> {
    if rows_affected == 0 {
        Lookup::NotFound
    } else {
        Lookup::Found(())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, created_timestamp
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Lookup<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_timestamp FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map(Lookup::from)
        .map_err(map_err)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Lookup<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_timestamp FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map(Lookup::from)
        .map_err(map_err)
    }
}

#[async_trait]
impl ThreadStore for PgStore {
    async fn create_thread(&self, thread: NewThread) -> StoreResult<Thread> {
        let query = format!(
            "INSERT INTO threads (title, content, tags, creator_id) VALUES ($1, $2, $3, $4) RETURNING {THREAD_COLUMNS}"
        );
        sqlx::query_as::<_, Thread>(&query)
            .bind(&thread.title)
            .bind(&thread.content)
            .bind(&thread.tags)
            .bind(thread.creator_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_thread(&self, id: i64) -> StoreResult<Lookup<Thread>> {
        let query = format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = $1");
        sqlx::query_as::<_, Thread>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(Lookup::from)
            .map_err(map_err)
    }

    async fn thread_owner(&self, id: i64) -> StoreResult<Lookup<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT creator_id FROM threads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(Lookup::from)
            .map_err(map_err)
    }

    async fn update_thread_content(&self, id: i64, content: &str) -> StoreResult<Lookup<ContentUpdate>> {
        sqlx::query_as::<_, ContentUpdate>(
            r#"
            UPDATE threads
            SET content = $2, updated_timestamp = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING content, updated_timestamp
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .map(Lookup::from)
        .map_err(map_err)
    }

    async fn delete_thread(&self, id: i64) -> StoreResult<Lookup<()>> {
        sqlx::query("DELETE FROM threads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| deleted(res.rows_affected()))
            .map_err(map_err)
    }

    async fn list_threads(&self, filter: &ThreadFilter, offset: i64, limit: i64) -> StoreResult<Vec<Thread>> {
        // `tags @> '{}'` is true for every row, so no tags means no filtering.
        let query = format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE tags @> $1 ORDER BY updated_timestamp DESC, id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Thread>(&query)
            .bind(&filter.tags)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn count_threads(&self, filter: &ThreadFilter) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM threads WHERE tags @> $1")
            .bind(&filter.tags)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let query = format!(
            "INSERT INTO comments (content, thread_id, creator_id) VALUES ($1, $2, $3) RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(&comment.content)
            .bind(comment.thread_id)
            .bind(comment.creator_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn comment_owner(&self, id: i64) -> StoreResult<Lookup<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT creator_id FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map(Lookup::from)
            .map_err(map_err)
    }

    async fn update_comment_content(&self, id: i64, content: &str) -> StoreResult<Lookup<ContentUpdate>> {
        sqlx::query_as::<_, ContentUpdate>(
            r#"
            UPDATE comments
            SET content = $2, updated_timestamp = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING content, updated_timestamp
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .map(Lookup::from)
        .map_err(map_err)
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<Lookup<()>> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| deleted(res.rows_affected()))
            .map_err(map_err)
    }

    async fn list_comments(&self, thread_id: i64, offset: i64, limit: i64) -> StoreResult<Vec<Comment>> {
        let query = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE thread_id = $1 ORDER BY created_timestamp ASC, id ASC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Comment>(&query)
            .bind(thread_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn count_comments(&self, thread_id: i64) -> StoreResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE thread_id = $1")
            .bind(thread_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        // `SELECT 1` is the cheapest way to prove the pool can hand out a live connection.
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_err)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("users_username_key", "username")]
    #[case("comments_thread_id_fkey", "thread_id")]
    #[case("threads_creator_id_fkey", "creator_id")]
    #[case("custom", "custom")]
    fn extracts_column_from_constraint_name(#[case] constraint: &str, #[case] field: &str) {
        assert_eq!(constraint_field(constraint), field);
    }

    #[test]
    fn non_database_errors_are_backend_failures() {
        let err = map_err(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
