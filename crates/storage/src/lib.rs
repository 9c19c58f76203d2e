use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Comment, CommentId, NewComment, PostId};

const IN_MEMORY_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedComment {
    pub comment_id: CommentId,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to an in-memory url opens its own empty database.
        let max_connections = if database_url.starts_with(IN_MEMORY_URL) {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to apply storage migrations")?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn insert_comment(&self, comment: &NewComment) -> Result<InsertedComment> {
        let created_at = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO comments (post_id, author, content, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(comment.post_id.as_str())
        .bind(&comment.author)
        .bind(&comment.content)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert comment for post '{}'", comment.post_id))?;
        Ok(InsertedComment {
            comment_id: CommentId(rec.get::<i64, _>(0)),
            created_at,
        })
    }

    /// Comments for one post, oldest first. Unknown posts yield an empty list.
    pub async fn list_comments_for_post(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, post_id, author, content, created_at
             FROM comments
             WHERE post_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(post_id.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list comments for post '{post_id}'"))?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn count_comments_for_post(&self, post_id: &PostId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(post_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn load_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM client_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load setting '{key}'"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn save_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO client_settings (key, value, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save setting '{key}'"))?;
        Ok(())
    }
}

fn comment_from_row(r: &SqliteRow) -> Comment {
    Comment {
        id: CommentId(r.get::<i64, _>(0)),
        post_id: PostId(r.get::<String, _>(1)),
        author: r.get::<String, _>(2),
        content: r.get::<String, _>(3),
        created_at: r.get::<DateTime<Utc>, _>(4),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

/// Filesystem path behind a sqlite url, if it has one.
pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(IN_MEMORY_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
