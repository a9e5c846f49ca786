//! Persistent catalog of download records
//!
//! The download queue survives restarts through this narrow contract. The
//! SQLite implementation keeps one row per post in the `downloads` table and
//! stores the post metadata as JSON. Enqueue times are stored as nanoseconds
//! since the epoch so eviction order survives a reload.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;
use tracing::{debug, instrument, warn};

use crate::error::{DownloadError, Result};
use crate::models::{DownloadReason, DownloadRecord, DownloadStatus, PostSnapshot};

/// Repository trait for download records.
///
/// Write operations report whether a row was affected; callers treat
/// `Ok(false)` like an error and only log it.
#[async_trait]
pub trait DownloadCatalog: Send + Sync {
    /// Initialize the repository (create tables if needed).
    async fn initialize(&self) -> Result<()>;

    /// Insert a record, replacing any row with the same id.
    async fn insert_or_update(&self, record: &DownloadRecord) -> Result<bool>;

    /// Update an existing row. Returns `false` when no row matched.
    async fn update(&self, record: &DownloadRecord) -> Result<bool>;

    /// Delete a row by id. Returns `false` when no row matched.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// All records, oldest enqueued first.
    async fn fetch_all(&self) -> Result<Vec<DownloadRecord>>;

    async fn fetch(&self, id: &str) -> Result<Option<DownloadRecord>>;
}

/// SQLite implementation of [`DownloadCatalog`].
pub struct SqliteDownloadCatalog {
    pool: SqlitePool,
}

impl SqliteDownloadCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &SqliteRow) -> Result<DownloadRecord> {
        let id: String = row.try_get("id")?;

        let corrupt = |message: String| DownloadError::CorruptRecord {
            id: id.clone(),
            message,
        };

        let status_str: String = row.try_get("status")?;
        let status = DownloadStatus::parse(&status_str)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", status_str)))?;

        let prev_status = match row.try_get::<Option<String>, _>("prev_status")? {
            Some(s) => Some(
                DownloadStatus::parse(&s)
                    .ok_or_else(|| corrupt(format!("unknown previous status '{}'", s)))?,
            ),
            None => None,
        };

        let reason_str: String = row.try_get("reason")?;
        let reason = DownloadReason::parse(&reason_str)
            .ok_or_else(|| corrupt(format!("unknown reason '{}'", reason_str)))?;

        let post_json: String = row.try_get("post_json")?;
        let post: PostSnapshot = serde_json::from_str(&post_json)?;

        let post_id: String = row.try_get("post_id")?;
        if post_id != post.id {
            return Err(corrupt(format!(
                "post_id '{}' does not match stored post '{}'",
                post_id, post.id
            )));
        }

        let enqueued_at = Utc.timestamp_nanos(row.try_get("enqueued_at_ns")?);

        let local_file = row
            .try_get::<Option<String>, _>("file_path")?
            .map(PathBuf::from);
        match (status, &local_file) {
            (DownloadStatus::Success, None) => {
                return Err(corrupt("completed download has no file".to_string()));
            }
            (other, Some(path)) if other != DownloadStatus::Success => {
                return Err(corrupt(format!(
                    "{} download has file '{}'",
                    other,
                    path.display()
                )));
            }
            _ => {}
        }

        let attempts: i64 = row.try_get("attempts")?;

        Ok(DownloadRecord {
            id: id.clone(),
            post,
            status,
            prev_status,
            reason,
            progress: row.try_get("progress")?,
            source_url: row.try_get("url")?,
            local_file,
            enqueued_at,
            attempts: attempts.max(0) as u32,
        })
    }
}

fn enqueued_at_column(record: &DownloadRecord) -> Result<i64> {
    record
        .enqueued_at
        .timestamp_nanos_opt()
        .ok_or_else(|| DownloadError::InvalidInput {
            field: "enqueued_at".to_string(),
            message: format!("{} is outside the storable range", record.enqueued_at),
        })
}

fn file_path_column(record: &DownloadRecord) -> Option<String> {
    record
        .local_file
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned())
}

#[async_trait]
impl DownloadCatalog for SqliteDownloadCatalog {
    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<()> {
        debug!("Initializing download catalog");

        let statements = [
            "CREATE TABLE IF NOT EXISTS downloads (
                id TEXT PRIMARY KEY NOT NULL,
                post_id TEXT NOT NULL,
                status TEXT NOT NULL,
                prev_status TEXT,
                reason TEXT NOT NULL,
                progress REAL NOT NULL DEFAULT 0,
                url TEXT NOT NULL,
                file_path TEXT,
                enqueued_at_ns INTEGER NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                post_json TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_downloads_reason ON downloads(reason)",
            "CREATE INDEX IF NOT EXISTS idx_downloads_enqueued_at ON downloads(enqueued_at_ns)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        debug!("Download catalog initialized");
        Ok(())
    }

    #[instrument(skip(self, record), fields(id = %record.id, status = %record.status))]
    async fn insert_or_update(&self, record: &DownloadRecord) -> Result<bool> {
        let enqueued_at = enqueued_at_column(record)?;
        let post_json = serde_json::to_string(&record.post)?;

        let result = sqlx::query(
            r#"
            INSERT INTO downloads (
                id, post_id, status, prev_status, reason, progress,
                url, file_path, enqueued_at_ns, attempts, post_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                post_id = excluded.post_id,
                status = excluded.status,
                prev_status = excluded.prev_status,
                reason = excluded.reason,
                progress = excluded.progress,
                url = excluded.url,
                file_path = excluded.file_path,
                enqueued_at_ns = excluded.enqueued_at_ns,
                attempts = excluded.attempts,
                post_json = excluded.post_json
            "#,
        )
        .bind(&record.id)
        .bind(&record.post.id)
        .bind(record.status.as_str())
        .bind(record.prev_status.map(DownloadStatus::as_str))
        .bind(record.reason.as_str())
        .bind(record.progress)
        .bind(&record.source_url)
        .bind(file_path_column(record))
        .bind(enqueued_at)
        .bind(i64::from(record.attempts))
        .bind(post_json)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, record), fields(id = %record.id, status = %record.status))]
    async fn update(&self, record: &DownloadRecord) -> Result<bool> {
        let enqueued_at = enqueued_at_column(record)?;
        let post_json = serde_json::to_string(&record.post)?;

        let result = sqlx::query(
            r#"
            UPDATE downloads SET
                post_id = ?, status = ?, prev_status = ?, reason = ?, progress = ?,
                url = ?, file_path = ?, enqueued_at_ns = ?, attempts = ?, post_json = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.post.id)
        .bind(record.status.as_str())
        .bind(record.prev_status.map(DownloadStatus::as_str))
        .bind(record.reason.as_str())
        .bind(record.progress)
        .bind(&record.source_url)
        .bind(file_path_column(record))
        .bind(enqueued_at)
        .bind(i64::from(record.attempts))
        .bind(post_json)
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query("SELECT * FROM downloads ORDER BY enqueued_at_ns ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::row_to_record(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "Skipping unreadable download row"),
            }
        }

        Ok(records)
    }

    #[instrument(skip(self))]
    async fn fetch(&self, id: &str) -> Result<Option<DownloadRecord>> {
        let row = sqlx::query("SELECT * FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }
}
