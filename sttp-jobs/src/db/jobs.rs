//! Job record store
//!
//! The [`JobStore`] trait is the seam the pipeline phases work against;
//! [`SqliteJobStore`] is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use sttp_common::db::retry_on_lock;
use sttp_common::{Error, Result};
use uuid::Uuid;

use crate::models::{DownloadStatus, JobRecord, SentStatus, ServerStatus};

/// Conjunctive filter over job records; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub sent_status: Option<SentStatus>,
    /// Any of these; empty matches every status
    pub server_statuses: Vec<ServerStatus>,
    pub download_status: Option<DownloadStatus>,
    pub file_name: Option<String>,
}

impl JobFilter {
    /// Delivered jobs the reconciler still polls
    pub fn awaiting_server() -> Self {
        Self {
            sent_status: Some(SentStatus::Delivered),
            server_statuses: vec![ServerStatus::Pending, ServerStatus::Running],
            ..Self::default()
        }
    }

    /// Finished jobs whose transcript was not fetched yet
    pub fn awaiting_download() -> Self {
        Self {
            sent_status: Some(SentStatus::Delivered),
            server_statuses: vec![ServerStatus::Done],
            download_status: Some(DownloadStatus::NotStarted),
            ..Self::default()
        }
    }

    /// Delivered jobs the service rejected
    pub fn rejected() -> Self {
        Self {
            sent_status: Some(SentStatus::Delivered),
            server_statuses: vec![ServerStatus::Rejected],
            ..Self::default()
        }
    }

    /// Delivered jobs for one artifact
    pub fn delivered_file(file_name: &str) -> Self {
        Self {
            sent_status: Some(SentStatus::Delivered),
            file_name: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    /// In-memory evaluation, same semantics as the SQL rendering
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.sent_status.map_or(true, |s| record.sent_status == s)
            && (self.server_statuses.is_empty()
                || self.server_statuses.contains(&record.server_status))
            && self
                .download_status
                .map_or(true, |s| record.download_status == s)
            && self
                .file_name
                .as_ref()
                .map_or(true, |name| &record.file_name == name)
    }
}

/// Filterable, partially updatable collection of job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Append a new record
    async fn insert(&self, record: &JobRecord) -> Result<()>;

    /// Records matching `filter`, oldest first
    async fn find(&self, filter: &JobFilter) -> Result<Vec<JobRecord>>;

    /// Every record, oldest first
    async fn find_all(&self) -> Result<Vec<JobRecord>> {
        self.find(&JobFilter::default()).await
    }

    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<JobRecord>>;

    /// Set `server_status` of a delivered, still-polled job
    ///
    /// Returns `false` when no row qualified (unknown id, or the job already
    /// left PENDING/RUNNING).
    async fn update_server_status(&self, task_id: &str, status: ServerStatus) -> Result<bool>;

    /// Store the payload and mark the download COMPLETED in one update
    ///
    /// Only applies to DONE jobs still NOT_STARTED; returns `false` otherwise.
    async fn complete_download(&self, task_id: &str, raw_transcript_data: &str) -> Result<bool>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<()>;
}

const SELECT_COLUMNS: &str = r#"
    SELECT guid, task_id, file_name, convo_id, ambient_variant, processed_volume,
           sent_status, server_status, download_status, raw_transcript_data,
           created_at, updated_at
    FROM transcription_jobs
"#;

/// SQLite-backed job store
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteJobStore {
    /// Bind to `pool`, creating the table if needed
    pub async fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Result<Self> {
        let store = Self {
            pool,
            max_lock_wait_ms,
        };
        store.init_table().await?;
        Ok(store)
    }

    async fn init_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transcription_jobs (
                guid TEXT PRIMARY KEY,
                task_id TEXT UNIQUE,
                file_name TEXT NOT NULL,
                convo_id TEXT NOT NULL,
                ambient_variant TEXT NOT NULL,
                processed_volume TEXT NOT NULL,
                sent_status TEXT NOT NULL,
                server_status TEXT NOT NULL,
                download_status TEXT NOT NULL,
                raw_transcript_data TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transcription_jobs_status \
             ON transcription_jobs (sent_status, server_status, download_status)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transcription_jobs_file_name \
             ON transcription_jobs (file_name)",
        )
        .execute(&self.pool)
        .await?;

        tracing::debug!("Job table initialized (transcription_jobs)");
        Ok(())
    }

    /// Count records grouped by all three status dimensions
    pub async fn count_by_status(&self) -> Result<Vec<(SentStatus, ServerStatus, DownloadStatus, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT sent_status, server_status, download_status, COUNT(*) AS n
            FROM transcription_jobs
            GROUP BY sent_status, server_status, download_status
            ORDER BY sent_status, server_status, download_status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok::<_, Error>((
                    parse_column(row, "sent_status")?,
                    parse_column(row, "server_status")?,
                    parse_column(row, "download_status")?,
                    row.get::<i64, _>("n"),
                ))
            })
            .collect()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, record: &JobRecord) -> Result<()> {
        let guid = record.guid.to_string();
        let created_at = record.created_at.to_rfc3339();
        let updated_at = record.updated_at.to_rfc3339();

        retry_on_lock("insert job", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO transcription_jobs (
                    guid, task_id, file_name, convo_id, ambient_variant, processed_volume,
                    sent_status, server_status, download_status, raw_transcript_data,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&guid)
            .bind(&record.task_id)
            .bind(&record.file_name)
            .bind(&record.convo_id)
            .bind(&record.ambient_variant)
            .bind(&record.processed_volume)
            .bind(record.sent_status.as_str())
            .bind(record.server_status.as_str())
            .bind(record.download_status.as_str())
            .bind(&record.raw_transcript_data)
            .bind(&created_at)
            .bind(&updated_at)
            .execute(&self.pool)
            .await?;
            Ok::<(), Error>(())
        })
        .await
    }

    async fn find(&self, filter: &JobFilter) -> Result<Vec<JobRecord>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        query.push(" WHERE 1 = 1");

        if let Some(sent) = filter.sent_status {
            query.push(" AND sent_status = ").push_bind(sent.as_str());
        }
        if !filter.server_statuses.is_empty() {
            query.push(" AND server_status IN (");
            let mut statuses = query.separated(", ");
            for status in &filter.server_statuses {
                statuses.push_bind(status.as_str());
            }
            statuses.push_unseparated(")");
        }
        if let Some(download) = filter.download_status {
            query.push(" AND download_status = ").push_bind(download.as_str());
        }
        if let Some(file_name) = &filter.file_name {
            query.push(" AND file_name = ").push_bind(file_name.clone());
        }
        query.push(" ORDER BY created_at, rowid");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn find_by_task_id(&self, task_id: &str) -> Result<Option<JobRecord>> {
        let sql = format!("{} WHERE task_id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn update_server_status(&self, task_id: &str, status: ServerStatus) -> Result<bool> {
        let updated_at = Utc::now().to_rfc3339();

        let rows_affected = retry_on_lock("update server status", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                r#"
                UPDATE transcription_jobs
                SET server_status = ?, updated_at = ?
                WHERE task_id = ?
                  AND sent_status = 'DELIVERED'
                  AND server_status IN ('PENDING', 'RUNNING')
                "#,
            )
            .bind(status.as_str())
            .bind(&updated_at)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
            Ok::<u64, Error>(result.rows_affected())
        })
        .await?;

        Ok(rows_affected > 0)
    }

    async fn complete_download(&self, task_id: &str, raw_transcript_data: &str) -> Result<bool> {
        if raw_transcript_data.is_empty() {
            return Err(Error::InvalidInput(format!(
                "empty transcript payload for task {}",
                task_id
            )));
        }
        let updated_at = Utc::now().to_rfc3339();

        let rows_affected = retry_on_lock("complete download", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                r#"
                UPDATE transcription_jobs
                SET raw_transcript_data = ?, download_status = 'COMPLETED', updated_at = ?
                WHERE task_id = ?
                  AND server_status = 'DONE'
                  AND download_status = 'NOT_STARTED'
                "#,
            )
            .bind(raw_transcript_data)
            .bind(&updated_at)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
            Ok::<u64, Error>(result.rows_affected())
        })
        .await?;

        Ok(rows_affected > 0)
    }

    async fn ping(&self) -> Result<()> {
        sttp_common::db::ping(&self.pool).await
    }
}

fn parse_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(column);
    raw.parse::<T>()
        .map_err(|e| Error::Internal(format!("column {}: {}", column, e)))
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.get(column);
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<JobRecord> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("Failed to parse guid: {}", e)))?;

    Ok(JobRecord {
        guid,
        task_id: row.get("task_id"),
        file_name: row.get("file_name"),
        convo_id: row.get("convo_id"),
        ambient_variant: row.get("ambient_variant"),
        processed_volume: row.get("processed_volume"),
        sent_status: parse_column(row, "sent_status")?,
        server_status: parse_column(row, "server_status")?,
        download_status: parse_column(row, "download_status")?,
        raw_transcript_data: row.get("raw_transcript_data"),
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactName;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteJobStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        SqliteJobStore::new(pool, 1000).await.unwrap()
    }

    fn delivered(name: &str, task_id: &str) -> JobRecord {
        JobRecord::delivered(&ArtifactName::parse(name).unwrap(), task_id.to_string())
    }

    #[tokio::test]
    async fn test_insert_and_load_round_trip() {
        let store = store().await;
        let record = delivered("C7_forest_40.wav", "abc123");

        store.insert(&record).await.unwrap();
        let loaded = store.find_by_task_id("abc123").await.unwrap().unwrap();

        assert_eq!(loaded.guid, record.guid);
        assert_eq!(loaded.file_name, "C7_forest_40.wav");
        assert_eq!(loaded.sent_status, SentStatus::Delivered);
        assert_eq!(loaded.server_status, ServerStatus::Pending);
        assert_eq!(loaded.download_status, DownloadStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_failed_records_share_null_task_id() {
        let store = store().await;
        let artifact = ArtifactName::parse("C7_forest_40.wav").unwrap();

        store.insert(&JobRecord::failed(&artifact)).await.unwrap();
        store.insert(&JobRecord::failed(&artifact)).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.task_id.is_none()));
    }

    #[tokio::test]
    async fn test_filters_select_phase_inputs() {
        let store = store().await;
        store.insert(&delivered("C1_a_1.wav", "t1")).await.unwrap();
        store.insert(&delivered("C2_a_1.wav", "t2")).await.unwrap();
        store
            .insert(&JobRecord::failed(&ArtifactName::parse("C3_a_1.wav").unwrap()))
            .await
            .unwrap();

        store.update_server_status("t2", ServerStatus::Done).await.unwrap();

        let awaiting = store.find(&JobFilter::awaiting_server()).await.unwrap();
        assert_eq!(awaiting.len(), 1);
        assert_eq!(awaiting[0].task_id.as_deref(), Some("t1"));

        let downloads = store.find(&JobFilter::awaiting_download()).await.unwrap();
        assert_eq!(downloads.len(), 1);
        assert_eq!(downloads[0].task_id.as_deref(), Some("t2"));

        for record in store.find_all().await.unwrap() {
            assert_eq!(
                JobFilter::awaiting_server().matches(&record),
                awaiting.iter().any(|r| r.guid == record.guid)
            );
        }
    }

    #[tokio::test]
    async fn test_server_status_update_leaves_terminal_rows_alone() {
        let store = store().await;
        store.insert(&delivered("C1_a_1.wav", "t1")).await.unwrap();

        assert!(store.update_server_status("t1", ServerStatus::Rejected).await.unwrap());
        assert!(!store.update_server_status("t1", ServerStatus::Running).await.unwrap());
        assert!(!store.update_server_status("missing", ServerStatus::Done).await.unwrap());

        let record = store.find_by_task_id("t1").await.unwrap().unwrap();
        assert_eq!(record.server_status, ServerStatus::Rejected);
    }

    #[tokio::test]
    async fn test_complete_download_is_exactly_once() {
        let store = store().await;
        store.insert(&delivered("C1_a_1.wav", "t1")).await.unwrap();

        // Not DONE yet
        assert!(!store.complete_download("t1", "{}").await.unwrap());

        store.update_server_status("t1", ServerStatus::Done).await.unwrap();
        assert!(store.complete_download("t1", "first").await.unwrap());
        assert!(!store.complete_download("t1", "second").await.unwrap());

        let record = store.find_by_task_id("t1").await.unwrap().unwrap();
        assert_eq!(record.download_status, DownloadStatus::Completed);
        assert_eq!(record.raw_transcript_data, "first");
    }

    #[tokio::test]
    async fn test_complete_download_rejects_empty_payload() {
        let store = store().await;
        store.insert(&delivered("C1_a_1.wav", "t1")).await.unwrap();
        store.update_server_status("t1", ServerStatus::Done).await.unwrap();

        assert!(store.complete_download("t1", "").await.is_err());
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let store = store().await;
        store.insert(&delivered("C1_a_1.wav", "t1")).await.unwrap();
        store.insert(&delivered("C2_a_1.wav", "t2")).await.unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            vec![(
                SentStatus::Delivered,
                ServerStatus::Pending,
                DownloadStatus::NotStarted,
                2
            )]
        );
    }
}
