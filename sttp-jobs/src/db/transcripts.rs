//! Canonical transcript sink
//!
//! Write-only from the pipeline's point of view. Rows are keyed by the
//! remote task id they were derived from, so normalizing the same job
//! again replaces its row instead of adding another.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use sttp_common::db::retry_on_lock;
use sttp_common::{Error, Result};

use crate::models::CanonicalTranscript;

/// Destination for normalized transcripts
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn write(&self, transcript: &CanonicalTranscript) -> Result<()>;
}

/// SQLite-backed transcript sink
#[derive(Clone)]
pub struct SqliteTranscriptStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteTranscriptStore {
    /// Bind to `pool`, creating the table if needed
    pub async fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS canonical_transcripts (
                source_task_id TEXT PRIMARY KEY,
                technology TEXT NOT NULL,
                model TEXT NOT NULL,
                file_name TEXT NOT NULL,
                convo_id TEXT NOT NULL,
                ambient_variant TEXT NOT NULL,
                processed_volume TEXT NOT NULL,
                text TEXT NOT NULL,
                raw_transcript_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!("Transcript table initialized (canonical_transcripts)");

        Ok(Self {
            pool,
            max_lock_wait_ms,
        })
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM canonical_transcripts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Merged text stored for a task, if any
    pub async fn text_for_task(&self, task_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT text FROM canonical_transcripts WHERE source_task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("text")))
    }
}

#[async_trait]
impl TranscriptSink for SqliteTranscriptStore {
    async fn write(&self, transcript: &CanonicalTranscript) -> Result<()> {
        let created_at = transcript.created_at.to_rfc3339();

        retry_on_lock("write transcript", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO canonical_transcripts (
                    source_task_id, technology, model, file_name, convo_id,
                    ambient_variant, processed_volume, text, raw_transcript_data, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_task_id) DO UPDATE SET
                    technology = excluded.technology,
                    model = excluded.model,
                    text = excluded.text,
                    raw_transcript_data = excluded.raw_transcript_data
                "#,
            )
            .bind(&transcript.source_task_id)
            .bind(&transcript.technology)
            .bind(&transcript.model)
            .bind(&transcript.file_name)
            .bind(&transcript.convo_id)
            .bind(&transcript.ambient_variant)
            .bind(&transcript.processed_volume)
            .bind(&transcript.text)
            .bind(&transcript.raw_transcript_data)
            .bind(&created_at)
            .execute(&self.pool)
            .await?;
            Ok::<(), Error>(())
        })
        .await
    }
}
