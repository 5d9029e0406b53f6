use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    EventData, EventId, ExpectedVersion, RecordedEvent, Result, StoreError, StreamEventsSlice,
    StreamMetadata, StreamMetadataResult, metadata_stream_name,
    store::{StreamStore, WriteResult, validate_append},
};

/// PostgreSQL-backed stream store.
///
/// Appends to one stream are serialised with a transaction-scoped advisory
/// lock keyed on the stream name; the primary key on
/// `(stream_name, event_number)` backs the version check.
#[derive(Clone)]
pub struct PostgresStreamStore {
    pool: PgPool,
}

impl PostgresStreamStore {
    /// Creates a new PostgreSQL stream store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<RecordedEvent> {
        Ok(RecordedEvent {
            stream: row.try_get("stream_name")?,
            event_number: row.try_get::<i64, _>("event_number")? as u64,
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            event_type: row.try_get("event_type")?,
            is_json: row.try_get("is_json")?,
            data: row.try_get("data")?,
            metadata: row.try_get("metadata")?,
            created: row.try_get("created_at")?,
        })
    }

    async fn lock_stream(tx: &mut Transaction<'_, Postgres>, stream: &str) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(stream)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn last_event_number(
        tx: &mut Transaction<'_, Postgres>,
        stream: &str,
    ) -> Result<Option<u64>> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(event_number) FROM stream_events WHERE stream_name = $1")
                .bind(stream)
                .fetch_one(&mut **tx)
                .await?;
        Ok(last.map(|n| n as u64))
    }
}

#[async_trait]
impl StreamStore for PostgresStreamStore {
    async fn read_stream_events_forward(
        &self,
        stream: &str,
        start: u64,
        max_count: usize,
    ) -> Result<StreamEventsSlice> {
        let last: Option<i64> =
            sqlx::query_scalar("SELECT MAX(event_number) FROM stream_events WHERE stream_name = $1")
                .bind(stream)
                .fetch_one(&self.pool)
                .await?;

        let Some(last) = last else {
            return Ok(StreamEventsSlice::not_found(stream, start));
        };

        let rows = sqlx::query(
            r#"
            SELECT stream_name, event_number, event_id, event_type, is_json, data, metadata, created_at
            FROM stream_events
            WHERE stream_name = $1 AND event_number >= $2
            ORDER BY event_number ASC
            LIMIT $3
            "#,
        )
        .bind(stream)
        .bind(start as i64)
        .bind(i64::try_from(max_count).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;

        Ok(StreamEventsSlice::found(stream, start, last as u64, events))
    }

    async fn append_to_stream(
        &self,
        stream: &str,
        expected_version: ExpectedVersion,
        events: Vec<EventData>,
    ) -> Result<WriteResult> {
        validate_append(stream, &events)?;

        let mut tx = self.pool.begin().await?;
        Self::lock_stream(&mut tx, stream).await?;

        let current = Self::last_event_number(&mut tx, stream).await?;
        if !expected_version.matches(current) {
            return Err(StoreError::WrongExpectedVersion {
                stream: stream.to_string(),
                expected: expected_version,
                actual: current,
            });
        }

        let mut next_number = current.map(|n| n + 1).unwrap_or(0);
        for event in &events {
            sqlx::query(
                r#"
                INSERT INTO stream_events (stream_name, event_number, event_id, event_type, is_json, data, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(stream)
            .bind(next_number as i64)
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.is_json)
            .bind(&event.data)
            .bind(&event.metadata)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A racing writer that slipped past the lock still trips the primary key
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("stream_events_pkey")
                {
                    return StoreError::WrongExpectedVersion {
                        stream: stream.to_string(),
                        expected: expected_version,
                        actual: current,
                    };
                }
                StoreError::Database(e)
            })?;

            next_number += 1;
        }

        tx.commit().await?;

        let last = next_number.checked_sub(1).unwrap_or_default();
        tracing::debug!(stream, last, count = events.len(), "appended events");
        Ok(WriteResult {
            next_expected_version: last,
        })
    }

    async fn set_stream_metadata(
        &self,
        stream: &str,
        expected_metastream_version: ExpectedVersion,
        metadata: &StreamMetadata,
    ) -> Result<WriteResult> {
        let metadata_json = serde_json::to_value(metadata)?;

        let mut tx = self.pool.begin().await?;
        Self::lock_stream(&mut tx, &metadata_stream_name(stream)).await?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(metastream_version) FROM stream_metadata WHERE stream_name = $1",
        )
        .bind(stream)
        .fetch_one(&mut *tx)
        .await?;
        let current = current.map(|n| n as u64);

        if !expected_metastream_version.matches(current) {
            return Err(StoreError::WrongExpectedVersion {
                stream: metadata_stream_name(stream),
                expected: expected_metastream_version,
                actual: current,
            });
        }

        let version = current.map(|n| n + 1).unwrap_or(0);
        sqlx::query(
            "INSERT INTO stream_metadata (stream_name, metastream_version, metadata) VALUES ($1, $2, $3)",
        )
        .bind(stream)
        .bind(version as i64)
        .bind(metadata_json)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(WriteResult {
            next_expected_version: version,
        })
    }

    async fn get_stream_metadata(&self, stream: &str) -> Result<Option<StreamMetadataResult>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT metastream_version, metadata
            FROM stream_metadata
            WHERE stream_name = $1
            ORDER BY metastream_version DESC
            LIMIT 1
            "#,
        )
        .bind(stream)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let metadata: serde_json::Value = row.try_get("metadata")?;
                Ok(Some(StreamMetadataResult {
                    stream: stream.to_string(),
                    metastream_version: row.try_get::<i64, _>("metastream_version")? as u64,
                    metadata: serde_json::from_value(metadata)?,
                }))
            }
            None => Ok(None),
        }
    }
}
