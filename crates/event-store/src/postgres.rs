use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    AggregateKey, Envelope, Event, EventId, EventLogError, Offset, Result, Revision, Tag,
    store::{EnvelopeStream, EventLog, validate_for_append},
};

/// Advisory lock serializing appends so that orderings become visible in
/// commit order; tag readers rely on that to never skip an event.
const APPEND_LOCK_ID: i64 = 0x6576_656e_745f_6c6f;

const UNIQUE_REVISION_CONSTRAINT: &str = "unique_aggregate_revision";

/// Tuning knobs of the PostgreSQL log.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// How long a live tail sleeps after catching up before polling again.
    pub poll_interval: Duration,
    /// Maximum number of rows fetched per tag query.
    pub batch_size: i64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            batch_size: 500,
        }
    }
}

/// PostgreSQL-backed event log.
#[derive(Clone)]
pub struct PostgresEventLog {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, PostgresConfig::default())
    }

    pub fn with_config(pool: PgPool, config: PostgresConfig) -> Self {
        Self { pool, config }
    }

    /// Opens a pool on `url`.
    pub async fn connect(url: &str, config: PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Self::with_config(pool, config))
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

    /// Closes the pool; in-flight queries finish, new ones fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_envelope(row: PgRow) -> Result<Envelope> {
        let raw_key: String = row.try_get("aggregate_key")?;
        let key = raw_key
            .parse::<AggregateKey>()
            .map_err(|e| EventLogError::InvariantViolation(format!("stored key: {e}")))?;

        Ok(Envelope::new(
            Offset::new(row.try_get("ordering")?),
            Event {
                event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
                event_type: row.try_get("event_type")?,
                key,
                revision: Revision::new(row.try_get("revision")?),
                instant: row.try_get("instant")?,
                subject: serde_json::from_value(row.try_get("subject")?)?,
                payload: row.try_get("payload")?,
            },
        ))
    }

    /// One page of envelopes under `tag` with an offset in `(after, until]`.
    async fn read_batch(&self, tag: &Tag, after: Offset, until: Option<Offset>) -> Result<Vec<Envelope>> {
        let until = until.map(|o| o.as_i64()).unwrap_or(i64::MAX);
        let rows = if tag.is_all() {
            sqlx::query(
                r#"
                SELECT ordering, event_id, event_type, aggregate_key, revision, instant, subject, payload
                FROM events
                WHERE ordering > $1 AND ordering <= $2
                ORDER BY ordering ASC
                LIMIT $3
                "#,
            )
            .bind(after.as_i64())
            .bind(until)
            .bind(self.config.batch_size)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT ordering, event_id, event_type, aggregate_key, revision, instant, subject, payload
                FROM events
                WHERE tags @> ARRAY[$1]::TEXT[] AND ordering > $2 AND ordering <= $3
                ORDER BY ordering ASC
                LIMIT $4
                "#,
            )
            .bind(tag.as_str())
            .bind(after.as_i64())
            .bind(until)
            .bind(self.config.batch_size)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(Self::row_to_envelope).collect()
    }

    async fn key_revision<'e, E>(executor: E, key: &AggregateKey) -> Result<Revision>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let revision: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(revision), 0) FROM events WHERE aggregate_key = $1",
        )
        .bind(key.to_string())
        .fetch_one(executor)
        .await?;
        Ok(Revision::new(revision))
    }
}

#[async_trait]
impl EventLog for PostgresEventLog {
    async fn append(&self, event: Event, expected: Revision) -> Result<Envelope> {
        validate_for_append(&event, expected)?;
        let tags: Vec<String> = Tag::for_key(&event.key)
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        let subject = serde_json::to_value(&event.subject)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_ID)
            .execute(&mut *tx)
            .await?;

        let actual = Self::key_revision(&mut *tx, &event.key).await?;
        if actual != expected {
            return Err(EventLogError::RevisionConflict {
                key: event.key,
                expected,
                actual,
            });
        }

        let ordering: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events (event_id, event_type, aggregate_key, revision, instant, subject, payload, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING ordering
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(&event.event_type)
        .bind(event.key.to_string())
        .bind(event.revision.as_i64())
        .bind(event.instant)
        .bind(subject)
        .bind(&event.payload)
        .bind(&tags)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_REVISION_CONSTRAINT)
            {
                return EventLogError::RevisionConflict {
                    key: event.key.clone(),
                    expected,
                    actual: event.revision,
                };
            }
            EventLogError::Database(e)
        })?;

        tx.commit().await?;

        tracing::debug!(key = %event.key, revision = %event.revision, ordering, "event appended");
        metrics::counter!("event_log_appends_total").increment(1);
        Ok(Envelope::new(Offset::new(ordering), event))
    }

    async fn events(&self, key: &AggregateKey) -> Result<Vec<Envelope>> {
        self.events_until(key, Revision::new(i64::MAX)).await
    }

    async fn events_until(&self, key: &AggregateKey, revision: Revision) -> Result<Vec<Envelope>> {
        let rows = sqlx::query(
            r#"
            SELECT ordering, event_id, event_type, aggregate_key, revision, instant, subject, payload
            FROM events
            WHERE aggregate_key = $1 AND revision <= $2
            ORDER BY revision ASC
            "#,
        )
        .bind(key.to_string())
        .bind(revision.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_envelope).collect()
    }

    async fn current_revision(&self, key: &AggregateKey) -> Result<Revision> {
        Self::key_revision(&self.pool, key).await
    }

    async fn last_offset(&self, tag: &Tag) -> Result<Offset> {
        let ordering: i64 = if tag.is_all() {
            sqlx::query_scalar("SELECT COALESCE(MAX(ordering), 0) FROM events")
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar(
                "SELECT COALESCE(MAX(ordering), 0) FROM events WHERE tags @> ARRAY[$1]::TEXT[]",
            )
            .bind(tag.as_str())
            .fetch_one(&self.pool)
            .await?
        };
        Ok(Offset::new(ordering))
    }

    async fn current_events_by_tag(&self, tag: &Tag, from: Offset) -> Result<EnvelopeStream> {
        let head = self.last_offset(tag).await?;
        let log = self.clone();
        let tag = tag.clone();

        let stream = async_stream::stream! {
            let mut cursor = from;
            while cursor < head {
                match log.read_batch(&tag, cursor, Some(head)).await {
                    Ok(batch) if batch.is_empty() => break,
                    Ok(batch) => {
                        for envelope in batch {
                            cursor = envelope.offset;
                            yield Ok(envelope);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn events_by_tag(&self, tag: &Tag, from: Offset) -> Result<EnvelopeStream> {
        let log = self.clone();
        let tag = tag.clone();

        let stream = async_stream::stream! {
            let mut cursor = from;
            loop {
                match log.read_batch(&tag, cursor, None).await {
                    Ok(batch) if batch.is_empty() => {
                        tokio::time::sleep(log.config.poll_interval).await;
                    }
                    Ok(batch) => {
                        for envelope in batch {
                            cursor = envelope.offset;
                            yield Ok(envelope);
                        }
                    }
                    Err(err) => {
                        tracing::warn!(tag = %tag, cursor = %cursor, error = %err, "live tail failed");
                        yield Err(err);
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
