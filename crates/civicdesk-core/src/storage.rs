use crate::error::CivicError;
use crate::identity::ActorRole;
use crate::ledger::{TimelineEntry, TimelineEvent, TimelineLedger};
use crate::lifecycle::IssueStatus;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Timeline persistence backend configuration.
#[derive(Debug, Clone)]
pub enum TimelineStorageConfig {
    /// Keep the timeline in process memory only.
    Memory,
    /// Mirror every entry to PostgreSQL and hydrate the chain on startup.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl TimelineStorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl Default for TimelineStorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone)]
enum TimelineBackend {
    Memory,
    Postgres(PostgresTimelineStore),
}

/// Runtime timeline wrapper that keeps an in-memory authoritative chain while
/// optionally mirroring each entry to PostgreSQL.
///
/// Invariant handling:
/// - Entry hash/index is computed against the in-memory chain first.
/// - The entry is persisted before it is committed in-memory, so a mirror
///   failure fails the whole mutating operation and the issue record is
///   never left changed without its audit row.
/// - On startup, PostgreSQL entries are hydrated and hash-verified.
#[derive(Debug, Clone)]
pub struct PersistentTimeline {
    ledger: TimelineLedger,
    backend: TimelineBackend,
}

impl PersistentTimeline {
    /// Build an in-memory persistent timeline from already persisted entries.
    pub fn from_entries(entries: Vec<TimelineEntry>) -> Result<Self, CivicError> {
        Ok(Self {
            ledger: TimelineLedger::from_entries(entries)?,
            backend: TimelineBackend::Memory,
        })
    }

    pub async fn bootstrap(config: TimelineStorageConfig) -> Result<Self, CivicError> {
        match config {
            TimelineStorageConfig::Memory => Ok(Self {
                ledger: TimelineLedger::new(),
                backend: TimelineBackend::Memory,
            }),
            TimelineStorageConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresTimelineStore::connect(&database_url, max_connections).await?;
                store.ensure_schema().await?;
                let entries = store.load_entries().await?;
                let ledger = TimelineLedger::from_entries(entries)?;
                Ok(Self {
                    ledger,
                    backend: TimelineBackend::Postgres(store),
                })
            }
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            TimelineBackend::Memory => "memory",
            TimelineBackend::Postgres(_) => "postgres",
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        self.ledger.entries()
    }

    pub fn entries_for_issue(&self, issue_id: Uuid) -> Vec<TimelineEntry> {
        self.ledger.entries_for_issue(issue_id)
    }

    pub fn verify_chain(&self) -> bool {
        self.ledger.verify_chain()
    }

    pub async fn append(&mut self, event: TimelineEvent) -> Result<TimelineEntry, CivicError> {
        let entry = self.ledger.build_entry(event);

        if let TimelineBackend::Postgres(store) = &self.backend {
            store.insert_entry(&entry).await?;
        }

        self.ledger.commit_entry(entry.clone())?;
        Ok(entry)
    }
}

#[derive(Debug, Clone)]
struct PostgresTimelineStore {
    pool: PgPool,
}

impl PostgresTimelineStore {
    async fn connect(database_url: &str, max_connections: u32) -> Result<Self, CivicError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| CivicError::Storage(format!("postgres connect failed: {e}")))?;

        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), CivicError> {
        // Single append-only table; the application controls deterministic
        // index/hash generation.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS civic_timeline_entries (
                ledger_index BIGINT PRIMARY KEY,
                entry_id TEXT NOT NULL UNIQUE,
                issue_id UUID NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL,
                updated_by TEXT NOT NULL,
                role TEXT NOT NULL,
                event_date TIMESTAMPTZ NOT NULL,
                previous_hash TEXT NULL,
                entry_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CivicError::Storage(format!("postgres schema create failed: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_civic_timeline_issue_id ON civic_timeline_entries (issue_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CivicError::Storage(format!("postgres index create failed: {e}")))?;

        Ok(())
    }

    async fn load_entries(&self) -> Result<Vec<TimelineEntry>, CivicError> {
        let rows = sqlx::query(
            r#"
            SELECT
                ledger_index,
                entry_id,
                issue_id,
                status,
                message,
                updated_by,
                role,
                event_date,
                previous_hash,
                entry_hash
            FROM civic_timeline_entries
            ORDER BY ledger_index ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CivicError::Storage(format!("postgres load failed: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let status_str: String = row
                .try_get("status")
                .map_err(|e| CivicError::Storage(format!("postgres decode status failed: {e}")))?;
            let status = IssueStatus::from_name(&status_str).ok_or_else(|| {
                CivicError::Storage(format!("unknown status '{status_str}' in postgres"))
            })?;

            let role_str: String = row
                .try_get("role")
                .map_err(|e| CivicError::Storage(format!("postgres decode role failed: {e}")))?;
            let role = ActorRole::from_name(&role_str).ok_or_else(|| {
                CivicError::Storage(format!("unknown role '{role_str}' in postgres"))
            })?;

            let index: i64 = row.try_get("ledger_index").map_err(|e| {
                CivicError::Storage(format!("postgres decode ledger_index failed: {e}"))
            })?;

            entries.push(TimelineEntry {
                entry_id: row.try_get("entry_id").map_err(|e| {
                    CivicError::Storage(format!("postgres decode entry_id failed: {e}"))
                })?,
                index: index.try_into().map_err(|_| {
                    CivicError::Storage("negative ledger index in storage".to_string())
                })?,
                issue_id: row.try_get("issue_id").map_err(|e| {
                    CivicError::Storage(format!("postgres decode issue_id failed: {e}"))
                })?,
                status,
                message: row.try_get("message").map_err(|e| {
                    CivicError::Storage(format!("postgres decode message failed: {e}"))
                })?,
                updated_by: row.try_get("updated_by").map_err(|e| {
                    CivicError::Storage(format!("postgres decode updated_by failed: {e}"))
                })?,
                role,
                date: row.try_get("event_date").map_err(|e| {
                    CivicError::Storage(format!("postgres decode event_date failed: {e}"))
                })?,
                previous_hash: row.try_get("previous_hash").map_err(|e| {
                    CivicError::Storage(format!("postgres decode previous_hash failed: {e}"))
                })?,
                entry_hash: row.try_get("entry_hash").map_err(|e| {
                    CivicError::Storage(format!("postgres decode entry_hash failed: {e}"))
                })?,
            });
        }

        Ok(entries)
    }

    async fn insert_entry(&self, entry: &TimelineEntry) -> Result<(), CivicError> {
        let index: i64 = entry.index.try_into().map_err(|_| {
            CivicError::Storage("ledger index exceeds postgres BIGINT range".to_string())
        })?;
        sqlx::query(
            r#"
            INSERT INTO civic_timeline_entries (
                ledger_index,
                entry_id,
                issue_id,
                status,
                message,
                updated_by,
                role,
                event_date,
                previous_hash,
                entry_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(index)
        .bind(&entry.entry_id)
        .bind(entry.issue_id)
        .bind(entry.status.name())
        .bind(&entry.message)
        .bind(&entry.updated_by)
        .bind(entry.role.name())
        .bind(entry.date)
        .bind(&entry.previous_hash)
        .bind(&entry.entry_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| CivicError::Storage(format!("postgres insert failed: {e}")))?;

        Ok(())
    }
}
