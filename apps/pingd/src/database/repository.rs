use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool::managed::{Object, Pool};
use libsql::params;
use std::path::Path;

use super::initialize_database;
use super::models::{PingRecord, text_to_timestamp, timestamp_to_text};
use crate::monitoring::types::Observation;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Durable, ordered append of observations
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append one observation, returning the row id it was stored under
    async fn append(&self, observation: &Observation) -> Result<i64>;
}

/// libsql-backed observation log
pub struct PingStore {
    pool: LibsqlPool,
}

impl PingStore {
    /// Open (or create) the database file, enable WAL and run migrations.
    ///
    /// Any failure here is a startup failure.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let database = libsql::Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("Failed to open database {}", path.display()))?;

        let pool = Pool::builder(LibsqlManager::new(database))
            .build()
            .context("Failed to build connection pool")?;

        let store = Self::new_from_pool(pool);
        let conn = store.get_conn().await?;
        initialize_database(&conn)
            .await
            .with_context(|| format!("Failed to initialize schema in {}", path.display()))?;

        Ok(store)
    }

    /// Wrap an existing pool. The schema is assumed to be initialized.
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    /// All stored rows in insertion order
    pub async fn records(&self) -> Result<Vec<PingRecord>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, timestamp, success, rtt FROM pings ORDER BY id ASC", ())
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let timestamp: String = row.get(1)?;
            records.push(PingRecord {
                id: row.get(0)?,
                timestamp: text_to_timestamp(&timestamp)?,
                success: row.get::<i64>(2)? != 0,
                rtt: row.get(3)?,
            });
        }

        Ok(records)
    }
}

#[async_trait]
impl ResultSink for PingStore {
    async fn append(&self, observation: &Observation) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO pings (timestamp, success, rtt) VALUES (?, ?, ?)",
            params![
                timestamp_to_text(observation.timestamp()),
                if observation.is_success() { 1 } else { 0 },
                observation.latency_secs()
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }
}
