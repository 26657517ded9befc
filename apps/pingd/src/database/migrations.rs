use anyhow::{Result, bail};
use chrono::Utc;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Switch the database to write-ahead logging.
///
/// `journal_mode` is persistent for file databases, so this only has to
/// succeed once per file; in-memory databases report `memory` and are left
/// alone.
pub async fn enable_wal(conn: &Connection) -> Result<()> {
    let mut rows = conn.query("PRAGMA journal_mode=WAL", ()).await?;

    let mode: String = match rows.next().await? {
        Some(row) => row.get(0)?,
        None => bail!("PRAGMA journal_mode returned no rows"),
    };

    match mode.to_ascii_lowercase().as_str() {
        "wal" | "memory" => {
            tracing::debug!("Journal mode is {}", mode);
            Ok(())
        }
        other => bail!("Failed to enable WAL mode, database stayed in '{other}' mode"),
    }
}

/// Run database migrations. Safe to call on every start.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Create pings table").await?;
    }

    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, Utc::now().timestamp(), description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: the append-only observation log
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp DATETIME,
            success BOOLEAN,
            rtt REAL
        )",
        (),
    )
    .await?;

    Ok(())
}
