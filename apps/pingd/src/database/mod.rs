/// Database abstraction layer
///
/// Observations are appended to a local libsql (SQLite) file through the
/// [`ResultSink`] trait; the scheduler and writer never see libsql types.

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{PingStore, ResultSink};

use anyhow::Result;

/// Enable WAL and bring the schema up to date
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::enable_wal(conn).await?;
    migrations::run_migrations(conn).await
}
