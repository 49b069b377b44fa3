/// Database abstraction layer
///
/// This module provides a unified interface for monitor storage and the
/// append-only check history ledger, backed by LibSQL (SQLite).
pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
