use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations
///
/// This is the single source of truth for the database schema. Every entry
/// point that opens the database runs this before touching any table.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    // Create schema_migrations table first (tracks applied migrations)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    // Check current schema version
    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    // Run migrations based on current version
    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Initial schema").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Add per-monitor notification channel routing").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
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

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: Initial schema
/// Creates the monitors table and the append-only monitor_histories ledger
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    // Create monitors table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            owner TEXT,
            url TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            interval_minutes INTEGER NOT NULL DEFAULT 5,
            timeout_seconds INTEGER NOT NULL DEFAULT 10,
            retry_attempts INTEGER NOT NULL DEFAULT 3,
            retry_delay_seconds INTEGER NOT NULL DEFAULT 1,
            response_time_threshold_ms INTEGER,
            ssl_check INTEGER NOT NULL DEFAULT 0,
            is_maintenance INTEGER NOT NULL DEFAULT 0,
            maintenance_start_at INTEGER,
            maintenance_end_at INTEGER,
            alert_throttle_minutes INTEGER NOT NULL DEFAULT 60,
            last_alerted_at INTEGER,
            last_checked_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        (),
    )
    .await?;

    // Create monitor_histories ledger. Rows are only ever appended; the
    // (monitor_id, check_type, created_at, id) index serves latest-entry
    // lookups with id as the tie breaker for same-second inserts.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitor_histories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            monitor_id INTEGER NOT NULL,
            check_type TEXT NOT NULL,
            status TEXT NOT NULL,
            response_time INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (monitor_id) REFERENCES monitors(id) ON DELETE CASCADE
        )",
        (),
    )
    .await?;

    // Create indexes
    conn.execute("CREATE INDEX IF NOT EXISTS idx_monitors_uuid ON monitors(uuid)", ()).await?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_monitors_enabled ON monitors(enabled)", ()).await?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monitor_histories_monitor ON monitor_histories(monitor_id)",
        (),
    )
    .await?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monitor_histories_latest
         ON monitor_histories(monitor_id, check_type, created_at DESC, id DESC)",
        (),
    )
    .await?;

    Ok(())
}

/// Migration v2: Per-monitor notification channel routing
/// Adds a channels column (JSON array of channel names, empty means all)
async fn run_migration_v2(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE monitors ADD COLUMN channels TEXT NOT NULL DEFAULT '[]'", ())
        .await?;

    tracing::info!("Added channels column to monitors table");
    Ok(())
}
