use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::params;
use uuid::Uuid;

use super::models::{Monitor, MonitorHistory, ResponseTimeStats};
use crate::monitoring::types::{CheckStatus, CheckType};
use crate::pool::LibsqlPool;

const MONITOR_COLUMNS: &str = "id, uuid, owner, url, enabled, interval_minutes, timeout_seconds, \
     retry_attempts, retry_delay_seconds, response_time_threshold_ms, ssl_check, is_maintenance, \
     maintenance_start_at, maintenance_end_at, alert_throttle_minutes, last_alerted_at, \
     last_checked_at, channels, created_at, updated_at";

const HISTORY_COLUMNS: &str =
    "id, uuid, monitor_id, check_type, status, response_time, error_message, retry_count, created_at";

/// Database trait for abstracting database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Get all monitors
    async fn get_monitors(&self) -> Result<Vec<Monitor>>;

    /// Get a page of enabled monitors ordered by id
    async fn get_enabled_monitors(&self, offset: u64, limit: u64) -> Result<Vec<Monitor>>;

    /// Get a monitor by UUID
    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>>;

    /// Save a monitor, inserting or updating depending on whether it has an id
    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64>;

    /// Delete a monitor by UUID
    async fn delete_monitor(&self, uuid: Uuid) -> Result<()>;

    /// Flip a monitor's enabled flag, returning the new state
    async fn toggle_monitor(&self, uuid: Uuid) -> Result<Option<bool>>;

    /// Record when the monitor was last checked
    async fn set_last_checked(&self, monitor_id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Atomically claim the right to send an alert.
    ///
    /// The claim succeeds only when the monitor is outside its throttle
    /// window, and success stamps `last_alerted_at` in the same statement so
    /// concurrent claimants cannot both win.
    async fn claim_alert(&self, monitor_id: i64, now: DateTime<Utc>) -> Result<bool>;

    /// Append an entry to the history ledger
    async fn append_history(&self, entry: &MonitorHistory) -> Result<i64>;

    /// Whether any history of the given kind exists for a monitor
    async fn has_history(&self, monitor_id: i64, check_type: CheckType) -> Result<bool>;

    /// Latest history entry of one kind for a monitor
    async fn latest_history(
        &self,
        monitor_id: i64,
        check_type: CheckType,
    ) -> Result<Option<MonitorHistory>>;

    /// Latest history entry of any kind for a monitor
    async fn latest_history_any(&self, monitor_id: i64) -> Result<Option<MonitorHistory>>;

    /// Response time aggregates over the most recent successful uptime entries
    async fn response_time_stats(
        &self,
        monitor_id: i64,
        limit: Option<u32>,
    ) -> Result<Option<ResponseTimeStats>>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn monitor_from_row(row: &libsql::Row) -> Result<Monitor> {
    let uuid_str: String = row.get(1)?;
    let channels_json: String = row.get(17)?;

    Ok(Monitor {
        id: Some(row.get(0)?),
        uuid: Uuid::parse_str(&uuid_str)?,
        owner: row.get(2)?,
        url: row.get(3)?,
        enabled: row.get::<i64>(4)? != 0,
        interval_minutes: row.get::<i64>(5)? as u32,
        timeout_seconds: row.get::<i64>(6)? as u32,
        retry_attempts: row.get::<i64>(7)? as u32,
        retry_delay_seconds: row.get::<i64>(8)? as u32,
        response_time_threshold_ms: row.get::<Option<i64>>(9)?,
        ssl_check: row.get::<i64>(10)? != 0,
        is_maintenance: row.get::<i64>(11)? != 0,
        maintenance_start_at: row.get::<Option<i64>>(12)?.map(Monitor::i64_to_datetime),
        maintenance_end_at: row.get::<Option<i64>>(13)?.map(Monitor::i64_to_datetime),
        alert_throttle_minutes: row.get::<i64>(14)? as u32,
        last_alerted_at: row.get::<Option<i64>>(15)?.map(Monitor::i64_to_datetime),
        last_checked_at: row.get::<Option<i64>>(16)?.map(Monitor::i64_to_datetime),
        channels: serde_json::from_str(&channels_json).unwrap_or_default(),
        created_at: Monitor::i64_to_datetime(row.get(18)?),
        updated_at: Monitor::i64_to_datetime(row.get(19)?),
    })
}

fn history_from_row(row: &libsql::Row) -> Result<MonitorHistory> {
    let uuid_str: String = row.get(1)?;
    let check_type_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;

    Ok(MonitorHistory {
        id: Some(row.get(0)?),
        uuid: Uuid::parse_str(&uuid_str)?,
        monitor_id: row.get(2)?,
        check_type: CheckType::parse(&check_type_str)
            .ok_or_else(|| anyhow!("unknown check type {check_type_str:?}"))?,
        status: CheckStatus::parse(&status_str)
            .ok_or_else(|| anyhow!("unknown check status {status_str:?}"))?,
        response_time: row.get(5)?,
        error_message: row.get(6)?,
        retry_count: row.get::<i64>(7)? as u32,
        created_at: Monitor::i64_to_datetime(row.get(8)?),
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn get_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt =
            conn.prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors ORDER BY id")).await?;

        let mut rows = stmt.query(()).await?;
        let mut monitors = Vec::new();

        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn get_enabled_monitors(&self, offset: u64, limit: u64) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MONITOR_COLUMNS} FROM monitors WHERE enabled = 1 ORDER BY id LIMIT ? OFFSET ?"
            ))
            .await?;

        let mut rows = stmt.query(params![limit as i64, offset as i64]).await?;
        let mut monitors = Vec::new();

        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE uuid = ?"))
            .await?;

        let mut rows = stmt.query(params![uuid.to_string()]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(monitor_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64> {
        let conn = self.get_conn().await?;
        let channels = serde_json::to_string(&monitor.channels)?;
        let created_at = Monitor::datetime_to_i64(monitor.created_at);
        let updated_at = Monitor::datetime_to_i64(monitor.updated_at);

        if let Some(id) = monitor.id {
            // Update existing monitor. The last_alerted_at and last_checked_at
            // columns change only through their dedicated statements, so a
            // stale in-memory monitor cannot roll back an alert claim.
            conn.execute(
                "UPDATE monitors SET owner = ?, url = ?, enabled = ?, interval_minutes = ?, \
                 timeout_seconds = ?, retry_attempts = ?, retry_delay_seconds = ?, \
                 response_time_threshold_ms = ?, ssl_check = ?, is_maintenance = ?, \
                 maintenance_start_at = ?, maintenance_end_at = ?, alert_throttle_minutes = ?, \
                 channels = ?, updated_at = ? WHERE id = ?",
                params![
                    monitor.owner.clone(),
                    monitor.url.clone(),
                    if monitor.enabled { 1 } else { 0 },
                    monitor.interval_minutes as i64,
                    monitor.timeout_seconds as i64,
                    monitor.retry_attempts as i64,
                    monitor.retry_delay_seconds as i64,
                    monitor.response_time_threshold_ms,
                    if monitor.ssl_check { 1 } else { 0 },
                    if monitor.is_maintenance { 1 } else { 0 },
                    monitor.maintenance_start_at.map(Monitor::datetime_to_i64),
                    monitor.maintenance_end_at.map(Monitor::datetime_to_i64),
                    monitor.alert_throttle_minutes as i64,
                    channels,
                    updated_at,
                    id
                ],
            )
            .await?;
            Ok(id)
        } else {
            // Insert new monitor
            conn.execute(
                "INSERT INTO monitors (uuid, owner, url, enabled, interval_minutes, \
                 timeout_seconds, retry_attempts, retry_delay_seconds, \
                 response_time_threshold_ms, ssl_check, is_maintenance, maintenance_start_at, \
                 maintenance_end_at, alert_throttle_minutes, last_alerted_at, last_checked_at, \
                 channels, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    monitor.uuid.to_string(),
                    monitor.owner.clone(),
                    monitor.url.clone(),
                    if monitor.enabled { 1 } else { 0 },
                    monitor.interval_minutes as i64,
                    monitor.timeout_seconds as i64,
                    monitor.retry_attempts as i64,
                    monitor.retry_delay_seconds as i64,
                    monitor.response_time_threshold_ms,
                    if monitor.ssl_check { 1 } else { 0 },
                    if monitor.is_maintenance { 1 } else { 0 },
                    monitor.maintenance_start_at.map(Monitor::datetime_to_i64),
                    monitor.maintenance_end_at.map(Monitor::datetime_to_i64),
                    monitor.alert_throttle_minutes as i64,
                    monitor.last_alerted_at.map(Monitor::datetime_to_i64),
                    monitor.last_checked_at.map(Monitor::datetime_to_i64),
                    channels,
                    created_at,
                    updated_at
                ],
            )
            .await?;

            Ok(conn.last_insert_rowid())
        }
    }

    async fn delete_monitor(&self, uuid: Uuid) -> Result<()> {
        let conn = self.get_conn().await?;

        // Delete the monitor; history rows are removed via ON DELETE CASCADE
        conn.execute("DELETE FROM monitors WHERE uuid = ?", params![uuid.to_string()]).await?;
        Ok(())
    }

    async fn toggle_monitor(&self, uuid: Uuid) -> Result<Option<bool>> {
        let conn = self.get_conn().await?;
        let now = Utc::now().timestamp();

        let affected = conn
            .execute(
                "UPDATE monitors SET enabled = CASE WHEN enabled = 0 THEN 1 ELSE 0 END, \
                 updated_at = ? WHERE uuid = ?",
                params![now, uuid.to_string()],
            )
            .await?;

        if affected == 0 {
            return Ok(None);
        }

        let mut rows = conn
            .query("SELECT enabled FROM monitors WHERE uuid = ?", params![uuid.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)? != 0)),
            None => Ok(None),
        }
    }

    async fn set_last_checked(&self, monitor_id: i64, at: DateTime<Utc>) -> Result<()> {
        let conn = self.get_conn().await?;
        let at = Monitor::datetime_to_i64(at);

        conn.execute(
            "UPDATE monitors SET last_checked_at = ?, updated_at = ? WHERE id = ?",
            params![at, at, monitor_id],
        )
        .await?;
        Ok(())
    }

    async fn claim_alert(&self, monitor_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.get_conn().await?;
        let now = Monitor::datetime_to_i64(now);

        // Single conditional update: the WHERE clause checks the throttle
        // window and the SET stamps the claim, so only one caller can win
        // for any given window.
        let affected = conn
            .execute(
                "UPDATE monitors SET last_alerted_at = ?, updated_at = ? WHERE id = ? \
                 AND (last_alerted_at IS NULL \
                      OR ? >= last_alerted_at + alert_throttle_minutes * 60)",
                params![now, now, monitor_id, now],
            )
            .await?;

        Ok(affected > 0)
    }

    async fn append_history(&self, entry: &MonitorHistory) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitor_histories (uuid, monitor_id, check_type, status, \
             response_time, error_message, retry_count, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.uuid.to_string(),
                entry.monitor_id,
                entry.check_type.as_str(),
                entry.status.as_str(),
                entry.response_time,
                entry.error_message.clone(),
                entry.retry_count as i64,
                Monitor::datetime_to_i64(entry.created_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn has_history(&self, monitor_id: i64, check_type: CheckType) -> Result<bool> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM monitor_histories WHERE monitor_id = ? AND check_type = ?)",
                params![monitor_id, check_type.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? != 0),
            None => Ok(false),
        }
    }

    async fn latest_history(
        &self,
        monitor_id: i64,
        check_type: CheckType,
    ) -> Result<Option<MonitorHistory>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM monitor_histories \
                 WHERE monitor_id = ? AND check_type = ? \
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ))
            .await?;

        let mut rows = stmt.query(params![monitor_id, check_type.as_str()]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(history_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn latest_history_any(&self, monitor_id: i64) -> Result<Option<MonitorHistory>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM monitor_histories WHERE monitor_id = ? \
                 ORDER BY created_at DESC, id DESC LIMIT 1"
            ))
            .await?;

        let mut rows = stmt.query(params![monitor_id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(history_from_row(&row)?))
        } else {
            Ok(None)
        }
    }

    async fn response_time_stats(
        &self,
        monitor_id: i64,
        limit: Option<u32>,
    ) -> Result<Option<ResponseTimeStats>> {
        let conn = self.get_conn().await?;

        let mut rows = match limit {
            Some(limit) => {
                conn.query(
                    "SELECT AVG(response_time), MIN(response_time), MAX(response_time), COUNT(*) \
                     FROM (SELECT response_time FROM monitor_histories \
                           WHERE monitor_id = ? AND check_type = 'uptime' AND status = 'up' \
                           ORDER BY created_at DESC, id DESC LIMIT ?)",
                    params![monitor_id, limit as i64],
                )
                .await?
            }
            None => {
                conn.query(
                    "SELECT AVG(response_time), MIN(response_time), MAX(response_time), COUNT(*) \
                     FROM monitor_histories \
                     WHERE monitor_id = ? AND check_type = 'uptime' AND status = 'up'",
                    params![monitor_id],
                )
                .await?
            }
        };

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let samples = row.get::<i64>(3)?;
        if samples == 0 {
            return Ok(None);
        }

        Ok(Some(ResponseTimeStats {
            average_ms: row.get::<f64>(0)?,
            min_ms: row.get::<i64>(1)?,
            max_ms: row.get::<i64>(2)?,
            samples: samples as u64,
        }))
    }
}
