use chrono::{DateTime, Duration, Utc};

use crate::database::models::Monitor;

/// Whether the monitor is inside its maintenance window at `now`.
///
/// The flag alone, with no window set, means maintenance indefinitely. A
/// window with only a start is open ended. An end without a start never
/// matches, since there is no way to tell when it began.
pub fn is_in_maintenance(monitor: &Monitor, now: DateTime<Utc>) -> bool {
    if !monitor.is_maintenance {
        return false;
    }
    match (monitor.maintenance_start_at, monitor.maintenance_end_at) {
        (None, None) => true,
        (Some(start), Some(end)) => now >= start && now <= end,
        (Some(start), None) => now >= start,
        (None, Some(_)) => false,
    }
}

/// Whether a new alert would fall inside the monitor's throttle window.
pub fn should_throttle_alert(monitor: &Monitor, now: DateTime<Utc>) -> bool {
    match monitor.last_alerted_at {
        None => false,
        Some(last) => now < last + Duration::minutes(i64::from(monitor.alert_throttle_minutes)),
    }
}
