use crate::monitoring::types::{CheckStatus, SiteStatus};

/// Result of comparing a new check status against the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub changed: bool,
    pub previous: Option<CheckStatus>,
}

/// Compare a new status against the most recent recorded one.
///
/// A monitor with no prior history always counts as changed, so its very
/// first result can alert.
pub fn detect(previous: Option<CheckStatus>, current: CheckStatus) -> Transition {
    match previous {
        None => Transition { changed: true, previous: None },
        Some(previous_status) => {
            Transition { changed: previous_status != current, previous: Some(previous_status) }
        }
    }
}

/// Whether an up result breached the monitor's response time threshold.
///
/// Only successful checks are judged, and a monitor without a threshold never
/// degrades.
pub fn is_response_time_degraded(
    threshold_ms: Option<i64>,
    status: SiteStatus,
    response_time_ms: i64,
) -> bool {
    status == SiteStatus::Up && threshold_ms.is_some_and(|threshold| response_time_ms > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::SslStatus;

    #[test]
    fn first_check_always_counts_as_changed() {
        let transition = detect(None, SiteStatus::Up.into());
        assert!(transition.changed);
        assert_eq!(transition.previous, None);
    }

    #[test]
    fn repeated_status_does_not_change() {
        let transition = detect(Some(SiteStatus::Up.into()), SiteStatus::Up.into());
        assert!(!transition.changed);

        let transition = detect(Some(SslStatus::Valid.into()), SslStatus::Valid.into());
        assert!(!transition.changed);
    }

    #[test]
    fn status_flip_changes() {
        let transition = detect(Some(SiteStatus::Up.into()), SiteStatus::Down.into());
        assert!(transition.changed);
        assert_eq!(transition.previous, Some(CheckStatus::Site(SiteStatus::Up)));

        let transition = detect(Some(SslStatus::Valid.into()), SslStatus::Expired.into());
        assert!(transition.changed);
    }

    #[test]
    fn degradation_requires_threshold_breach_while_up() {
        assert!(is_response_time_degraded(Some(200), SiteStatus::Up, 250));
        assert!(!is_response_time_degraded(Some(200), SiteStatus::Up, 150));
        assert!(!is_response_time_degraded(Some(200), SiteStatus::Up, 200));
        assert!(!is_response_time_degraded(None, SiteStatus::Up, 1000));
        assert!(!is_response_time_degraded(Some(200), SiteStatus::Down, 5000));
    }
}
