use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::monitoring::types::{CheckOutcome, SiteStatus};

/// A single probe attempt against a monitored endpoint.
#[derive(Debug, Clone)]
pub struct ProbeAttempt {
    pub status: SiteStatus,
    pub response_time_ms: i64,
    pub error_message: Option<String>,
}

/// Issues a single HTTP probe and classifies the response.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeAttempt;
}

/// Prober backed by a shared reqwest client.
///
/// The timeout is applied per request rather than on the client, since each
/// monitor carries its own timeout budget.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sitepulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeAttempt {
        let started = Instant::now();
        let result = self.client.get(url).timeout(timeout).send().await;
        let response_time_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(response) => {
                let (status, error_message) = classify_response(response.status().as_u16());
                ProbeAttempt { status, response_time_ms, error_message }
            }
            Err(error) => ProbeAttempt {
                status: SiteStatus::Down,
                response_time_ms,
                error_message: Some(error.to_string()),
            },
        }
    }
}

/// Classify an HTTP status code, counting any 2xx as up.
fn classify_response(code: u16) -> (SiteStatus, Option<String>) {
    if (200..300).contains(&code) {
        (SiteStatus::Up, None)
    } else {
        (SiteStatus::Down, Some(format!("HTTP Status: {code}")))
    }
}

/// Retry budget for an uptime check.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, doubled after each further failure
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A zero attempt budget still probes once.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    /// Backoff before the next attempt, given how many attempts have failed.
    fn backoff(&self, failed_attempts: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(failed_attempts.saturating_sub(1)))
    }
}

/// Run the retry loop for one uptime check.
///
/// The first successful attempt ends the loop immediately. A failed attempt
/// consumes budget and, while budget remains, triggers an exponentially
/// growing sleep before the next try. The returned outcome carries the last
/// attempt's response time and error message, and `retry_count` counts only
/// failed attempts, so a first-try success reports zero.
pub async fn probe_with_retry(
    prober: &dyn Prober,
    url: &str,
    timeout: Duration,
    policy: RetryPolicy,
) -> CheckOutcome {
    let mut failed_attempts = 0u32;

    loop {
        let attempt = prober.probe(url, timeout).await;
        if attempt.status == SiteStatus::Up {
            return CheckOutcome {
                status: attempt.status,
                response_time_ms: attempt.response_time_ms,
                error_message: attempt.error_message,
                retry_count: failed_attempts,
            };
        }

        failed_attempts += 1;
        if failed_attempts >= policy.max_attempts {
            return CheckOutcome {
                status: attempt.status,
                response_time_ms: attempt.response_time_ms,
                error_message: attempt.error_message,
                retry_count: failed_attempts,
            };
        }

        let delay = policy.backoff(failed_attempts);
        debug!(
            url,
            failed_attempts,
            delay_ms = delay.as_millis() as u64,
            "probe failed, backing off before retry"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    struct ScriptedProber {
        script: Mutex<VecDeque<ProbeAttempt>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedProber {
        fn new(script: Vec<ProbeAttempt>) -> Self {
            Self { script: Mutex::new(script.into()), calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, _url: &str, _timeout: Duration) -> ProbeAttempt {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| down(0, "script exhausted"))
        }
    }

    fn up(ms: i64) -> ProbeAttempt {
        ProbeAttempt { status: SiteStatus::Up, response_time_ms: ms, error_message: None }
    }

    fn down(ms: i64, message: &str) -> ProbeAttempt {
        ProbeAttempt {
            status: SiteStatus::Down,
            response_time_ms: ms,
            error_message: Some(message.to_string()),
        }
    }

    #[tokio::test]
    async fn first_attempt_success_reports_zero_retries() {
        let prober = ScriptedProber::new(vec![up(42)]);
        let outcome = probe_with_retry(
            &prober,
            "https://example.com",
            Duration::from_secs(10),
            RetryPolicy::new(3, Duration::from_secs(1)),
        )
        .await;

        assert_eq!(outcome.status, SiteStatus::Up);
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(outcome.response_time_ms, 42);
        assert!(outcome.error_message.is_none());
        assert_eq!(prober.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_back_off_exponentially() {
        let prober = ScriptedProber::new(vec![
            down(5, "HTTP Status: 500"),
            down(5, "HTTP Status: 502"),
            up(7),
        ]);
        let outcome = probe_with_retry(
            &prober,
            "https://example.com",
            Duration::from_secs(10),
            RetryPolicy::new(3, Duration::from_secs(2)),
        )
        .await;

        assert_eq!(outcome.status, SiteStatus::Up);
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(outcome.response_time_ms, 7);
        assert!(outcome.error_message.is_none());

        let calls = prober.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(2));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_reports_last_failure() {
        let prober =
            ScriptedProber::new(vec![down(3, "HTTP Status: 500"), down(4, "HTTP Status: 503")]);
        let outcome = probe_with_retry(
            &prober,
            "https://example.com",
            Duration::from_secs(10),
            RetryPolicy::new(2, Duration::from_secs(1)),
        )
        .await;

        assert_eq!(outcome.status, SiteStatus::Down);
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(outcome.response_time_ms, 4);
        assert_eq!(outcome.error_message.as_deref(), Some("HTTP Status: 503"));
        // No sleep after the final attempt
        assert_eq!(prober.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_attempt_budget_still_probes_once() {
        let prober = ScriptedProber::new(vec![down(1, "HTTP Status: 500")]);
        let outcome = probe_with_retry(
            &prober,
            "https://example.com",
            Duration::from_secs(10),
            RetryPolicy::new(0, Duration::from_secs(1)),
        )
        .await;

        assert_eq!(outcome.status, SiteStatus::Down);
        assert_eq!(outcome.retry_count, 1);
    }

    #[test]
    fn response_codes_classify_by_success_range() {
        assert_eq!(classify_response(200).0, SiteStatus::Up);
        assert_eq!(classify_response(204).0, SiteStatus::Up);

        let (status, message) = classify_response(404);
        assert_eq!(status, SiteStatus::Down);
        assert_eq!(message.as_deref(), Some("HTTP Status: 404"));

        assert_eq!(classify_response(301).0, SiteStatus::Down);
        assert_eq!(classify_response(500).0, SiteStatus::Down);
    }
}
