use serde::{Deserialize, Serialize};

/// Kind of check recorded against a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Uptime,
    Ssl,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Uptime => "uptime",
            CheckType::Ssl => "ssl",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uptime" => Some(CheckType::Uptime),
            "ssl" => Some(CheckType::Ssl),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reachability of a monitored endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Up,
    Down,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Up => "up",
            SiteStatus::Down => "down",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(SiteStatus::Up),
            "down" => Some(SiteStatus::Down),
            _ => None,
        }
    }
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome classification of a certificate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SslStatus {
    #[serde(rename = "ssl_valid")]
    Valid,
    #[serde(rename = "ssl_expired")]
    Expired,
    #[serde(rename = "ssl_not_yet_valid")]
    NotYetValid,
    #[serde(rename = "ssl_unchecked")]
    Unchecked,
    #[serde(rename = "ssl_failed_parse")]
    FailedParse,
    #[serde(rename = "ssl_failed_check")]
    FailedCheck,
}

impl SslStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslStatus::Valid => "ssl_valid",
            SslStatus::Expired => "ssl_expired",
            SslStatus::NotYetValid => "ssl_not_yet_valid",
            SslStatus::Unchecked => "ssl_unchecked",
            SslStatus::FailedParse => "ssl_failed_parse",
            SslStatus::FailedCheck => "ssl_failed_check",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ssl_valid" => Some(SslStatus::Valid),
            "ssl_expired" => Some(SslStatus::Expired),
            "ssl_not_yet_valid" => Some(SslStatus::NotYetValid),
            "ssl_unchecked" => Some(SslStatus::Unchecked),
            "ssl_failed_parse" => Some(SslStatus::FailedParse),
            "ssl_failed_check" => Some(SslStatus::FailedCheck),
            _ => None,
        }
    }
}

impl std::fmt::Display for SslStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status value as stored in the history ledger.
///
/// Uptime and certificate checks share one ledger table, so a stored status
/// is either a site status or an SSL status depending on the check type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckStatus {
    Site(SiteStatus),
    Ssl(SslStatus),
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Site(status) => status.as_str(),
            CheckStatus::Ssl(status) => status.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        SiteStatus::parse(value)
            .map(CheckStatus::Site)
            .or_else(|| SslStatus::parse(value).map(CheckStatus::Ssl))
    }
}

impl From<SiteStatus> for CheckStatus {
    fn from(status: SiteStatus) -> Self {
        CheckStatus::Site(status)
    }
}

impl From<SslStatus> for CheckStatus {
    fn from(status: SslStatus) -> Self {
        CheckStatus::Ssl(status)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of an uptime check after the retry loop has settled.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Final reachability classification
    pub status: SiteStatus,
    /// Response time of the last attempt in milliseconds
    pub response_time_ms: i64,
    /// Failure detail from the last attempt, if any
    pub error_message: Option<String>,
    /// Number of failed attempts before the loop settled
    pub retry_count: u32,
}

/// Outcome of a certificate evaluation.
#[derive(Debug, Clone)]
pub struct SslOutcome {
    /// Certificate classification
    pub status: SslStatus,
    /// Days until the certificate expires, negative once it has expired
    pub days_until_expiry: i64,
    /// Failure detail when the certificate could not be fetched or parsed
    pub error_message: Option<String>,
}
