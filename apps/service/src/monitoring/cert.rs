use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::monitoring::types::{SslOutcome, SslStatus};

/// Classified failure while fetching or reading a peer certificate.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("invalid server name {0:?}")]
    InvalidHost(String),
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
    #[error("peer presented no certificate")]
    MissingCertificate,
    #[error("failed to parse certificate: {0}")]
    Parse(String),
    #[error("certificate validity timestamp out of range")]
    InvalidValidity,
    #[error("certificate fetch timed out after {0} seconds")]
    Timeout(u64),
}

/// Validity window of a server certificate.
#[derive(Debug, Clone, Copy)]
pub struct CertificateInfo {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl CertificateInfo {
    /// Whole days until the certificate expires, negative once past expiry.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_days()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.not_after
    }
}

/// Fetches the leaf certificate a server presents for a host.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn fetch(&self, host: &str, port: u16) -> Result<CertificateInfo, CertificateError>;
}

/// Certificate source that performs a real TLS handshake.
///
/// The handshake runs with a verifier that accepts any chain, so expired or
/// self-signed certificates can still be inspected instead of failing the
/// handshake before classification.
pub struct TlsCertificateSource {
    connector: TlsConnector,
    timeout: Duration,
}

impl TlsCertificateSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::ring::default_provider()));
        let config = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(PassthroughVerifier { provider }))
            .with_no_client_auth();

        Ok(Self { connector: TlsConnector::from(Arc::new(config)), timeout })
    }

    async fn fetch_inner(&self, host: &str, port: u16) -> Result<CertificateInfo, CertificateError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| CertificateError::InvalidHost(host.to_string()))?;

        let tcp = TcpStream::connect((host, port)).await.map_err(CertificateError::Connect)?;
        let stream =
            self.connector.connect(server_name, tcp).await.map_err(CertificateError::Handshake)?;

        let (_, session) = stream.get_ref();
        let certs = session.peer_certificates().ok_or(CertificateError::MissingCertificate)?;
        let leaf = certs.first().ok_or(CertificateError::MissingCertificate)?;

        parse_certificate(leaf.as_ref())
    }
}

#[async_trait]
impl CertificateSource for TlsCertificateSource {
    async fn fetch(&self, host: &str, port: u16) -> Result<CertificateInfo, CertificateError> {
        match tokio::time::timeout(self.timeout, self.fetch_inner(host, port)).await {
            Ok(result) => result,
            Err(_) => Err(CertificateError::Timeout(self.timeout.as_secs())),
        }
    }
}

fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, CertificateError> {
    let (_, cert) =
        X509Certificate::from_der(der).map_err(|error| CertificateError::Parse(error.to_string()))?;
    let validity = cert.validity();

    Ok(CertificateInfo {
        not_before: timestamp_to_datetime(validity.not_before.timestamp())?,
        not_after: timestamp_to_datetime(validity.not_after.timestamp())?,
    })
}

fn timestamp_to_datetime(secs: i64) -> Result<DateTime<Utc>, CertificateError> {
    Utc.timestamp_opt(secs, 0).single().ok_or(CertificateError::InvalidValidity)
}

/// Verifier that accepts any server certificate without validation.
///
/// Certificate health is judged from the parsed validity window afterwards,
/// never from chain verification.
#[derive(Debug)]
struct PassthroughVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PassthroughVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

/// Extract the host and port to probe from a monitor URL.
///
/// A string that does not parse as a URL is treated as a bare host name.
/// Certificates are always fetched from the TLS port, so an explicit port is
/// honored only for https URLs.
pub fn host_and_port(url: &str) -> (String, u16) {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            let port = match parsed.scheme() {
                "https" => parsed.port().unwrap_or(443),
                _ => 443,
            };
            return (host.to_string(), port);
        }
    }
    (url.to_string(), 443)
}

/// Evaluate the certificate served for a monitor URL.
///
/// A certificate classifies as expired only once its validity window has
/// actually ended. Fetch and parse failures classify as a failed check with
/// zero days instead of propagating, so the ledger always receives an entry.
pub async fn evaluate_certificate(
    source: &dyn CertificateSource,
    url: &str,
    now: DateTime<Utc>,
) -> SslOutcome {
    let (host, port) = host_and_port(url);

    match source.fetch(&host, port).await {
        Ok(info) => {
            let status = if info.is_expired(now) { SslStatus::Expired } else { SslStatus::Valid };
            SslOutcome { status, days_until_expiry: info.days_until_expiry(now), error_message: None }
        }
        Err(error) => {
            debug!(host, error = %error, "certificate fetch failed");
            SslOutcome {
                status: SslStatus::FailedCheck,
                days_until_expiry: 0,
                error_message: Some(error.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(CertificateInfo);

    #[async_trait]
    impl CertificateSource for StaticSource {
        async fn fetch(&self, _host: &str, _port: u16) -> Result<CertificateInfo, CertificateError> {
            Ok(self.0)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CertificateSource for FailingSource {
        async fn fetch(&self, _host: &str, _port: u16) -> Result<CertificateInfo, CertificateError> {
            Err(CertificateError::MissingCertificate)
        }
    }

    fn cert_expiring_in(now: DateTime<Utc>, lifetime: chrono::Duration) -> CertificateInfo {
        CertificateInfo { not_before: now - chrono::Duration::days(90), not_after: now + lifetime }
    }

    #[test]
    fn host_and_port_from_url_forms() {
        assert_eq!(host_and_port("https://example.com/status"), ("example.com".to_string(), 443));
        assert_eq!(host_and_port("https://example.com:8443/"), ("example.com".to_string(), 8443));
        assert_eq!(host_and_port("http://example.com"), ("example.com".to_string(), 443));
        assert_eq!(host_and_port("example.com"), ("example.com".to_string(), 443));
    }

    #[tokio::test]
    async fn healthy_certificate_classifies_as_valid() {
        let now = Utc::now();
        let source = StaticSource(cert_expiring_in(now, chrono::Duration::days(30)));
        let outcome = evaluate_certificate(&source, "https://example.com", now).await;

        assert_eq!(outcome.status, SslStatus::Valid);
        assert_eq!(outcome.days_until_expiry, 30);
        assert!(outcome.error_message.is_none());
    }

    #[tokio::test]
    async fn expired_certificate_reports_negative_days() {
        let now = Utc::now();
        let source = StaticSource(cert_expiring_in(now, chrono::Duration::days(-2)));
        let outcome = evaluate_certificate(&source, "https://example.com", now).await;

        assert_eq!(outcome.status, SslStatus::Expired);
        assert_eq!(outcome.days_until_expiry, -2);
    }

    #[tokio::test]
    async fn certificate_expiring_within_a_day_is_still_valid() {
        let now = Utc::now();
        let source = StaticSource(cert_expiring_in(now, chrono::Duration::hours(10)));
        let outcome = evaluate_certificate(&source, "https://example.com", now).await;

        assert_eq!(outcome.status, SslStatus::Valid);
        assert_eq!(outcome.days_until_expiry, 0);
    }

    #[tokio::test]
    async fn certificate_just_past_expiry_is_expired() {
        let now = Utc::now();
        let source = StaticSource(cert_expiring_in(now, chrono::Duration::hours(-1)));
        let outcome = evaluate_certificate(&source, "https://example.com", now).await;

        assert_eq!(outcome.status, SslStatus::Expired);
        assert_eq!(outcome.days_until_expiry, 0);
    }

    #[tokio::test]
    async fn fetch_failure_classifies_as_failed_check() {
        let outcome = evaluate_certificate(&FailingSource, "https://example.com", Utc::now()).await;

        assert_eq!(outcome.status, SslStatus::FailedCheck);
        assert_eq!(outcome.days_until_expiry, 0);
        assert_eq!(outcome.error_message.as_deref(), Some("peer presented no certificate"));
    }
}
