use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, ORIGIN};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time;
use tracing::debug;

use crate::types::ProbeStatus;

/// Raw outcome of one GET, before it is turned into a result record.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Unreachable,
    CorsBlocked,
    OpenNotNmos,
    Readable(Value),
}

impl ProbeOutcome {
    pub fn status(&self) -> ProbeStatus {
        match self {
            ProbeOutcome::Unreachable => ProbeStatus::Unreachable,
            ProbeOutcome::CorsBlocked => ProbeStatus::ReachableCorsBlocked,
            ProbeOutcome::OpenNotNmos => ProbeStatus::OpenNotNmos,
            ProbeOutcome::Readable(_) => ProbeStatus::ReadableOk,
        }
    }
}

/// A single-shot endpoint probe. Implementations must never block past `timeout`.
pub trait Prober: Send + Sync {
    fn probe(&self, url: &str, timeout: Duration) -> impl Future<Output = ProbeOutcome> + Send;
}

/// How transport failures that are not timeouts are classified.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// A failed TCP connect or name lookup means unreachable; anything after the connect
    /// (TLS handshake, malformed response, reset) means reachable but unreadable.
    #[default]
    Strict,
    /// Every non-timeout network failure means reachable but blocked, like a browser fetch.
    Browser,
}

#[derive(Debug, Clone, Default)]
pub struct ProberConfig {
    pub failure_policy: FailurePolicy,
    /// When set, sent as `Origin` and the response must allow it to count as readable.
    pub cors_origin: Option<String>,
    pub accept_invalid_certs: bool,
}

/// reqwest-backed prober used for real scans.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    config: ProberConfig,
}

impl HttpProber {
    pub fn new(config: ProberConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nmos-port-explorer/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    async fn fetch(&self, url: &str) -> Result<ProbeOutcome, reqwest::Error> {
        let mut req = self.client.get(url).header(CACHE_CONTROL, "no-store");
        if let Some(origin) = &self.config.cors_origin {
            req = req.header(ORIGIN, origin.as_str());
        }
        let resp = req.send().await?;

        if let Some(origin) = &self.config.cors_origin {
            if !cors_allows(resp.headers(), origin) {
                return Ok(ProbeOutcome::CorsBlocked);
            }
        }
        if !resp.status().is_success() {
            return Ok(ProbeOutcome::OpenNotNmos);
        }

        let body = resp.bytes().await?;
        Ok(match serde_json::from_slice::<Value>(&body) {
            Ok(data) => ProbeOutcome::Readable(data),
            Err(_) => ProbeOutcome::OpenNotNmos,
        })
    }

    fn classify_failure(&self, err: &reqwest::Error) -> ProbeOutcome {
        if err.is_timeout() || err.is_builder() {
            return ProbeOutcome::Unreachable;
        }
        match self.config.failure_policy {
            FailurePolicy::Browser => ProbeOutcome::CorsBlocked,
            FailurePolicy::Strict if tcp_connect_failed(err) => ProbeOutcome::Unreachable,
            FailurePolicy::Strict => ProbeOutcome::CorsBlocked,
        }
    }
}

/// True when the error chain shows no TCP connection was ever established.
///
/// reqwest reports TLS handshake failures as connect errors too, so `is_connect`
/// alone is not enough.
fn tcp_connect_failed(err: &(dyn StdError + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::HostUnreachable
                    | io::ErrorKind::NetworkUnreachable
                    | io::ErrorKind::AddrNotAvailable
                    | io::ErrorKind::TimedOut
            ) {
                return true;
            }
        }
        // hyper-util labels resolver failures "dns error".
        if e.to_string().contains("dns error") {
            return true;
        }
        source = e.source();
    }
    false
}

impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let outcome = match time::timeout(timeout, self.fetch(url)).await {
            Err(_elapsed) => ProbeOutcome::Unreachable,
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                debug!(url, error = %err, "probe transport failure");
                self.classify_failure(&err)
            }
        };
        debug!(url, status = %outcome.status(), "probe finished");
        outcome
    }
}

fn cors_allows(headers: &HeaderMap, origin: &str) -> bool {
    match headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()) {
        Some(allowed) => {
            let allowed = allowed.trim();
            allowed == "*" || allowed == origin
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped(&'static str, io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.1)
        }
    }

    #[test]
    fn outcome_maps_to_status() {
        assert_eq!(ProbeOutcome::Unreachable.status(), ProbeStatus::Unreachable);
        assert_eq!(ProbeOutcome::CorsBlocked.status(), ProbeStatus::ReachableCorsBlocked);
        assert_eq!(ProbeOutcome::OpenNotNmos.status(), ProbeStatus::OpenNotNmos);
        assert_eq!(
            ProbeOutcome::Readable(Value::Null).status(),
            ProbeStatus::ReadableOk
        );
    }

    #[test]
    fn cors_header_must_match_origin_or_wildcard() {
        let mut headers = HeaderMap::new();
        assert!(!cors_allows(&headers, "http://ui.local"));

        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        assert!(cors_allows(&headers, "http://ui.local"));

        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("http://other"));
        assert!(!cors_allows(&headers, "http://ui.local"));

        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("http://ui.local"));
        assert!(cors_allows(&headers, "http://ui.local"));
    }

    #[test]
    fn refused_or_unresolved_connect_means_no_tcp_connection() {
        let refused = Wrapped("tcp connect error", io::ErrorKind::ConnectionRefused.into());
        assert!(tcp_connect_failed(&refused));

        let unroutable = Wrapped("tcp connect error", io::ErrorKind::HostUnreachable.into());
        assert!(tcp_connect_failed(&unroutable));

        let dns = Wrapped("dns error", io::Error::other("failed to lookup address"));
        assert!(tcp_connect_failed(&dns));
    }

    #[test]
    fn failures_after_connect_keep_the_connection_evidence() {
        let handshake = Wrapped("tls handshake eof", io::ErrorKind::UnexpectedEof.into());
        assert!(!tcp_connect_failed(&handshake));

        let reset = Wrapped("connection error", io::ErrorKind::ConnectionReset.into());
        assert!(!tcp_connect_failed(&reset));
    }
}
