use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::nmos::{KnownApi, KNOWN_APIS};
use crate::ports;
use crate::target;
use crate::types::Protocol;

/// Which of the two port inputs a run uses.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortMode {
    #[default]
    List,
    Range,
}

/// Caller-facing settings, kept as raw text where the user typed text.
///
/// Every field has a default so partial JSON bodies and CLI flags can be layered on top.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct ScanSettings {
    pub port_mode: PortMode,
    pub port_list: String,
    pub port_range_start: String,
    pub port_range_end: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub concurrency: usize,
    pub protocol: Protocol,
    pub endpoint: String,
    pub base_path: String,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            port_mode: PortMode::List,
            port_list: ports::default_port_list(),
            port_range_start: String::new(),
            port_range_end: String::new(),
            interval_ms: 0,
            timeout_ms: 100,
            concurrency: 10,
            protocol: Protocol::Http,
            endpoint: "/x-nmos".to_string(),
            base_path: String::new(),
        }
    }
}

impl ScanSettings {
    /// Ports selected by the active mode, sorted ascending.
    pub fn ports(&self) -> Result<Vec<u16>, ValidationError> {
        let ports = match self.port_mode {
            PortMode::List => ports::parse_port_list(&self.port_list),
            PortMode::Range => ports::parse_port_range(&self.port_range_start, &self.port_range_end)?,
        };
        if ports.is_empty() {
            return Err(ValidationError::NoPorts);
        }
        Ok(ports)
    }

    pub fn base_paths(&self) -> Vec<String> {
        ports::parse_base_paths(&self.base_path)
    }

    /// Validate everything and freeze it into a request for `target`.
    pub fn to_request(&self, target: &str) -> Result<ScanRequest, ValidationError> {
        let target = target::normalize_target(target)?;
        let ports = self.ports()?;
        if self.concurrency == 0 {
            return Err(ValidationError::ZeroConcurrency);
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::ZeroTimeout);
        }
        Ok(ScanRequest {
            target,
            protocol: self.protocol,
            ports,
            base_paths: self.base_paths(),
            endpoint: self.endpoint.trim().to_string(),
            timeout: Duration::from_millis(self.timeout_ms),
            interval: Duration::from_millis(self.interval_ms),
            concurrency: self.concurrency,
        })
    }
}

/// Immutable input of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: String,
    pub protocol: Protocol,
    pub ports: Vec<u16>,
    pub base_paths: Vec<String>,
    pub endpoint: String,
    pub timeout: Duration,
    pub interval: Duration,
    pub concurrency: usize,
}

impl ScanRequest {
    /// `{protocol}://{target}:{port}{base_path}{endpoint}/{api}/`
    pub fn url_for(&self, port: u16, base_path: &str, api: &KnownApi) -> String {
        format!(
            "{}://{}:{}{}{}/{}/",
            self.protocol, self.target, port, base_path, self.endpoint, api.path
        )
    }

    /// Progress denominator: ports x base paths x known APIs.
    pub fn total_tasks(&self) -> u64 {
        self.ports.len() as u64 * self.base_paths.len() as u64 * KNOWN_APIS.len() as u64
    }
}
