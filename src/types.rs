use std::fmt;

use serde::{Deserialize, Serialize};

/// URL scheme used for every probe of a run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified outcome of a single GET.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    ReadableOk,
    ReachableCorsBlocked,
    OpenNotNmos,
    Unreachable,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::ReadableOk => "READABLE_OK",
            ProbeStatus::ReachableCorsBlocked => "REACHABLE_CORS_BLOCKED",
            ProbeStatus::OpenNotNmos => "OPEN_NOT_NMOS",
            ProbeStatus::Unreachable => "UNREACHABLE",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered endpoint. Only readable or CORS-blocked probes become records.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub port: u16,
    pub protocol: Protocol,
    pub url: String,
    pub status: ProbeStatus,
    pub api_type: Option<String>,
    pub versions: Vec<String>,
    /// Prefix used for the probe; an empty prefix is stored as `/`.
    pub base_path: String,
    pub timestamp: String,
}

/// Confidence that a port hosts a real NMOS service.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Probability {
    High,
    Medium,
    Low,
    Unknown,
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Probability::High => "HIGH",
            Probability::Medium => "MEDIUM",
            Probability::Low => "LOW",
            Probability::Unknown => "-",
        })
    }
}

/// How a run terminated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed,
    Stopped,
}

/// Final snapshot of a run: counters plus every record collected.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanResults {
    pub outcome: ScanOutcome,
    pub total: u64,
    pub completed: u64,
    pub entries: Vec<ProbeResult>,
}

impl ScanResults {
    pub fn percent(&self) -> u64 {
        percent(self.completed, self.total)
    }
}

/// Rounded progress percentage; 0 when nothing is scheduled.
pub fn percent(completed: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_wire_form() {
        let s = serde_json::to_string(&ProbeStatus::ReachableCorsBlocked).unwrap();
        assert_eq!(s, "\"REACHABLE_CORS_BLOCKED\"");
        assert_eq!(ProbeStatus::ReadableOk.to_string(), "READABLE_OK");
    }

    #[test]
    fn unknown_probability_renders_placeholder() {
        assert_eq!(Probability::Unknown.to_string(), "-");
        assert_eq!(serde_json::to_string(&Probability::Unknown).unwrap(), "\"UNKNOWN\"");
    }

    #[test]
    fn percent_rounds_and_handles_empty() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(4, 4), 100);
    }
}
