//! Static catalogue of NMOS API families and the shape analysis applied to readable roots.
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// One recognised NMOS API root: the URL segment probed and the label shown for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownApi {
    pub path: &'static str,
    pub name: &'static str,
}

/// Catalogue order is the probe order within a base path.
pub const KNOWN_APIS: &[KnownApi] = &[
    KnownApi { path: "node", name: "Node IS-04" },
    KnownApi { path: "connection", name: "Node IS-05" },
    KnownApi { path: "query", name: "Registry IS-04 Query" },
    KnownApi { path: "registration", name: "Registry IS-04 Registration" },
];

pub const NODE_API_NAME: &str = "Node IS-04";
pub const CONNECTION_API_NAME: &str = "Node IS-05";
pub const NODE_URL_SEGMENT: &str = "/node";
pub const CONNECTION_URL_SEGMENT: &str = "/connection";

/// Placeholder version when an endpoint is present but nothing could be read from it.
pub const VERSION_ROOT: &str = "root";
/// Placeholder version when a body was read but listed no versions.
pub const VERSION_DETECTED: &str = "detected";

/// First catalogue entry whose segment is contained in `api_path`.
pub fn find_known_api(api_path: &str) -> Option<&'static KnownApi> {
    KNOWN_APIS.iter().find(|api| api_path.contains(api.path))
}

/// What a readable API root told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiShape {
    pub api_type: String,
    pub versions: Vec<String>,
}

/// Inspect a parsed root body.
///
/// Returns `None` for JSON-falsy bodies (`null`, `false`, `0`, `""`). Versions are
/// the string members of an array body containing `vX.Y`; an empty match list
/// becomes `["detected"]`.
pub fn analyze_response(data: &Value, api_path: &str) -> Option<ApiShape> {
    if is_falsy(data) {
        return None;
    }

    let api_type = find_known_api(api_path)
        .map(|api| api.name)
        .unwrap_or("Unknown")
        .to_string();

    let mut versions = extract_versions(data);
    if versions.is_empty() {
        versions.push(VERSION_DETECTED.to_string());
    }

    Some(ApiShape { api_type, versions })
}

/// Version-like strings in an array body, in body order.
pub fn extract_versions(data: &Value) -> Vec<String> {
    let Value::Array(items) = data else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| version_pattern().is_match(s))
        .map(str::to_string)
        .collect()
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"v\d+\.\d+").expect("version pattern is valid"))
}

fn is_falsy(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
