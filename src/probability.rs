//! Confidence heuristic over the accumulated results of a run.
//!
//! Pure: the verdict for a port depends only on the slice passed in, so it can be
//! recomputed at any point while results are still streaming in.
use crate::nmos::{CONNECTION_API_NAME, CONNECTION_URL_SEGMENT, NODE_API_NAME, NODE_URL_SEGMENT};
use crate::types::{ProbeResult, ProbeStatus, Probability, Protocol};

/// Estimate how likely `port` over `protocol` is a real NMOS node or registry.
///
/// Direct evidence on the port wins: readable roots are judged by their API
/// type, CORS-blocked roots by their URL. A port with no or weak direct evidence
/// is lifted to MEDIUM when another port of the same protocol looks like a node
/// or connection API.
pub fn estimate_probability(results: &[ProbeResult], port: u16, protocol: Protocol) -> Probability {
    let mine: Vec<&ProbeResult> = results
        .iter()
        .filter(|r| r.port == port && r.protocol == protocol)
        .collect();

    let others = results
        .iter()
        .filter(|r| r.port != port && r.protocol == protocol);
    let mut other_node = false;
    let mut other_connection = false;
    for r in others {
        other_node |= r.url.contains(NODE_URL_SEGMENT);
        other_connection |= r.url.contains(CONNECTION_URL_SEGMENT);
    }
    let sibling_evidence = other_node || other_connection;

    let readable: Vec<&ProbeResult> = mine
        .iter()
        .copied()
        .filter(|r| r.status == ProbeStatus::ReadableOk)
        .collect();
    if !readable.is_empty() {
        let names_api = |name: &str| {
            readable
                .iter()
                .any(|r| r.api_type.as_deref().is_some_and(|t| t.contains(name)))
        };
        return verdict(names_api(NODE_API_NAME), names_api(CONNECTION_API_NAME), sibling_evidence);
    }

    let blocked: Vec<&ProbeResult> = mine
        .iter()
        .copied()
        .filter(|r| r.status == ProbeStatus::ReachableCorsBlocked)
        .collect();
    if !blocked.is_empty() {
        let has_segment = |seg: &str| blocked.iter().any(|r| r.url.contains(seg));
        return verdict(
            has_segment(NODE_URL_SEGMENT),
            has_segment(CONNECTION_URL_SEGMENT),
            sibling_evidence,
        );
    }

    if sibling_evidence {
        Probability::Medium
    } else {
        Probability::Unknown
    }
}

fn verdict(has_node: bool, has_connection: bool, sibling_evidence: bool) -> Probability {
    match (has_node, has_connection) {
        (true, true) => Probability::High,
        (true, false) | (false, true) => Probability::Medium,
        (false, false) if sibling_evidence => Probability::Medium,
        (false, false) => Probability::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(port: u16, api: &str, status: ProbeStatus, api_type: Option<&str>) -> ProbeResult {
        ProbeResult {
            port,
            protocol: Protocol::Http,
            url: format!("http://10.0.0.5:{port}/x-nmos/{api}/"),
            status,
            api_type: api_type.map(str::to_string),
            versions: vec!["v1.3/".into()],
            base_path: "/".into(),
            timestamp: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn node_and_connection_readable_is_high() {
        let results = vec![
            rec(80, "node", ProbeStatus::ReadableOk, Some("Node IS-04")),
            rec(80, "connection", ProbeStatus::ReadableOk, Some("Node IS-05")),
        ];
        assert_eq!(estimate_probability(&results, 80, Protocol::Http), Probability::High);
    }

    #[test]
    fn single_api_is_medium() {
        let results = vec![rec(80, "node", ProbeStatus::ReadableOk, Some("Node IS-04"))];
        assert_eq!(estimate_probability(&results, 80, Protocol::Http), Probability::Medium);
    }

    #[test]
    fn registry_only_is_low_without_siblings() {
        let results = vec![rec(8235, "query", ProbeStatus::ReadableOk, Some("Registry IS-04 Query"))];
        assert_eq!(estimate_probability(&results, 8235, Protocol::Http), Probability::Low);
    }

    #[test]
    fn registry_with_node_sibling_is_medium() {
        let results = vec![
            rec(8235, "query", ProbeStatus::ReadableOk, Some("Registry IS-04 Query")),
            rec(80, "node", ProbeStatus::ReachableCorsBlocked, Some("Node IS-04")),
        ];
        assert_eq!(estimate_probability(&results, 8235, Protocol::Http), Probability::Medium);
    }

    #[test]
    fn readable_evidence_takes_precedence_over_blocked() {
        let results = vec![
            rec(80, "query", ProbeStatus::ReadableOk, Some("Registry IS-04 Query")),
            rec(80, "node", ProbeStatus::ReachableCorsBlocked, Some("Node IS-04")),
            rec(80, "connection", ProbeStatus::ReachableCorsBlocked, Some("Node IS-05")),
        ];
        assert_eq!(estimate_probability(&results, 80, Protocol::Http), Probability::Low);
    }

    #[test]
    fn blocked_roots_are_judged_by_url() {
        let results = vec![
            rec(3000, "node", ProbeStatus::ReachableCorsBlocked, None),
            rec(3000, "connection", ProbeStatus::ReachableCorsBlocked, None),
        ];
        assert_eq!(estimate_probability(&results, 3000, Protocol::Http), Probability::High);
    }

    #[test]
    fn port_without_records_inherits_sibling_evidence() {
        let results = vec![rec(80, "connection", ProbeStatus::ReadableOk, Some("Node IS-05"))];
        assert_eq!(estimate_probability(&results, 8080, Protocol::Http), Probability::Medium);
        assert_eq!(estimate_probability(&results, 8080, Protocol::Https), Probability::Unknown);
        assert_eq!(estimate_probability(&[], 80, Protocol::Http), Probability::Unknown);
    }

    #[test]
    fn estimate_is_repeatable() {
        let results = vec![
            rec(80, "node", ProbeStatus::ReadableOk, Some("Node IS-04")),
            rec(81, "query", ProbeStatus::ReachableCorsBlocked, None),
        ];
        let first = estimate_probability(&results, 81, Protocol::Http);
        assert_eq!(first, estimate_probability(&results, 81, Protocol::Http));
        assert_eq!(first, Probability::Medium);
    }
}
