use ::time::{format_description::well_known, OffsetDateTime};
use tokio::time;
use tracing::debug;

use crate::config::ScanRequest;
use crate::nmos::{analyze_response, KnownApi, KNOWN_APIS, VERSION_ROOT};
use crate::probe::{ProbeOutcome, Prober};
use crate::scanner::RunState;
use crate::types::{ProbeResult, Protocol};

/// Probe every (base path, known API) root of one port, in that order.
///
/// Every probe counts toward progress whatever its outcome. Only readable and
/// CORS-blocked roots produce records. When a stop is requested the records
/// gathered so far are returned as-is.
pub async fn explore_port<P: Prober>(
    prober: &P,
    request: &ScanRequest,
    port: u16,
    state: &RunState,
) -> Vec<ProbeResult> {
    let mut found = Vec::new();

    for base_path in &request.base_paths {
        for api in KNOWN_APIS {
            if state.is_stop_requested() {
                debug!(port, collected = found.len(), "stop requested, leaving port early");
                return found;
            }

            let url = request.url_for(port, base_path, api);
            let outcome = prober.probe(&url, request.timeout).await;
            if let Some(record) = into_record(outcome, port, request.protocol, &url, base_path, api) {
                found.push(record);
            }
            state.task_completed();

            if !request.interval.is_zero() {
                tokio::select! {
                    _ = time::sleep(request.interval) => {}
                    _ = state.cancel.cancelled() => {}
                }
            }
        }
    }

    found
}

fn into_record(
    outcome: ProbeOutcome,
    port: u16,
    protocol: Protocol,
    url: &str,
    base_path: &str,
    api: &KnownApi,
) -> Option<ProbeResult> {
    let status = outcome.status();
    let (api_type, versions) = match outcome {
        ProbeOutcome::Readable(data) => match analyze_response(&data, api.path) {
            Some(shape) => (Some(shape.api_type), shape.versions),
            None => (None, vec![VERSION_ROOT.to_string()]),
        },
        // No body to look at: the catalogue entry is all we know.
        ProbeOutcome::CorsBlocked => (Some(api.name.to_string()), vec![VERSION_ROOT.to_string()]),
        ProbeOutcome::Unreachable | ProbeOutcome::OpenNotNmos => return None,
    };

    Some(ProbeResult {
        port,
        protocol,
        url: url.to_string(),
        status,
        api_type,
        versions,
        base_path: if base_path.is_empty() {
            "/".to_string()
        } else {
            base_path.to_string()
        },
        timestamp: now_rfc3339(),
    })
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeStatus;
    use serde_json::json;

    #[test]
    fn readable_root_gets_catalogue_name_and_versions() {
        let rec = into_record(
            ProbeOutcome::Readable(json!(["v1.2/", "v1.3/"])),
            80,
            Protocol::Http,
            "http://h:80/x-nmos/node/",
            "",
            &KNOWN_APIS[0],
        )
        .unwrap();
        assert_eq!(rec.status, ProbeStatus::ReadableOk);
        assert_eq!(rec.api_type.as_deref(), Some("Node IS-04"));
        assert_eq!(rec.versions, vec!["v1.2/", "v1.3/"]);
        assert_eq!(rec.base_path, "/");
    }

    #[test]
    fn cors_blocked_root_uses_root_sentinel() {
        let rec = into_record(
            ProbeOutcome::CorsBlocked,
            3000,
            Protocol::Https,
            "https://h:3000/p/x-nmos/query/",
            "/p",
            &KNOWN_APIS[2],
        )
        .unwrap();
        assert_eq!(rec.status, ProbeStatus::ReachableCorsBlocked);
        assert_eq!(rec.api_type.as_deref(), Some("Registry IS-04 Query"));
        assert_eq!(rec.versions, vec![VERSION_ROOT]);
        assert_eq!(rec.base_path, "/p");
    }

    #[test]
    fn null_body_has_no_api_type() {
        let rec = into_record(
            ProbeOutcome::Readable(json!(null)),
            80,
            Protocol::Http,
            "u",
            "",
            &KNOWN_APIS[0],
        )
        .unwrap();
        assert_eq!(rec.api_type, None);
        assert_eq!(rec.versions, vec![VERSION_ROOT]);
    }

    #[test]
    fn negative_outcomes_produce_no_record() {
        for outcome in [ProbeOutcome::Unreachable, ProbeOutcome::OpenNotNmos] {
            assert!(into_record(outcome, 80, Protocol::Http, "u", "", &KNOWN_APIS[0]).is_none());
        }
    }
}
