use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::probability::estimate_probability;
use crate::types::{ProbeResult, Probability, Protocol};

/// All records of one (port, protocol) pair with the verdict for that pair.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PortGroup {
    pub port: u16,
    pub protocol: Protocol,
    pub probability: Probability,
    pub results: Vec<ProbeResult>,
}

/// Group records by port and protocol, ordered by port then protocol.
///
/// Records inside a group keep their collection order. The verdict of each
/// group is computed against the full record set.
pub fn group_results(results: &[ProbeResult]) -> Vec<PortGroup> {
    let mut groups: BTreeMap<(u16, Protocol), Vec<ProbeResult>> = BTreeMap::new();
    for r in results {
        groups.entry((r.port, r.protocol)).or_default().push(r.clone());
    }
    groups
        .into_iter()
        .map(|((port, protocol), members)| PortGroup {
            port,
            protocol,
            probability: estimate_probability(results, port, protocol),
            results: members,
        })
        .collect()
}

/// Ports that produced at least one record, ascending.
pub fn discovered_ports(results: &[ProbeResult]) -> Vec<u16> {
    let set: BTreeSet<u16> = results.iter().map(|r| r.port).collect();
    set.into_iter().collect()
}
