use std::collections::BTreeSet;

use crate::error::ValidationError;

/// Largest inclusive span accepted in range mode.
pub const MAX_RANGE_PORTS: u32 = 10_000;

/// Parse a comma separated port list into a sorted, deduplicated set of ports (1..=65535).
///
/// Each token is trimmed and read as a leading integer (`"80abc"` is 80).
/// Tokens that do not start with a number, or fall outside the port range, are
/// dropped silently; they never fail the whole list.
pub fn parse_port_list(s: &str) -> Vec<u16> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    let set: BTreeSet<u16> = s
        .split(',')
        .filter_map(|tok| parse_leading_int(tok.trim()))
        .filter(|p| (1..=65535).contains(p))
        .map(|p| p as u16)
        .collect();
    set.into_iter().collect()
}

/// Expand an inclusive `start`..=`end` range given as raw text bounds.
pub fn parse_port_range(start: &str, end: &str) -> Result<Vec<u16>, ValidationError> {
    if start.trim().is_empty() || end.trim().is_empty() {
        return Err(ValidationError::MissingRangeBound);
    }
    let s = parse_leading_int(start)
        .ok_or_else(|| ValidationError::InvalidRangeBound(start.to_string()))?;
    let e = parse_leading_int(end)
        .ok_or_else(|| ValidationError::InvalidRangeBound(end.to_string()))?;

    if s > e {
        return Err(ValidationError::RangeReversed { start: s, end: e });
    }
    if s < 1 || e > 65535 {
        return Err(ValidationError::RangeOutOfBounds { start: s, end: e });
    }
    let count = e - s + 1;
    if count > i64::from(MAX_RANGE_PORTS) {
        return Err(ValidationError::RangeTooLarge {
            count,
            max: MAX_RANGE_PORTS,
        });
    }
    Ok((s as u16..=e as u16).collect())
}

/// Split a comma separated base path list. Empty input means a single empty prefix.
///
/// Order is kept and duplicates are not removed: the order is the scan order.
pub fn parse_base_paths(s: &str) -> Vec<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return vec![String::new()];
    }
    trimmed.split(',').map(|p| p.trim().to_string()).collect()
}

/// Union of an existing port list and extra ports, sorted and rendered back to list form.
pub fn merge_port_list(existing: &str, extra: &[u16]) -> String {
    let mut set: BTreeSet<u16> = parse_port_list(existing).into_iter().collect();
    set.extend(extra.iter().copied().filter(|p| *p > 0));
    set.iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Ports NMOS nodes and registries are commonly deployed on.
pub fn default_ports() -> Vec<u16> {
    const DEFAULT: &[u16] = &[
        80, 443, 1080, 3000, 3211, 3212, 4000, 5000, 8000, 8010, 8080, 8081, 8082, 8235, 8443,
        8870, 9000, 11000, 12345,
    ];
    DEFAULT.to_vec()
}

pub fn default_port_list() -> String {
    merge_port_list("", &default_ports())
}

/// Read a leading, optionally signed decimal integer, ignoring anything after the digits.
///
/// Leading whitespace is skipped. Values too large for `i64` saturate so that
/// they still land outside every valid port range.
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits_len == 0 {
        return None;
    }
    let value = rest[..digits_len].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}
