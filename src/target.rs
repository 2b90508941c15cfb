use crate::error::ValidationError;

/// Where a target lives, as far as the consent gate is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScope {
    Local,
    Public,
}

impl TargetScope {
    pub fn is_local(&self) -> bool {
        matches!(self, TargetScope::Local)
    }
}

/// Trim a user supplied host and reject empty input.
pub fn normalize_target(target: &str) -> Result<String, ValidationError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTarget);
    }
    Ok(trimmed.to_string())
}

/// Classify a host string as local/private or public.
///
/// Local means `localhost`, any `*.local` name, or a dotted quad whose leading
/// octets fall into 10/8, 127/8, 192.168/16, 169.254/16 or 172.16/12. Octets are
/// only required to be decimal digits, so `10.300.0.1` still counts as local.
/// Everything else, including malformed input, is public.
pub fn classify_target(target: &str) -> TargetScope {
    let normalized = target.to_lowercase();
    if normalized == "localhost" || normalized.ends_with(".local") {
        return TargetScope::Local;
    }

    let parts: Vec<&str> = normalized.split('.').collect();
    if parts.len() != 4 {
        return TargetScope::Public;
    }
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
    {
        return TargetScope::Public;
    }

    // Oversized octets cannot match any of the ranges below, so `None` is fine.
    let a = parts[0].parse::<u32>().ok();
    let b = parts[1].parse::<u32>().ok();
    let local = match (a, b) {
        (Some(10), _) | (Some(127), _) => true,
        (Some(192), Some(168)) => true,
        (Some(169), Some(254)) => true,
        (Some(172), Some(b)) => (16..=31).contains(&b),
        _ => false,
    };
    if local {
        TargetScope::Local
    } else {
        TargetScope::Public
    }
}

/// Consent gate used by the CLI and the control server before a scan is started.
pub fn ensure_scan_allowed(target: &str, allow_public: bool) -> Result<(), ValidationError> {
    if allow_public || classify_target(target).is_local() {
        Ok(())
    } else {
        Err(ValidationError::PublicTargetNotConfirmed(target.to_string()))
    }
}
