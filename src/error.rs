use thiserror::Error;

/// Input problems detected before a scan starts. No probe is issued when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please enter a target IP address or hostname")]
    EmptyTarget,

    #[error("port range needs both a start and an end")]
    MissingRangeBound,

    #[error("invalid port range bound: {0:?}")]
    InvalidRangeBound(String),

    #[error("invalid port range {start}-{end} (start > end)")]
    RangeReversed { start: i64, end: i64 },

    #[error("port range {start}-{end} must stay within 1-65535")]
    RangeOutOfBounds { start: i64, end: i64 },

    #[error("port range exceeds maximum of {max} ports ({count} requested)")]
    RangeTooLarge { count: i64, max: u32 },

    #[error("please specify at least one port (list or range)")]
    NoPorts,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("target {0} is not a local address range; confirm authorization to scan it")]
    PublicTargetNotConfirmed(String),
}
