use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid strategy configuration.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum StrategyError {
    #[error("moving average windows must be non-zero: short={short}, long={long}")]
    ZeroWindow { short: usize, long: usize },

    #[error("short window {short} must be smaller than long window {long}")]
    WindowOrder { short: usize, long: usize },
}

/// Why the aggregator refused a tick.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum TickRejection {
    #[error("tick bucket {bucket} precedes the open bucket {open}")]
    BeforeOpenBucket {
        bucket: DateTime<Utc>,
        open: DateTime<Utc>,
    },

    #[error("tick bucket {bucket} is at or before the last sealed bucket {sealed}")]
    AlreadySealed {
        bucket: DateTime<Utc>,
        sealed: DateTime<Utc>,
    },
}
