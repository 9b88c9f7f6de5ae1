use crate::client::ClientError;
use thiserror::Error;
use tickbar_data::error::FeedError;
use tickbar_strategy::error::StrategyError;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: String,
        value: String,
        reason: String,
    },

    #[error("invalid default url: {0}")]
    Url(#[from] url::ParseError),

    #[error("no symbols configured")]
    NoSymbols,

    #[error("{count} symbols configured, at most {max} are supported")]
    TooManySymbols { count: usize, max: usize },
}

/// All errors that stop the trader binary.
#[derive(Debug, Error)]
pub enum TraderError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("client: {0}")]
    Client(#[from] ClientError),

    #[error("strategy: {0}")]
    Strategy(#[from] StrategyError),

    #[error("feed: {0}")]
    Feed(#[from] FeedError),
}
