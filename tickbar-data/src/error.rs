use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures of the transport carrying the trade feed.
///
/// Every [`TransportError`] is recoverable: the
/// [`FeedConnection`](crate::connection::FeedConnection) answers it with a reconnect.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum TransportError {
    #[error("failed to connect to feed: {0}")]
    Connect(String),

    #[error("failed to send to feed: {0}")]
    Send(String),

    #[error("failed to receive from feed: {0}")]
    Receive(String),

    #[error("feed read timeout: no data received for {0:?}")]
    ReadTimeout(Duration),

    #[error("feed connection closed by peer: {0}")]
    ClosedByPeer(String),

    #[error("failed to encode subscription request: {0}")]
    Encode(String),
}

/// Failures of the session collaborators (authentication and stream-id issuance).
///
/// These are never retried by the core.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("failed to obtain stream id: {0}")]
    StreamId(String),

    #[error("invalid feed url: {0}")]
    Url(String),
}

/// All errors surfaced by the feed connection.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("session: {0}")]
    Session(#[from] SessionError),

    #[error("gave up after {attempts} failed reconnect attempts, last error: {last_error}")]
    ReconnectExhausted {
        attempts: u32,
        last_error: TransportError,
    },
}

impl FeedError {
    /// Determine if an error must stop the feed rather than trigger a reconnect.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Transport(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_is_terminal() {
        struct TestCase {
            input: FeedError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: is not terminal w/ FeedError::Transport
                input: FeedError::from(TransportError::Connect("refused".to_string())),
                expected: false,
            },
            TestCase {
                // TC1: is not terminal w/ read timeout
                input: FeedError::from(TransportError::ReadTimeout(Duration::from_secs(120))),
                expected: false,
            },
            TestCase {
                // TC2: is terminal w/ authentication failure
                input: FeedError::from(SessionError::Authentication("401".to_string())),
                expected: true,
            },
            TestCase {
                // TC3: is terminal w/ stream id failure
                input: FeedError::from(SessionError::StreamId("503".to_string())),
                expected: true,
            },
            TestCase {
                // TC4: is terminal w/ exhausted reconnects
                input: FeedError::ReconnectExhausted {
                    attempts: 5,
                    last_error: TransportError::ClosedByPeer("going away".to_string()),
                },
                expected: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_terminal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
