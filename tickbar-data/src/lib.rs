#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, clippy::needless_return)]

//! # Tickbar-Data
//! Resilient trade-feed plumbing for the tickbar crossover trader:
//! * [`FeedConnection`](connection::FeedConnection): stream-id bound session with capped,
//!   delayed reconnects and scoped transport teardown.
//! * [`FeedMessage`](protocol::FeedMessage): wire decoding of the trade feed.
//! * [`TickRouter`](router::TickRouter): splits trade records into historical and live
//!   [`Tick`](tick::Tick)s, dropping malformed records.
//! * [`HistoricalStore`](store::HistoricalStore): retention-bounded per-symbol history.

/// Errors generated by the feed connection, its transport and session collaborators.
pub mod error;

/// Normalised [`Tick`](tick::Tick) model and the [`TickSink`](tick::TickSink) seam.
pub mod tick;

/// Inbound and outbound feed wire format.
pub mod protocol;

/// Validation and historical/live routing of decoded trade records.
pub mod router;

/// Retention policy and the historical tick store.
pub mod store;

/// Token and stream-id collaborators, plus feed url derivation.
pub mod session;

/// [`Transport`](transport::Transport) & [`Connector`](transport::Connector) abstractions with a
/// `tokio-tungstenite` implementation.
pub mod transport;

/// Stream wrappers used by the transport.
pub mod streams;

/// Reconnecting feed session.
pub mod connection;
