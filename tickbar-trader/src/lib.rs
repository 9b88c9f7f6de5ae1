#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, clippy::needless_return)]

//! # Tickbar-Trader
//! Live moving average crossover trader.
//!
//! Authenticates against the HTTP API, subscribes to the configured symbols, feeds live
//! trades through the [`Pipeline`](tickbar_strategy::pipeline::Pipeline) and places a market
//! order for every crossover signal. Configured via `TICKBAR_*` environment variables, see
//! [`TraderConfig`](config::TraderConfig).

/// HTTP collaborators: authentication, stream ids & orders.
pub mod client;

/// Environment driven [`TraderConfig`](config::TraderConfig).
pub mod config;

pub mod error;
