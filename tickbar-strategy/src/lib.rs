#![forbid(unsafe_code)]
#![warn(unused, clippy::cognitive_complexity, clippy::needless_return)]

//! # Tickbar-Strategy
//! Cascading bar aggregation and moving average crossover detection over live
//! [`Tick`](tickbar_data::tick::Tick)s:
//! * [`TickAggregator`](aggregator::TickAggregator): ticks into 30s OHLCV bars.
//! * [`BarResampler`](resample::BarResampler): sealed 30s bars into 1m bars.
//! * [`MovingAverageEngine`](moving_average::MovingAverageEngine): short & long rolling means.
//! * [`SignalDetector`](signal::SignalDetector): de-duplicated crossover signals.
//! * [`Pipeline`](pipeline::Pipeline): the stages above wired to an
//!   [`OrderDispatcher`](dispatch::OrderDispatcher).

/// OHLCV [`Bar`](bar::Bar) model and bucket alignment.
pub mod bar;

/// Strategy configuration errors and tick rejections.
pub mod error;

/// Tier-1 tick to 30s bar aggregation.
pub mod aggregator;

/// Tier-2 30s to 1m bar resampling.
pub mod resample;

pub mod moving_average;

/// Crossover signal detection.
pub mod signal;

/// Signal hand-off to order placement.
pub mod dispatch;

pub mod pipeline;
