use crate::{
    aggregator::TickAggregator,
    bar::{Bar, BarInterval},
    dispatch::OrderDispatcher,
    error::StrategyError,
    moving_average::{DEFAULT_LONG_WINDOW, DEFAULT_SHORT_WINDOW, MovingAverageEngine},
    resample::BarResampler,
    signal::{Signal, SignalDetector},
};
use serde::{Deserialize, Serialize};
use tickbar_data::{
    store::Retention,
    tick::{Tick, TickSink},
};
use tracing::warn;

/// Default number of bars & samples retained per symbol.
pub const DEFAULT_RETENTION: Retention = Retention::Last(5000);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub retention: Retention,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
            retention: DEFAULT_RETENTION,
        }
    }
}

/// Live ticks → 30s bars → 1m bars → moving averages → crossover signals → dispatcher.
///
/// Owns all aggregation & signal state. Every stage runs synchronously inside
/// [`Pipeline::on_tick`].
#[derive(Debug)]
pub struct Pipeline<Dispatcher> {
    tier1: TickAggregator,
    tier2: BarResampler,
    averages: MovingAverageEngine,
    detector: SignalDetector,
    dispatcher: Dispatcher,
    rejected: u64,
}

impl<Dispatcher> Pipeline<Dispatcher>
where
    Dispatcher: OrderDispatcher,
{
    pub fn new(config: PipelineConfig, dispatcher: Dispatcher) -> Result<Self, StrategyError> {
        Ok(Self {
            tier1: TickAggregator::new(config.retention),
            tier2: BarResampler::new(config.retention),
            averages: MovingAverageEngine::new(
                config.short_window,
                config.long_window,
                config.retention,
            )?,
            detector: SignalDetector::new(),
            dispatcher,
            rejected: 0,
        })
    }

    /// Process one live tick, returning any signals it produced (already dispatched).
    pub fn on_tick(&mut self, tick: &Tick) -> Vec<Signal> {
        match self.tier1.add_tick(tick) {
            Ok(Some(sealed)) => self.on_sealed_bar(&sealed),
            Ok(None) => Vec::new(),
            Err(rejection) => {
                self.rejected += 1;
                warn!(symbol = %tick.symbol, %rejection, "rejected out of order tick");
                Vec::new()
            }
        }
    }

    /// Force-seal the open 30s bar of `symbol` and cascade it like a regularly sealed bar.
    ///
    /// Later ticks for the flushed bucket are rejected. Returns any signals produced.
    pub fn flush(&mut self, symbol: &str) -> Vec<Signal> {
        match self.tier1.seal_open(symbol) {
            Some(sealed) => self.on_sealed_bar(&sealed),
            None => Vec::new(),
        }
    }

    fn on_sealed_bar(&mut self, sealed: &Bar) -> Vec<Signal> {
        // Recompute the minute the sealed bar belongs to from all its sealed halves
        let minute = BarInterval::OneMinute.bucket_start(sealed.interval_start);
        let halves = self.tier1.sealed_since(&sealed.symbol, minute);
        self.tier2.resample(&halves);

        let samples = self.averages.update(self.tier2.sealed(&sealed.symbol));

        let mut signals = Vec::new();
        for sample in &samples {
            if let Some(signal) = self.detector.on_sample(sample) {
                self.dispatcher.dispatch(&signal);
                signals.push(signal);
            }
        }
        signals
    }

    pub fn tier1(&self) -> &TickAggregator {
        &self.tier1
    }

    pub fn tier2(&self) -> &BarResampler {
        &self.tier2
    }

    pub fn averages(&self) -> &MovingAverageEngine {
        &self.averages
    }

    pub fn detector(&self) -> &SignalDetector {
        &self.detector
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Ticks refused by the 30s aggregator.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl<Dispatcher> TickSink for Pipeline<Dispatcher>
where
    Dispatcher: OrderDispatcher,
{
    fn accept(&mut self, tick: Tick) {
        self.on_tick(&tick);
    }
}
