//! Tier-1 aggregation of live ticks into 30 second OHLCV bars.
//!
//! Bucket boundaries come from tick event time, never the wall clock, so replayed ticks
//! aggregate exactly like live ones. A bucket only seals once a tick for a later bucket arrives
//! or [`TickAggregator::get_bars`] force-seals it.

use crate::{
    bar::{Bar, BarInterval},
    error::TickRejection,
};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use itertools::Itertools;
use std::{cmp::Ordering, collections::VecDeque};
use tickbar_data::{
    store::Retention,
    tick::{Symbol, Tick},
};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct SymbolBars {
    open: Option<Bar>,
    last_sealed: Option<DateTime<Utc>>,
    sealed: VecDeque<Bar>,
}

impl SymbolBars {
    fn seal(&mut self, bar: Bar, retention: Retention) {
        debug!(
            symbol = %bar.symbol,
            interval_start = %bar.interval_start,
            open = %bar.open,
            high = %bar.high,
            low = %bar.low,
            close = %bar.close,
            volume = bar.volume,
            "sealed bar"
        );
        self.last_sealed = Some(bar.interval_start);
        retention.push(&mut self.sealed, bar);
    }
}

/// Per-symbol incremental tick to bar aggregator.
#[derive(Debug, Clone)]
pub struct TickAggregator {
    interval: BarInterval,
    retention: Retention,
    symbols: FnvHashMap<Symbol, SymbolBars>,
}

impl TickAggregator {
    pub fn new(retention: Retention) -> Self {
        Self::with_interval(BarInterval::ThirtySeconds, retention)
    }

    pub fn with_interval(interval: BarInterval, retention: Retention) -> Self {
        Self {
            interval,
            retention,
            symbols: FnvHashMap::default(),
        }
    }

    pub fn interval(&self) -> BarInterval {
        self.interval
    }

    /// Fold `tick` into its symbol's open bar.
    ///
    /// Returns the sealed bar when `tick` opens a later bucket. Ticks for a bucket earlier than
    /// the open one, or inside the already sealed range, are rejected.
    pub fn add_tick(&mut self, tick: &Tick) -> Result<Option<Bar>, TickRejection> {
        let bucket = self.interval.bucket_start(tick.timestamp);
        let retention = self.retention;
        let state = self.symbols.entry(tick.symbol.clone()).or_default();

        if let Some(sealed) = state.last_sealed.filter(|sealed| bucket <= *sealed) {
            return Err(TickRejection::AlreadySealed { bucket, sealed });
        }

        let open_bucket = state.open.as_ref().map(|bar| bar.interval_start);
        match open_bucket.map(|open| (open, bucket.cmp(&open))) {
            Some((_, Ordering::Equal)) => {
                if let Some(bar) = state.open.as_mut() {
                    bar.merge_tick(tick);
                }
                Ok(None)
            }
            Some((open, Ordering::Less)) => Err(TickRejection::BeforeOpenBucket { bucket, open }),
            Some((_, Ordering::Greater)) | None => {
                let completed = state.open.replace(Bar::from_tick(bucket, tick));
                if let Some(bar) = &completed {
                    state.seal(bar.clone(), retention);
                }
                Ok(completed)
            }
        }
    }

    /// Seal the open bar of `symbol` without waiting for a later tick, returning it.
    ///
    /// Ticks for the sealed bucket are rejected afterwards.
    pub fn seal_open(&mut self, symbol: &str) -> Option<Bar> {
        let retention = self.retention;
        let state = self.symbols.get_mut(symbol)?;
        let bar = state.open.take()?;
        state.seal(bar.clone(), retention);
        Some(bar)
    }

    /// Force-seal the open bar of `symbol` (if any) and return its sealed bars, oldest first.
    ///
    /// Calling this twice without new ticks returns the same sequence.
    pub fn get_bars(&mut self, symbol: &str) -> &[Bar] {
        self.seal_open(symbol);
        match self.symbols.get_mut(symbol) {
            Some(state) => state.sealed.make_contiguous(),
            None => &[],
        }
    }

    /// Sealed bars of `symbol` without sealing the open bar.
    pub fn sealed(&self, symbol: &str) -> impl DoubleEndedIterator<Item = &Bar> + '_ {
        self.symbols
            .get(symbol)
            .into_iter()
            .flat_map(|state| state.sealed.iter())
    }

    /// Sealed bars of `symbol` starting at or after `from`.
    pub fn sealed_since(&self, symbol: &str, from: DateTime<Utc>) -> Vec<Bar> {
        let mut bars = self
            .sealed(symbol)
            .rev()
            .take_while(|bar| bar.interval_start >= from)
            .cloned()
            .collect::<Vec<_>>();
        bars.reverse();
        bars
    }

    pub fn open_bar(&self, symbol: &str) -> Option<&Bar> {
        self.symbols.get(symbol).and_then(|state| state.open.as_ref())
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.keys()
    }
}

/// Aggregate a complete tick sequence in one pass.
///
/// Produces exactly the bars [`TickAggregator`] would seal for the same ticks followed by
/// [`TickAggregator::get_bars`], including the rejection of out of order buckets.
pub fn aggregate_ticks(interval: BarInterval, ticks: &[Tick]) -> FnvHashMap<Symbol, Vec<Bar>> {
    let mut by_symbol: FnvHashMap<Symbol, Vec<&Tick>> = FnvHashMap::default();
    for tick in ticks {
        by_symbol.entry(tick.symbol.clone()).or_default().push(tick);
    }

    by_symbol
        .into_iter()
        .map(|(symbol, ticks)| {
            let mut newest: Option<DateTime<Utc>> = None;
            let in_order = ticks.into_iter().filter(|tick| {
                let bucket = interval.bucket_start(tick.timestamp);
                if newest.is_some_and(|newest| bucket < newest) {
                    false
                } else {
                    newest = Some(bucket);
                    true
                }
            });

            let buckets = in_order.chunk_by(|tick| interval.bucket_start(tick.timestamp));
            let mut bars = Vec::new();
            for (start, mut group) in &buckets {
                if let Some(first) = group.next() {
                    let bar = group.fold(Bar::from_tick(start, first), |mut bar, tick| {
                        bar.merge_tick(tick);
                        bar
                    });
                    bars.push(bar);
                }
            }

            (symbol, bars)
        })
        .collect()
}
