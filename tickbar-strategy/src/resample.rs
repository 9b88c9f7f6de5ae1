//! Tier-2 aggregation: regroups sealed 30 second bars into 1 minute bars.

use crate::bar::{Bar, BarInterval};
use fnv::FnvHashMap;
use itertools::Itertools;
use std::collections::VecDeque;
use tickbar_data::{store::Retention, tick::Symbol};

/// Running per-symbol series of 1 minute bars, de-duplicated on bucket start.
#[derive(Debug, Clone)]
pub struct BarResampler {
    interval: BarInterval,
    retention: Retention,
    series: FnvHashMap<Symbol, VecDeque<Bar>>,
}

impl BarResampler {
    pub fn new(retention: Retention) -> Self {
        Self {
            interval: BarInterval::OneMinute,
            retention,
            series: FnvHashMap::default(),
        }
    }

    /// Regroup `bars` by minute bucket and merge the results into the running series.
    ///
    /// A recomputed bucket replaces the stored bar for that bucket. Returns how many buckets
    /// were written.
    pub fn resample(&mut self, bars: &[Bar]) -> usize {
        let mut written = 0;

        for bar in resample_bars(self.interval, bars) {
            let series = self.series.entry(bar.symbol.clone()).or_default();
            upsert(series, bar);
            self.retention.enforce(series);
            written += 1;
        }

        written
    }

    /// Full 1 minute series of `symbol`, including the newest (still extendable) bucket.
    pub fn series(&self, symbol: &str) -> impl DoubleEndedIterator<Item = &Bar> + '_ {
        self.series.get(symbol).into_iter().flatten()
    }

    /// Buckets of `symbol` strictly older than its newest bucket. These can no longer change.
    pub fn sealed(&self, symbol: &str) -> impl Iterator<Item = &Bar> + '_ {
        let sealed = self
            .series
            .get(symbol)
            .map_or(0, |series| series.len().saturating_sub(1));
        self.series(symbol).take(sealed)
    }

    pub fn newest(&self, symbol: &str) -> Option<&Bar> {
        self.series(symbol).next_back()
    }
}

/// Group `bars` per symbol & bucket: open of the earliest, extrema, close of the latest and the
/// summed volume. Empty groups produce nothing.
pub fn resample_bars(interval: BarInterval, bars: &[Bar]) -> Vec<Bar> {
    let ordered = bars.iter().sorted_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then(a.interval_start.cmp(&b.interval_start))
    });

    let groups =
        ordered.chunk_by(|bar| (bar.symbol.clone(), interval.bucket_start(bar.interval_start)));

    let mut resampled = Vec::new();
    for ((symbol, start), mut group) in &groups {
        if let Some(first) = group.next() {
            let seed = Bar {
                interval_start: start,
                symbol,
                ..first.clone()
            };
            resampled.push(group.fold(seed, |mut minute, bar| {
                minute.merge_bar(bar);
                minute
            }));
        }
    }

    resampled
}

fn upsert(series: &mut VecDeque<Bar>, bar: Bar) {
    match series
        .iter()
        .rposition(|existing| existing.interval_start <= bar.interval_start)
    {
        Some(index) if series[index].interval_start == bar.interval_start => series[index] = bar,
        Some(index) => series.insert(index + 1, bar),
        None => series.push_front(bar),
    }
}
