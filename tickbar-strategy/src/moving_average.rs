use crate::{bar::Bar, error::StrategyError};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tickbar_data::{store::Retention, tick::Symbol};
use tracing::warn;

/// Default short moving average window, in 1 minute bars.
pub const DEFAULT_SHORT_WINDOW: usize = 200;

/// Default long moving average window, in 1 minute bars.
pub const DEFAULT_LONG_WINDOW: usize = 1000;

/// Short & long means of one symbol at one 1 minute bar.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct MovingAverageSample {
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    /// Close of the sampled bar.
    pub close: Decimal,
    pub short_mean: Decimal,
    pub long_mean: Decimal,
}

/// Arithmetic mean over the most recent `window` values, averaging whatever is available until
/// the window fills.
#[derive(Debug, Clone)]
pub struct RollingMean {
    window: usize,
    values: VecDeque<Decimal>,
    sum: Decimal,
}

impl RollingMean {
    /// A zero `window` is treated as one.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: Decimal::ZERO,
        }
    }

    /// Add `value`, evicting the oldest once the window is full, and return the new mean.
    ///
    /// Returns `None` and leaves the window untouched if the window sum would overflow.
    pub fn push(&mut self, value: Decimal) -> Option<Decimal> {
        let sum = self.sum_after(value)?;
        Some(self.commit(value, sum))
    }

    /// Window sum after pushing `value`, or `None` on overflow.
    fn sum_after(&self, value: Decimal) -> Option<Decimal> {
        let sum = match self.values.front() {
            Some(oldest) if self.is_full() => self.sum.checked_sub(*oldest)?,
            _ => self.sum,
        };
        sum.checked_add(value)
    }

    fn commit(&mut self, value: Decimal, sum: Decimal) -> Decimal {
        if self.is_full() {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.sum = sum;

        mean(self.sum, self.values.len())
    }

    pub fn mean(&self) -> Option<Decimal> {
        (!self.values.is_empty()).then(|| mean(self.sum, self.values.len()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() >= self.window
    }
}

/// Recompute the rolling mean of every prefix of `values` from scratch.
///
/// A prefix whose window sum overflows yields `None`.
pub fn rolling_mean(values: &[Decimal], window: usize) -> Vec<Option<Decimal>> {
    let window = window.max(1);
    (0..values.len())
        .map(|end| {
            let start = (end + 1).saturating_sub(window);
            let slice = &values[start..=end];
            slice
                .iter()
                .try_fold(Decimal::ZERO, |sum, value| sum.checked_add(*value))
                .map(|sum| mean(sum, slice.len()))
        })
        .collect()
}

fn mean(sum: Decimal, count: usize) -> Decimal {
    sum.normalize() / Decimal::from(count)
}

#[derive(Debug, Clone)]
struct SymbolAverages {
    short: RollingMean,
    long: RollingMean,
    last_timestamp: Option<DateTime<Utc>>,
    samples: VecDeque<MovingAverageSample>,
}

/// Per-symbol short & long moving averages over sealed 1 minute closes.
#[derive(Debug, Clone)]
pub struct MovingAverageEngine {
    short_window: usize,
    long_window: usize,
    retention: Retention,
    symbols: FnvHashMap<Symbol, SymbolAverages>,
}

impl MovingAverageEngine {
    pub fn new(
        short_window: usize,
        long_window: usize,
        retention: Retention,
    ) -> Result<Self, StrategyError> {
        if short_window == 0 || long_window == 0 {
            return Err(StrategyError::ZeroWindow {
                short: short_window,
                long: long_window,
            });
        }
        if short_window >= long_window {
            return Err(StrategyError::WindowOrder {
                short: short_window,
                long: long_window,
            });
        }

        Ok(Self {
            short_window,
            long_window,
            retention,
            symbols: FnvHashMap::default(),
        })
    }

    pub fn windows(&self) -> (usize, usize) {
        (self.short_window, self.long_window)
    }

    /// Extend the averages with every bar newer than the last sampled one.
    ///
    /// Bars at or before the last sampled timestamp of their symbol are skipped, so feeding
    /// the same series twice yields no new samples. A bar whose close would overflow either
    /// window sum is skipped with a warning. Returns the new samples in order.
    pub fn update<'a, I>(&mut self, bars: I) -> Vec<MovingAverageSample>
    where
        I: IntoIterator<Item = &'a Bar>,
    {
        let mut samples = Vec::new();

        for bar in bars {
            let state = self
                .symbols
                .entry(bar.symbol.clone())
                .or_insert_with(|| SymbolAverages {
                    short: RollingMean::new(self.short_window),
                    long: RollingMean::new(self.long_window),
                    last_timestamp: None,
                    samples: VecDeque::new(),
                });

            if state
                .last_timestamp
                .is_some_and(|last| bar.interval_start <= last)
            {
                continue;
            }

            state.last_timestamp = Some(bar.interval_start);

            let (Some(short_sum), Some(long_sum)) = (
                state.short.sum_after(bar.close),
                state.long.sum_after(bar.close),
            ) else {
                warn!(
                    symbol = %bar.symbol,
                    interval_start = %bar.interval_start,
                    close = %bar.close,
                    "moving average window sum overflowed, skipping bar"
                );
                continue;
            };

            let sample = MovingAverageSample {
                timestamp: bar.interval_start,
                symbol: bar.symbol.clone(),
                close: bar.close,
                short_mean: state.short.commit(bar.close, short_sum),
                long_mean: state.long.commit(bar.close, long_sum),
            };

            self.retention.push(&mut state.samples, sample.clone());
            samples.push(sample);
        }

        samples
    }

    /// Retained samples of `symbol`, oldest first.
    pub fn samples(
        &self,
        symbol: &str,
    ) -> impl DoubleEndedIterator<Item = &MovingAverageSample> + '_ {
        self.symbols
            .get(symbol)
            .into_iter()
            .flat_map(|state| state.samples.iter())
    }

    pub fn latest(&self, symbol: &str) -> Option<&MovingAverageSample> {
        self.samples(symbol).next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rust_decimal_macros::dec;

    fn minute_bar(minute: i64, close: Decimal) -> Bar {
        Bar {
            interval_start: DateTime::from_timestamp_millis(1_699_999_980_000).unwrap()
                + TimeDelta::minutes(minute),
            symbol: Symbol::new("NQ.Z24"),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1,
        }
    }

    #[test]
    fn test_rolling_mean() {
        struct TestCase {
            window: usize,
            input: Vec<Decimal>,
            expected: Vec<Decimal>,
        }

        let tests = vec![
            TestCase {
                // TC0: empty series yields nothing
                window: 3,
                input: vec![],
                expected: vec![],
            },
            TestCase {
                // TC1: expanding until the window fills, then rolling
                window: 3,
                input: vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)],
                expected: vec![dec!(1), dec!(1.5), dec!(2), dec!(3), dec!(4)],
            },
            TestCase {
                // TC2: window of one is the series itself
                window: 1,
                input: vec![dec!(15800.25), dec!(15801.75)],
                expected: vec![dec!(15800.25), dec!(15801.75)],
            },
            TestCase {
                // TC3: window larger than the series
                window: 1000,
                input: vec![dec!(10), dec!(20)],
                expected: vec![dec!(10), dec!(15)],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let expected = test.expected.into_iter().map(Some).collect::<Vec<_>>();

            let actual = rolling_mean(&test.input, test.window);
            assert_eq!(actual, expected, "TC{} failed", index);

            let mut incremental = RollingMean::new(test.window);
            let pushed = test
                .input
                .iter()
                .map(|value| incremental.push(*value))
                .collect::<Vec<_>>();
            assert_eq!(pushed, expected, "TC{} incremental failed", index);
        }
    }

    #[test]
    fn test_incremental_equals_full_recomputation() {
        // Deterministic irregular closes around 15800 with quarter point ticks
        let closes = (0..1500_i64)
            .map(|index| dec!(15800) + Decimal::new((index * 37) % 101 - 50, 0) * dec!(0.25))
            .collect::<Vec<_>>();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(minute, close)| minute_bar(minute as i64, *close))
            .collect::<Vec<_>>();

        let mut engine = MovingAverageEngine::new(
            DEFAULT_SHORT_WINDOW,
            DEFAULT_LONG_WINDOW,
            Retention::Unbounded,
        )
        .unwrap();

        // Feed in uneven batches, re-sending already sampled bars each time
        let mut incremental = Vec::new();
        for end in [1, 2, 150, 199, 200, 201, 999, 1000, 1001, 1500] {
            incremental.extend(engine.update(&bars[..end]));
        }

        let short = rolling_mean(&closes, DEFAULT_SHORT_WINDOW);
        let long = rolling_mean(&closes, DEFAULT_LONG_WINDOW);

        assert_eq!(incremental.len(), closes.len());
        for (index, sample) in incremental.iter().enumerate() {
            assert_eq!(Some(sample.short_mean), short[index], "short mean differs at {index}");
            assert_eq!(Some(sample.long_mean), long[index], "long mean differs at {index}");
            assert_eq!(sample.close, closes[index]);
            assert_eq!(sample.timestamp, bars[index].interval_start);
        }
        assert_eq!(engine.samples("NQ.Z24").count(), 1500);
        assert_eq!(engine.latest("NQ.Z24"), incremental.last());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut engine = MovingAverageEngine::new(2, 3, Retention::Unbounded).unwrap();
        let bars = vec![minute_bar(0, dec!(10)), minute_bar(1, dec!(20))];

        assert_eq!(engine.update(&bars).len(), 2);
        assert!(engine.update(&bars).is_empty());
        assert!(engine.update(std::iter::empty()).is_empty());
        assert!(engine.samples("ES.Z24").next().is_none());
    }

    #[test]
    fn test_overflowing_window_sum_is_skipped() {
        let mut mean = RollingMean::new(3);
        assert_eq!(mean.push(Decimal::MAX), Some(Decimal::MAX));
        assert_eq!(mean.push(Decimal::MAX), None);
        assert_eq!(mean.len(), 1);
        assert_eq!(mean.mean(), Some(Decimal::MAX));

        assert_eq!(
            rolling_mean(&[Decimal::MAX, Decimal::MAX], 3),
            vec![Some(Decimal::MAX), None]
        );

        let mut engine = MovingAverageEngine::new(2, 3, Retention::Unbounded).unwrap();
        let bars = vec![
            minute_bar(0, Decimal::MAX),
            minute_bar(1, Decimal::MAX),
            minute_bar(2, dec!(-1)),
        ];

        let samples = engine.update(&bars);
        let timestamps = samples.iter().map(|sample| sample.timestamp).collect::<Vec<_>>();
        assert_eq!(timestamps, vec![bars[0].interval_start, bars[2].interval_start]);

        // the skipped bar is not retried
        assert!(engine.update(&bars).is_empty());
    }

    #[test]
    fn test_new_validates_windows() {
        struct TestCase {
            short: usize,
            long: usize,
            expected: Result<(usize, usize), StrategyError>,
        }

        let tests = vec![
            TestCase {
                // TC0: default windows
                short: DEFAULT_SHORT_WINDOW,
                long: DEFAULT_LONG_WINDOW,
                expected: Ok((200, 1000)),
            },
            TestCase {
                // TC1: zero window
                short: 0,
                long: 10,
                expected: Err(StrategyError::ZeroWindow { short: 0, long: 10 }),
            },
            TestCase {
                // TC2: short not below long
                short: 10,
                long: 10,
                expected: Err(StrategyError::WindowOrder { short: 10, long: 10 }),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = MovingAverageEngine::new(test.short, test.long, Retention::Unbounded)
                .map(|engine| engine.windows());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
