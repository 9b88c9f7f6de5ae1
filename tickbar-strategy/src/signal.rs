use crate::moving_average::MovingAverageSample;
use chrono::{DateTime, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tickbar_data::tick::Symbol;
use tracing::info;

/// Order side of a crossover signal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[display("BUY")]
    Buy,
    #[display("SELL")]
    Sell,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Deserialize, Serialize)]
pub enum Position {
    #[display("LONG")]
    Long,
    #[display("SHORT")]
    Short,
    #[default]
    #[display("FLAT")]
    Flat,
}

/// Per-symbol detector state. `last_emitted` of `None` means no signal has been emitted yet.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
pub struct SignalState {
    pub last_emitted: Option<Side>,
    pub position: Position,
}

/// Crossover signal for one symbol.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub side: Side,
    pub timestamp: DateTime<Utc>,
    /// Close of the 1 minute bar that crossed, the reference price for orders.
    pub close: Decimal,
    pub short_mean: Decimal,
    pub long_mean: Decimal,
}

/// Decide whether `current` crosses over `previous`, given what was last emitted.
///
/// A bullish cross requires the short mean strictly below the long mean before and strictly
/// above after, and the reverse for a bearish cross. Equal means never cross. A side already
/// emitted last is suppressed until the opposite side fires.
pub fn crossover(
    state: &SignalState,
    previous: &MovingAverageSample,
    current: &MovingAverageSample,
) -> Option<Side> {
    let bullish =
        previous.short_mean < previous.long_mean && current.short_mean > current.long_mean;
    let bearish =
        previous.short_mean > previous.long_mean && current.short_mean < current.long_mean;

    match (bullish, bearish, state.last_emitted) {
        (true, _, last) if last != Some(Side::Buy) => Some(Side::Buy),
        (_, true, last) if last != Some(Side::Sell) => Some(Side::Sell),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
struct SymbolSignal {
    state: SignalState,
    previous: Option<MovingAverageSample>,
}

/// Per-symbol moving average crossover detector.
#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    symbols: FnvHashMap<Symbol, SymbolSignal>,
}

impl SignalDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `sample` against the previous sample of its symbol.
    pub fn on_sample(&mut self, sample: &MovingAverageSample) -> Option<Signal> {
        let entry = self.symbols.entry(sample.symbol.clone()).or_default();

        let side = entry
            .previous
            .as_ref()
            .and_then(|previous| crossover(&entry.state, previous, sample));
        entry.previous = Some(sample.clone());

        let side = side?;
        entry.state = SignalState {
            last_emitted: Some(side),
            position: match side {
                Side::Buy => Position::Long,
                Side::Sell => Position::Short,
            },
        };

        info!(
            symbol = %sample.symbol,
            %side,
            close = %sample.close,
            short_mean = %sample.short_mean,
            long_mean = %sample.long_mean,
            timestamp = %sample.timestamp,
            "crossover signal"
        );

        Some(Signal {
            symbol: sample.symbol.clone(),
            side,
            timestamp: sample.timestamp,
            close: sample.close,
            short_mean: sample.short_mean,
            long_mean: sample.long_mean,
        })
    }

    pub fn state(&self, symbol: &str) -> SignalState {
        self.symbols
            .get(symbol)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rust_decimal_macros::dec;

    fn sample(minute: i64, short_mean: Decimal, long_mean: Decimal) -> MovingAverageSample {
        MovingAverageSample {
            timestamp: DateTime::from_timestamp_millis(1_699_999_980_000).unwrap()
                + TimeDelta::minutes(minute),
            symbol: Symbol::new("NQ.Z24"),
            close: short_mean,
            short_mean,
            long_mean,
        }
    }

    #[test]
    fn test_crossover() {
        struct TestCase {
            state: SignalState,
            previous: (Decimal, Decimal),
            current: (Decimal, Decimal),
            expected: Option<Side>,
        }

        let flat = SignalState::default();
        let long = SignalState {
            last_emitted: Some(Side::Buy),
            position: Position::Long,
        };
        let short = SignalState {
            last_emitted: Some(Side::Sell),
            position: Position::Short,
        };

        let tests = vec![
            TestCase {
                // TC0: bullish cross from flat
                state: flat,
                previous: (dec!(99), dec!(100)),
                current: (dec!(101), dec!(100)),
                expected: Some(Side::Buy),
            },
            TestCase {
                // TC1: bearish cross from flat
                state: flat,
                previous: (dec!(101), dec!(100)),
                current: (dec!(99), dec!(100)),
                expected: Some(Side::Sell),
            },
            TestCase {
                // TC2: bullish cross suppressed after a buy
                state: long,
                previous: (dec!(99), dec!(100)),
                current: (dec!(101), dec!(100)),
                expected: None,
            },
            TestCase {
                // TC3: bearish cross after a buy
                state: long,
                previous: (dec!(101), dec!(100)),
                current: (dec!(99), dec!(100)),
                expected: Some(Side::Sell),
            },
            TestCase {
                // TC4: bullish cross after a sell
                state: short,
                previous: (dec!(99), dec!(100)),
                current: (dec!(101), dec!(100)),
                expected: Some(Side::Buy),
            },
            TestCase {
                // TC5: touching from below is not a cross
                state: flat,
                previous: (dec!(99), dec!(100)),
                current: (dec!(100), dec!(100)),
                expected: None,
            },
            TestCase {
                // TC6: leaving a tie is not a cross
                state: flat,
                previous: (dec!(100), dec!(100)),
                current: (dec!(101), dec!(100)),
                expected: None,
            },
            TestCase {
                // TC7: staying above is not a cross
                state: flat,
                previous: (dec!(101), dec!(100)),
                current: (dec!(102), dec!(100)),
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let previous = sample(0, test.previous.0, test.previous.1);
            let current = sample(1, test.current.0, test.current.1);
            let actual = crossover(&test.state, &previous, &current);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_repeated_bullish_crosses_emit_one_buy() {
        let mut detector = SignalDetector::new();

        let samples = [
            sample(0, dec!(99), dec!(100)),
            sample(1, dec!(101), dec!(100)),
            sample(2, dec!(100), dec!(100)),
            sample(3, dec!(99), dec!(100)),
            sample(4, dec!(102), dec!(100)),
        ];

        let signals = samples
            .iter()
            .filter_map(|sample| detector.on_sample(sample))
            .collect::<Vec<_>>();

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Buy);
        assert_eq!(signals[0].timestamp, samples[1].timestamp);
        assert_eq!(signals[0].close, dec!(101));
        assert_eq!(
            detector.state("NQ.Z24"),
            SignalState {
                last_emitted: Some(Side::Buy),
                position: Position::Long,
            }
        );
    }

    #[test]
    fn test_first_sample_never_signals() {
        let mut detector = SignalDetector::new();

        assert_eq!(detector.on_sample(&sample(0, dec!(101), dec!(100))), None);
        assert_eq!(detector.state("NQ.Z24"), SignalState::default());
        assert_eq!(detector.state("ES.Z24").position, Position::Flat);
    }

    #[test]
    fn test_side_serialises_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), r#""BUY""#);
        assert_eq!(Side::Sell.to_string(), "SELL");
    }
}
