use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tickbar_data::tick::{Symbol, Tick};

/// Width of a bar bucket.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Deserialize, Serialize)]
pub enum BarInterval {
    #[display("30s")]
    ThirtySeconds,
    #[display("1m")]
    OneMinute,
}

impl BarInterval {
    pub fn width(self) -> TimeDelta {
        TimeDelta::milliseconds(self.width_ms())
    }

    fn width_ms(self) -> i64 {
        match self {
            Self::ThirtySeconds => 30_000,
            Self::OneMinute => 60_000,
        }
    }

    /// Floor `time` to the start of its bucket, aligned to the unix epoch.
    pub fn bucket_start(self, time: DateTime<Utc>) -> DateTime<Utc> {
        let millis = time.timestamp_millis();
        let offset = millis.rem_euclid(self.width_ms());
        time - TimeDelta::milliseconds(offset) - TimeDelta::nanoseconds(subsec_nanos_below_ms(time))
    }
}

fn subsec_nanos_below_ms(time: DateTime<Utc>) -> i64 {
    i64::from(time.timestamp_subsec_nanos() % 1_000_000)
}

/// OHLCV bar over one bucket for one symbol.
///
/// `low <= open, close <= high` holds for every bar built through [`Bar::from_tick`],
/// [`Bar::merge_tick`] and [`Bar::merge_bar`].
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Bar {
    pub interval_start: DateTime<Utc>,
    pub symbol: Symbol,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    pub fn from_tick(interval_start: DateTime<Utc>, tick: &Tick) -> Self {
        Self {
            interval_start,
            symbol: tick.symbol.clone(),
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.volume,
        }
    }

    /// Fold a later tick of the same bucket into this bar.
    pub fn merge_tick(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.volume = self.volume.saturating_add(tick.volume);
    }

    /// Fold a later sub-bar into this bar, keeping this bar's open.
    pub fn merge_bar(&mut self, later: &Bar) {
        self.high = self.high.max(later.high);
        self.low = self.low.min(later.low);
        self.close = later.close;
        self.volume = self.volume.saturating_add(later.volume);
    }
}
