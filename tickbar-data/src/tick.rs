use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Instrument identifier as it appears on the feed, eg/ "NQ.Z24".
pub type Symbol = SmolStr;

/// Normalised trade event.
///
/// `timestamp` is the exchange event time, never the local receipt time.
#[derive(Clone, Eq, PartialEq, Debug, Constructor, Deserialize, Serialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub price: Decimal,
    pub volume: u64,
}

/// Whether a trade record was replayed history or a live print.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Deserialize, Serialize)]
pub enum TickSource {
    #[display("historical")]
    Historical,
    #[display("live")]
    Live,
}

/// Consumer of routed [`Tick`]s.
pub trait TickSink {
    fn accept(&mut self, tick: Tick);
}

impl TickSink for Vec<Tick> {
    fn accept(&mut self, tick: Tick) {
        self.push(tick);
    }
}
