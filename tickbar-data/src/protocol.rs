//! Wire format of the trade feed.
//!
//! ### Outbound subscription
//! ```json
//! {"action": "subscribe", "type": "trades", "symbol": "NQ.Z24", "flags": ["live", "historical"]}
//! ```
//!
//! ### Inbound trades
//! ```json
//! {
//!     "trades": [
//!         {"timestamp": 1700000000000, "symbol": "NQ.Z24", "price": 15800.5, "volume": 10, "is_historical": false}
//!     ]
//! }
//! ```
//! Any other JSON document is a non-trade message.

use crate::tick::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;

/// Stream flags requested with every subscription.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFlag {
    Live,
    Historical,
}

/// Outbound request subscribing to live and historical trades for one symbol.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct Subscribe {
    pub action: String,
    #[serde(rename = "type")]
    pub channel: String,
    pub symbol: Symbol,
    pub flags: Vec<FeedFlag>,
}

impl Subscribe {
    pub fn trades(symbol: Symbol) -> Self {
        Self {
            action: "subscribe".to_string(),
            channel: "trades".to_string(),
            symbol,
            flags: vec![FeedFlag::Live, FeedFlag::Historical],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decoded inbound feed message.
#[derive(Clone, PartialEq, Debug)]
pub enum FeedMessage {
    /// Any message that does not carry a `trades` array.
    Ignore,
    Trades(Vec<TradeEntry>),
}

impl FeedMessage {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl<'de> Deserialize<'de> for FeedMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        match value.get("trades") {
            Some(Value::Array(records)) => Ok(FeedMessage::Trades(
                records.iter().cloned().map(TradeEntry::from_value).collect(),
            )),
            Some(other) => Err(D::Error::custom(format!(
                "expected trades array, found: {other}"
            ))),
            None => Ok(FeedMessage::Ignore),
        }
    }
}

/// One element of a `trades` array.
///
/// Records decode individually so a single malformed record never discards its batch.
#[derive(Clone, PartialEq, Debug)]
pub enum TradeEntry {
    Record(TradeRecord),
    Malformed(String),
}

impl TradeEntry {
    fn from_value(value: Value) -> Self {
        match serde_json::from_value::<TradeRecord>(value) {
            Ok(record) => Self::Record(record),
            Err(error) => Self::Malformed(error.to_string()),
        }
    }
}

/// Raw trade record prior to validation by the
/// [`TickRouter`](crate::router::TickRouter).
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct TradeRecord {
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub symbol: Option<Symbol>,

    #[serde(default)]
    pub price: Option<Decimal>,

    #[serde(default)]
    pub volume: Option<u64>,

    #[serde(default)]
    pub is_historical: bool,
}

/// Deserialize an optional event time given as epoch milliseconds (number or digit string)
/// or as an RFC 3339 string.
pub fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid epoch millis: {number}"))),
        Some(Value::String(raw)) => raw
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .or_else(|| {
                DateTime::parse_from_rfc3339(&raw)
                    .ok()
                    .map(|time| time.with_timezone(&Utc))
            })
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
        Some(other) => Err(D::Error::custom(format!("invalid timestamp: {other}"))),
    }
}
