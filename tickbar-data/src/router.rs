use crate::{
    protocol::{FeedMessage, TradeEntry, TradeRecord},
    tick::{Tick, TickSink, TickSource},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Why a trade record was dropped at the routing boundary.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum RejectReason {
    #[error("trade record has no symbol")]
    MissingSymbol,

    #[error("trade record has no timestamp")]
    MissingTimestamp,

    #[error("trade record has no price")]
    MissingPrice,

    #[error("trade record is malformed: {0}")]
    Malformed(String),
}

/// Running counters of routed records.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
pub struct RouterStats {
    pub live: u64,
    pub historical: u64,
    pub rejected: u64,
    pub ignored_messages: u64,
}

/// Splits decoded feed messages into historical and live [`Tick`]s.
#[derive(Debug, Clone, Default)]
pub struct TickRouter {
    stats: RouterStats,
}

impl TickRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Forward every valid trade in `message` to `historical` or `live`, dropping
    /// malformed records with a diagnostic.
    pub fn route<Historical, Live>(
        &mut self,
        message: FeedMessage,
        historical: &mut Historical,
        live: &mut Live,
    ) where
        Historical: TickSink + ?Sized,
        Live: TickSink + ?Sized,
    {
        let entries = match message {
            FeedMessage::Ignore => {
                self.stats.ignored_messages += 1;
                return;
            }
            FeedMessage::Trades(entries) => entries,
        };

        for entry in entries {
            match validate(entry) {
                Ok((TickSource::Historical, tick)) => {
                    self.stats.historical += 1;
                    historical.accept(tick);
                }
                Ok((TickSource::Live, tick)) => {
                    self.stats.live += 1;
                    live.accept(tick);
                }
                Err(reason) => {
                    self.stats.rejected += 1;
                    warn!(%reason, rejected = self.stats.rejected, "dropping trade record");
                }
            }
        }
    }
}

/// Validate a [`TradeEntry`] into a [`Tick`] and its [`TickSource`].
///
/// A missing volume is read as zero.
pub fn validate(entry: TradeEntry) -> Result<(TickSource, Tick), RejectReason> {
    let TradeRecord {
        timestamp,
        symbol,
        price,
        volume,
        is_historical,
    } = match entry {
        TradeEntry::Record(record) => record,
        TradeEntry::Malformed(error) => return Err(RejectReason::Malformed(error)),
    };

    let symbol = symbol
        .filter(|symbol| !symbol.is_empty())
        .ok_or(RejectReason::MissingSymbol)?;
    let timestamp = timestamp.ok_or(RejectReason::MissingTimestamp)?;
    let price = price.ok_or(RejectReason::MissingPrice)?;

    let source = if is_historical {
        TickSource::Historical
    } else {
        TickSource::Live
    };

    Ok((
        source,
        Tick::new(timestamp, symbol, price, volume.unwrap_or_default()),
    ))
}
