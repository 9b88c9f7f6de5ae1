use crate::tick::{Symbol, Tick, TickSink};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many items a per-symbol sequence keeps before evicting the oldest.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
pub enum Retention {
    #[default]
    Unbounded,
    Last(usize),
}

impl Retention {
    /// Interpret a configured limit, where `0` means unbounded.
    pub fn from_limit(limit: usize) -> Self {
        match limit {
            0 => Self::Unbounded,
            limit => Self::Last(limit),
        }
    }

    /// Append `item` and evict from the front until the buffer satisfies the policy.
    pub fn push<T>(&self, buffer: &mut VecDeque<T>, item: T) {
        buffer.push_back(item);
        self.enforce(buffer);
    }

    pub fn enforce<T>(&self, buffer: &mut VecDeque<T>) {
        if let Self::Last(capacity) = *self {
            while buffer.len() > capacity.max(1) {
                buffer.pop_front();
            }
        }
    }
}

/// Historical trades replayed by the feed, kept apart from live aggregation.
#[derive(Debug, Clone, Default)]
pub struct HistoricalStore {
    retention: Retention,
    ticks: FnvHashMap<Symbol, VecDeque<Tick>>,
}

impl HistoricalStore {
    pub fn new(retention: Retention) -> Self {
        Self {
            retention,
            ticks: FnvHashMap::default(),
        }
    }

    /// Retained historical ticks for `symbol`, in arrival order.
    pub fn ticks(&self, symbol: &str) -> impl Iterator<Item = &Tick> + '_ {
        self.ticks.get(symbol).into_iter().flatten()
    }

    /// Total retained ticks across all symbols.
    pub fn len(&self) -> usize {
        self.ticks.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.ticks.keys()
    }
}

impl TickSink for HistoricalStore {
    fn accept(&mut self, tick: Tick) {
        let buffer = self.ticks.entry(tick.symbol.clone()).or_default();
        self.retention.push(buffer, tick);
    }
}
