use crate::signal::Signal;
use tokio::sync::mpsc;
use tracing::warn;

/// Hands emitted [`Signal`]s to order placement. Outcomes are not tracked or retried.
pub trait OrderDispatcher {
    fn dispatch(&mut self, signal: &Signal);
}

/// Forwards signals to an asynchronous order task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Signal>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// True once the order task has dropped its receiver. Later signals are dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl OrderDispatcher for ChannelDispatcher {
    fn dispatch(&mut self, signal: &Signal) {
        if self.tx.send(signal.clone()).is_err() {
            warn!(
                symbol = %signal.symbol,
                side = %signal.side,
                "order task has stopped, dropping signal"
            );
        }
    }
}

impl OrderDispatcher for Vec<Signal> {
    fn dispatch(&mut self, signal: &Signal) {
        self.push(signal.clone());
    }
}
