use crate::{
    error::{FeedError, TransportError},
    protocol::{FeedMessage, Subscribe},
    session::{FeedEndpoint, StreamIdProvider, TokenProvider},
    tick::Symbol,
    transport::{Connector, Transport},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Default number of consecutive failed reconnects tolerated before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default pause before each reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Feed connection configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedConfig {
    /// Feed symbols subscribed on every (re)connect.
    pub symbols: Vec<Symbol>,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl FeedConfig {
    pub fn new<I>(symbols: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Symbol>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

/// Connection status updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts ran out.
    Exhausted,
    /// A session collaborator failed.
    Failed,
    Closed,
}

/// Cloneable handle that stops a running [`FeedConnection`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Request shutdown. The feed tears down its transport and `run` returns `Ok(())`.
    pub fn close(&self) {
        self.0.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.0.borrow()
    }
}

enum SessionEnd {
    Shutdown,
    Failed(TransportError),
}

/// Resilient feed session: connect, subscribe, receive, reconnect.
///
/// Owns only transport and session state (the current retry counter). Every inbound message is
/// handed to the `on_message` callback supplied to [`FeedConnection::run`].
pub struct FeedConnection<C, T, S> {
    config: FeedConfig,
    endpoint: FeedEndpoint,
    connector: C,
    tokens: T,
    stream_ids: S,
    attempts: u32,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl<C, T, S> FeedConnection<C, T, S>
where
    C: Connector,
    T: TokenProvider,
    S: StreamIdProvider,
{
    pub fn new(
        config: FeedConfig,
        endpoint: FeedEndpoint,
        connector: C,
        tokens: T,
        stream_ids: S,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);

        Self {
            config,
            endpoint,
            connector,
            tokens,
            stream_ids,
            attempts: 0,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            status_tx,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Run the feed until shutdown is requested (`Ok`) or a terminal [`FeedError`] occurs.
    ///
    /// Transport failures trigger a reconnect after `reconnect_delay`, refreshing the stream id
    /// first. The failure counter resets on every successful connection, and the feed gives up
    /// once it exceeds `max_reconnect_attempts`.
    pub async fn run<F>(&mut self, mut on_message: F) -> Result<(), FeedError>
    where
        F: FnMut(FeedMessage) + Send,
    {
        loop {
            if self.is_shutdown() {
                self.closed();
                return Ok(());
            }

            let mut shutdown = self.shutdown_rx.clone();
            let opened = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => None,
                opened = self.open() => Some(opened),
            };
            let Some(opened) = opened else {
                self.closed();
                return Ok(());
            };

            let failure = match opened {
                Ok(mut transport) => {
                    self.attempts = 0;
                    self.status_tx.send_replace(ConnectionStatus::Connected);

                    let end = self.drive(&mut transport, &mut on_message).await;

                    if let Err(error) = transport.close().await {
                        debug!(%error, "feed transport reported an error while closing");
                    }

                    match end {
                        SessionEnd::Shutdown => {
                            self.closed();
                            return Ok(());
                        }
                        SessionEnd::Failed(error) => error,
                    }
                }
                Err(FeedError::Transport(error)) => error,
                Err(terminal) => {
                    error!(error = %terminal, "feed session failed");
                    self.status_tx.send_replace(ConnectionStatus::Failed);
                    return Err(terminal);
                }
            };

            self.attempts += 1;
            if self.attempts > self.config.max_reconnect_attempts {
                let attempts = self.attempts - 1;
                error!(attempts, error = %failure, "feed reconnect attempts exhausted");
                self.status_tx.send_replace(ConnectionStatus::Exhausted);
                return Err(FeedError::ReconnectExhausted {
                    attempts,
                    last_error: failure,
                });
            }

            warn!(
                attempt = self.attempts,
                max_attempts = self.config.max_reconnect_attempts,
                delay = ?self.config.reconnect_delay,
                error = %failure,
                "feed connection lost, reconnecting"
            );
            self.status_tx.send_replace(ConnectionStatus::Reconnecting {
                attempt: self.attempts,
            });

            if !self.wait_before_retry().await {
                self.closed();
                return Ok(());
            }
        }
    }

    /// Obtain a (fresh after a failure) stream id and open the transport.
    async fn open(&self) -> Result<C::Transport, FeedError> {
        let stream_id = if self.attempts == 0 {
            self.stream_ids.stream_id().await?
        } else {
            self.stream_ids.refresh_stream_id().await?
        };
        let token = self.tokens.token().await?;
        let url = self.endpoint.stream_url(&stream_id, &token)?;

        self.status_tx.send_replace(ConnectionStatus::Connecting);
        let transport = self.connector.connect(&url).await?;

        info!(
            %stream_id,
            host = url.host_str(),
            symbols = ?self.config.symbols,
            "feed connected"
        );

        Ok(transport)
    }

    async fn drive<F>(&mut self, transport: &mut C::Transport, on_message: &mut F) -> SessionEnd
    where
        F: FnMut(FeedMessage) + Send,
    {
        for symbol in &self.config.symbols {
            let request = match Subscribe::trades(symbol.clone()).to_json() {
                Ok(request) => request,
                Err(error) => return SessionEnd::Failed(TransportError::Encode(error.to_string())),
            };

            if let Err(error) = transport.send(request).await {
                return SessionEnd::Failed(error);
            }

            info!(%symbol, "subscribed to live and historical trades");
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown_rx) => return SessionEnd::Shutdown,
                next = transport.recv() => next,
            };

            match next {
                Some(Ok(text)) => match FeedMessage::decode(&text) {
                    Ok(message) => on_message(message),
                    Err(error) => warn!(%error, payload = %text, "failed to decode feed message"),
                },
                Some(Err(error)) => return SessionEnd::Failed(error),
                None => {
                    return SessionEnd::Failed(TransportError::ClosedByPeer(
                        "stream ended".to_string(),
                    ));
                }
            }
        }
    }

    /// Sleep for the reconnect delay. Returns false if shutdown was requested meanwhile.
    async fn wait_before_retry(&mut self) -> bool {
        let delay = self.config.reconnect_delay;

        let cancelled = tokio::select! {
            biased;
            _ = shutdown_requested(&mut self.shutdown_rx) => true,
            _ = tokio::time::sleep(delay) => false,
        };

        !cancelled && !self.is_shutdown()
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    fn closed(&self) {
        info!("feed connection closed");
        self.status_tx.send_replace(ConnectionStatus::Closed);
    }
}

/// Resolves once shutdown has been requested or every [`ShutdownHandle`] sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}
