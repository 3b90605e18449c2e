//! Connection supervisor
//!
//! Owns the lifecycle of the single outbound WebSocket connection: connect,
//! receive, reply, detect failure, back off, reconnect, forever. The loop is
//! strictly sequential, so at most one live connection exists at any time.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{
    connect_async, tungstenite, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use super::protocol::{InboundMessage, OutboundResponse, ProtocolError};

/// Default delay between a failed or closed connection and the next attempt
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Errors that can occur in the supervisor loop
///
/// Every kind routes through the same log-and-retry policy today; they are
/// kept distinct so policies can diverge without restructuring the loop.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to connect: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("Transport error: {0}")]
    Transport(#[source] tungstenite::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] ProtocolError),
}

/// Connection state of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection; includes the backoff wait
    Disconnected,
    /// Connection attempt in flight
    Connecting,
    /// Handshake succeeded, receive loop running
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Configuration for the connection supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Remote WebSocket endpoint, e.g. `ws://localhost:8080/ws`
    pub endpoint: String,
    /// Fixed delay between attempts; constant, no exponential growth
    pub backoff: Duration,
}

impl SupervisorConfig {
    /// Create a configuration with the default backoff interval
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Override the backoff interval
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// How a connected session ended
enum SessionEnd {
    /// Shutdown signal received while the session was live
    Shutdown,
    /// Remote peer closed the connection or the stream ended
    RemoteClosed,
    /// Transport or send failure
    Failed(SupervisorError),
}

/// Supervises the single outbound relay connection
///
/// An owned object with an explicit start/stop contract: `run()` loops until
/// `shutdown()` is called, and all three waits (connecting, receiving,
/// backing off) are interruptible by the shutdown signal.
pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ConnectionSupervisor {
    /// Create a new supervisor; no connection is attempted until `run()`
    pub fn new(config: SupervisorConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state_tx,
            state_rx,
            shutdown_tx,
        }
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Get a shutdown signal receiver (for external components to listen for shutdown)
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Trigger supervisor shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    /// Run the supervisor loop
    ///
    /// Never returns under normal operation. Every failure category is
    /// logged and converted into a fixed-interval retry; no error escapes
    /// the loop. Returns cleanly once a shutdown signal is received.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!("Relay supervisor started for {}", self.config.endpoint);

        loop {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                result = connect_async(&self.config.endpoint) => Some(result),
                _ = shutdown_rx.recv() => None,
            };

            match connected {
                Some(Ok((ws_stream, _response))) => {
                    info!("Connected to {}", self.config.endpoint);
                    self.set_state(ConnectionState::Connected);

                    match drive_session(ws_stream, &mut shutdown_rx).await {
                        SessionEnd::Shutdown => {
                            info!("Shutdown signal received, closing connection");
                            break;
                        }
                        SessionEnd::RemoteClosed => {
                            info!("Connection closed by remote, reconnecting");
                        }
                        SessionEnd::Failed(e) => {
                            warn!("Session ended: {}", e);
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!("{}", SupervisorError::Connect(e));
                }
                None => {
                    info!("Shutdown signal received, stopping supervisor");
                    break;
                }
            }

            self.set_state(ConnectionState::Disconnected);
            debug!("Retrying in {:?}", self.config.backoff);

            tokio::select! {
                _ = tokio::time::sleep(self.config.backoff) => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received during backoff, stopping supervisor");
                    break;
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }
}

/// Drive one connected session until it ends
///
/// Replies to each inbound text message with the fixed response, in arrival
/// order, before reading the next frame. A malformed inbound payload is
/// skipped with a warning and the connection stays open.
async fn drive_session(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> SessionEnd {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match InboundMessage::from_json(&text) {
                            Ok(inbound) => {
                                debug!("Received message: {}", inbound.0);
                            }
                            Err(e) => {
                                warn!("Skipping malformed inbound payload: {}", e);
                                continue;
                            }
                        }

                        let reply = match OutboundResponse::fixed().to_json() {
                            Ok(json) => json,
                            Err(e) => return SessionEnd::Failed(SupervisorError::Decode(e)),
                        };
                        if let Err(e) = ws_sender.send(Message::Text(reply)).await {
                            return SessionEnd::Failed(SupervisorError::Transport(e));
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("Received binary message ({} bytes), ignoring", data.len());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                            return SessionEnd::Failed(SupervisorError::Transport(e));
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pong messages
                    }
                    Some(Ok(Message::Close(_))) => {
                        return SessionEnd::RemoteClosed;
                    }
                    Some(Ok(Message::Frame(_))) => {
                        // Raw frame, ignore
                    }
                    Some(Err(e)) => {
                        return SessionEnd::Failed(SupervisorError::Transport(e));
                    }
                    None => {
                        return SessionEnd::RemoteClosed;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
        }
    }
}
