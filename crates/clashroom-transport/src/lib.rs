//! Transport abstraction layer for Clashroom.
//!
//! The server only ever sees the [`Transport`] and [`Connection`] traits:
//! a stream of accepted connections, each carrying whole messages as bytes.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_HANDSHAKE_TIMEOUT, PendingWebSocket, WebSocketConnection, WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
///
/// `accept` only takes the raw socket off the listener. The protocol
/// handshake happens in [`PendingConnection::establish`], which callers run
/// on their own task so a silent peer can't hold up the listener.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Pending: PendingConnection<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming socket.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Stops accepting connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// An accepted socket whose handshake hasn't run yet.
pub trait PendingConnection: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake. Fails if the peer doesn't finish it in time.
    async fn establish(self) -> Result<Self::Connection, Self::Error>;

    fn id(&self) -> ConnectionId;
}

/// A single connection that carries whole messages.
///
/// `send` and `recv` may be called concurrently from different tasks; a
/// pending `recv` never holds up a `send`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one message to the peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
