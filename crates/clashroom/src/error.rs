//! Unified error type for the Clashroom server.

use clashroom_protocol::ProtocolError;
use clashroom_room::RoomError;
use clashroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClashroomError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, wrong state, bad choice).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An environment variable holds a value that can't be used.
    #[error("configuration error: {0}")]
    Config(String),
}
