//! Wire protocol for Clashroom.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`RoomSummary`],
//!   [`GameFrame`], ...): the events that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those events are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol layer knows nothing about connections or rooms; it only
//! knows how to name and serialize events.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Gateway → Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientEvent, ErrorKind, ErrorReport, GameFrame, ParticipantId, RoomCode,
    RoomState, RoomSummary, ServerEvent, UnitView, WinnerView,
};
