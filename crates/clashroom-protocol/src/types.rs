//! Core protocol types for Clashroom's wire format.
//!
//! Every type here travels "on the wire": it is serialized to JSON, sent
//! over the transport, and deserialized on the other side. Inbound traffic
//! is a closed set of [`ClientEvent`]s; outbound traffic is a closed set of
//! [`ServerEvent`]s. Both are internally tagged by an `"event"` field, so a
//! browser client can switch on `msg.event` directly.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier for a connected participant.
///
/// Derived from the transport's connection id; a participant lives exactly
/// as long as its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// Short opaque code identifying a live room.
///
/// Codes are always stored lowercase, so `"AB12CD"` typed by a player finds
/// the room `"ab12cd"`. The normalization happens on every construction
/// path, including deserialization (`#[serde(from = "String")]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Creates a code, trimming whitespace and lowercasing it.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_lowercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
/// LOBBY → CHOOSING → READY → RUNNING → GAME_OVER
///   ↑        ↑  ↓      │ │                  │
///   │        └──┼──────┘ │                  │
///   └───────────┴────────┴──────────────────┘
/// ```
///
/// - **Lobby**: collecting participants.
/// - **Choosing**: every participant picks an option.
/// - **Ready**: all choices are in; the rule set is being resolved.
/// - **Running**: the simulation is ticking.
/// - **GameOver**: a single option type remains; the room is frozen
///   until it is reset or emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomState {
    Lobby,
    Choosing,
    Ready,
    Running,
    GameOver,
}

impl RoomState {
    /// Returns `true` if the room is accepting new participants.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// Returns `true` if participants may submit or correct choices.
    pub fn accepts_choices(&self) -> bool {
        matches!(self, Self::Choosing | Self::Ready)
    }

    /// Returns `true` if the simulation is ticking.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if moving from `self` to `target` is a legal edge of
    /// the lifecycle graph.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RoomState::*;
        matches!(
            (self, target),
            (Lobby, Choosing)
                | (Choosing, Ready)
                | (Choosing, Lobby)
                | (Ready, Running)
                | (Ready, Choosing)
                | (Ready, Lobby)
                | (Running, GameOver)
                | (GameOver, Lobby)
        )
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "LOBBY"),
            Self::Choosing => write!(f, "CHOOSING"),
            Self::Ready => write!(f, "READY"),
            Self::Running => write!(f, "RUNNING"),
            Self::GameOver => write!(f, "GAME_OVER"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// Everything a participant can ask the server to do.
///
/// This is a closed set: an event name that doesn't match a variant fails
/// to decode and is answered with a `malformed_event` error.
///
/// ```json
/// { "event": "choose", "room": "k3x9qa", "option": "Dragón", "custom": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Create a new room and join it.
    CreateRoom,

    /// Join an existing room that is still in the lobby.
    JoinRoom { room: RoomCode },

    /// Move the room from the lobby into choosing.
    Start { room: RoomCode },

    /// Submit (or correct) an option. `custom` marks a free-form option.
    Choose {
        room: RoomCode,
        option: String,
        #[serde(default)]
        custom: bool,
    },

    /// Withdraw the sender's choice.
    CancelSelection { room: RoomCode },

    /// Speed up every unit of the sender's option type.
    Boost { room: RoomCode },

    /// Leave the room.
    LeaveRoom { room: RoomCode },

    /// Return a finished room to the lobby for another game.
    ResetRoom { room: RoomCode },
}

impl ClientEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::Start { .. } => "start",
            Self::Choose { .. } => "choose",
            Self::CancelSelection { .. } => "cancel_selection",
            Self::Boost { .. } => "boost",
            Self::LeaveRoom { .. } => "leave_room",
            Self::ResetRoom { .. } => "reset_room",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Machine-readable error category carried in an `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RoomNotFound,
    InvalidRoomState,
    InvalidChoiceFormat,
    RuleGenerationFailure,
    NotInRoom,
    RoomFull,
    MalformedEvent,
    Internal,
}

/// An error as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The option type that won, with its display symbol and rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerView {
    pub option: String,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Payload of an `update` event.
///
/// Every field is optional: a broadcast after a transition carries
/// `code`/`state`/`participants` (and `winner` once decided), while a
/// unicast validation failure may carry nothing but `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<RoomCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RoomState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl RoomSummary {
    /// A summary of a room's current state.
    pub fn room(code: RoomCode, state: RoomState, participants: usize) -> Self {
        Self {
            code: Some(code),
            state: Some(state),
            participants: Some(participants),
            ..Self::default()
        }
    }

    /// A summary carrying only an error, for unicast rejections.
    pub fn rejection(error: ErrorReport) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_winner(mut self, winner: Option<WinnerView>) -> Self {
        self.winner = winner;
        self
    }

    pub fn with_error(mut self, error: ErrorReport) -> Self {
        self.error = Some(error);
        self
    }
}

/// One unit as drawn by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    #[serde(rename = "type")]
    pub kind: String,
    pub symbol: String,
    pub x: f64,
    pub y: f64,
}

/// Payload of a `game_frame` event: every unit after a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFrame {
    /// Tick number; 0 is the frame sent when the simulation starts.
    pub tick: u64,
    pub units: Vec<UnitView>,
}

/// Everything the server can push to a participant.
///
/// ```json
/// { "event": "update", "code": "k3x9qa", "state": "RUNNING", "participants": 2 }
/// { "event": "game_frame", "tick": 12, "units": [{ "type": "rock", "symbol": "🪨", "x": 10.0, "y": 4.0 }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Update(RoomSummary),
    GameFrame(GameFrame),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
