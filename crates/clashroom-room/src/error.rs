//! Error types for the room layer.

use clashroom_protocol::{ErrorKind, ErrorReport, ParticipantId, RoomCode};
use clashroom_rules::RuleError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room is in a state that doesn't allow this operation.
    #[error("invalid room state: {0}")]
    InvalidState(String),

    /// A submitted option failed validation.
    #[error("invalid choice: {0}")]
    InvalidChoice(String),

    /// Rules for the current choices could not be produced.
    #[error(transparent)]
    RuleGeneration(#[from] RuleError),

    /// A second tick loop was requested while one was already running.
    #[error("room {0} tried to start a second tick loop")]
    ConcurrentStart(RoomCode),

    /// The room is full.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The participant is already in this room.
    #[error("participant {0} already in room {1}")]
    AlreadyInRoom(ParticipantId, RoomCode),

    /// The participant is not a member of this room.
    #[error("participant {0} not in room {1}")]
    NotInRoom(ParticipantId, RoomCode),

    /// The room's actor has stopped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// The room's actor didn't answer within the command timeout.
    #[error("room {0} did not respond in time")]
    Timeout(RoomCode),
}

impl RoomError {
    /// The category reported to clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::Unavailable(_) => ErrorKind::RoomNotFound,
            Self::InvalidState(_) | Self::AlreadyInRoom(..) => ErrorKind::InvalidRoomState,
            Self::InvalidChoice(_) => ErrorKind::InvalidChoiceFormat,
            Self::RuleGeneration(_) => ErrorKind::RuleGenerationFailure,
            Self::ConcurrentStart(_) | Self::Timeout(_) => ErrorKind::Internal,
            Self::RoomFull(_) => ErrorKind::RoomFull,
            Self::NotInRoom(..) => ErrorKind::NotInRoom,
        }
    }

    /// The error as sent to clients.
    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_reports_room_not_found() {
        let err = RoomError::Unavailable(RoomCode::new("abc123"));
        assert_eq!(err.kind(), ErrorKind::RoomNotFound);
    }

    #[test]
    fn test_timeout_reports_internal() {
        let err = RoomError::Timeout(RoomCode::new("abc123"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.report().message.contains("abc123"));
    }

    #[test]
    fn test_rule_error_converts_and_keeps_message() {
        let err: RoomError = RuleError::Unavailable.into();
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::RuleGenerationFailure);
        assert_eq!(report.message, "custom options are not enabled on this server");
    }
}
