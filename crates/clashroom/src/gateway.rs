//! Session gateway: turns participant events into registry operations.
//!
//! The gateway never touches a socket. Replies and broadcasts go out through
//! each participant's [`ParticipantSender`], which the connection handler
//! drains onto the wire.

use clashroom_protocol::{
    ClientEvent, ErrorKind, ErrorReport, ParticipantId, RoomSummary, ServerEvent,
};
use clashroom_room::{Choice, ParticipantSender, RoomAction, RoomError, RoomRegistry};
use clashroom_rules::RuleProvider;

/// Routes decoded events from participants to their rooms.
pub struct SessionGateway<P: RuleProvider> {
    registry: RoomRegistry<P>,
}

impl<P: RuleProvider> SessionGateway<P> {
    pub fn new(registry: RoomRegistry<P>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RoomRegistry<P> {
        &self.registry
    }

    /// Handles one event. A rejected event is answered to its sender only,
    /// as an `update` carrying the error.
    pub async fn handle_event(
        &self,
        participant: ParticipantId,
        event: ClientEvent,
        sender: &ParticipantSender,
    ) {
        let name = event.name();
        if let Err(err) = self.dispatch(participant, event, sender).await {
            tracing::debug!(%participant, event = name, error = %err, "event rejected");
            reject(sender, err.report());
        }
    }

    /// Answers bytes that didn't decode into a [`ClientEvent`].
    pub fn handle_malformed(
        &self,
        participant: ParticipantId,
        reason: &str,
        sender: &ParticipantSender,
    ) {
        tracing::debug!(%participant, %reason, "malformed event");
        reject(
            sender,
            ErrorReport::new(ErrorKind::MalformedEvent, format!("malformed event: {reason}")),
        );
    }

    /// Takes a participant out of its room after its connection closed.
    pub async fn disconnect(&self, participant: ParticipantId) {
        self.registry.disconnect(participant).await;
    }

    async fn dispatch(
        &self,
        participant: ParticipantId,
        event: ClientEvent,
        sender: &ParticipantSender,
    ) -> Result<(), RoomError> {
        match event {
            ClientEvent::CreateRoom => {
                self.registry
                    .create_room(participant, sender.clone())
                    .await?;
            }
            ClientEvent::JoinRoom { room } => {
                self.registry
                    .join_room(participant, &room, sender.clone())
                    .await?;
            }
            ClientEvent::LeaveRoom { room } => {
                self.registry.leave_room(participant, &room).await?;
            }
            ClientEvent::Start { room } => {
                self.registry.act(participant, &room, RoomAction::Start).await?;
            }
            ClientEvent::Choose {
                room,
                option,
                custom,
            } => {
                // Validation happens before the room sees anything.
                let choice = Choice::parse(&option, custom)?;
                self.registry
                    .act(participant, &room, RoomAction::Choose(choice))
                    .await?;
            }
            ClientEvent::CancelSelection { room } => {
                self.registry
                    .act(participant, &room, RoomAction::CancelSelection)
                    .await?;
            }
            ClientEvent::Boost { room } => {
                self.registry.act(participant, &room, RoomAction::Boost).await?;
            }
            ClientEvent::ResetRoom { room } => {
                self.registry.act(participant, &room, RoomAction::Reset).await?;
            }
        }
        Ok(())
    }
}

fn reject(sender: &ParticipantSender, error: ErrorReport) {
    // A closed receiver means the connection is already going away.
    let _ = sender.send(ServerEvent::Update(RoomSummary::rejection(error)));
}

#[cfg(test)]
mod tests {
    use clashroom_protocol::{RoomCode, RoomState};
    use clashroom_room::RoomConfig;
    use clashroom_rules::{RuleError, RuleSet};
    use tokio::sync::mpsc;

    use super::*;

    struct NoProvider;

    impl RuleProvider for NoProvider {
        async fn generate(&self, _options: &[String]) -> Result<RuleSet, RuleError> {
            Err(RuleError::Unavailable)
        }
    }

    fn gateway() -> SessionGateway<NoProvider> {
        SessionGateway::new(RoomRegistry::new(RoomConfig::default(), NoProvider))
    }

    async fn next_update(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> RoomSummary {
        match rx.recv().await {
            Some(ServerEvent::Update(summary)) => summary,
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_room_broadcasts_lobby_summary() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();

        gateway
            .handle_event(ParticipantId(1), ClientEvent::CreateRoom, &tx)
            .await;

        let summary = next_update(&mut rx).await;
        assert_eq!(summary.state, Some(RoomState::Lobby));
        assert_eq!(summary.participants, Some(1));
        assert!(summary.code.is_some());
        assert!(summary.error.is_none());
    }

    #[tokio::test]
    async fn test_join_unknown_room_unicasts_room_not_found() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let event = ClientEvent::JoinRoom {
            room: RoomCode::new("zzzzzz"),
        };
        gateway.handle_event(ParticipantId(1), event, &tx).await;

        let summary = next_update(&mut rx).await;
        assert_eq!(summary.error.unwrap().kind, ErrorKind::RoomNotFound);
        assert!(summary.code.is_none());
    }

    #[tokio::test]
    async fn test_invalid_custom_option_rejected_before_room() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();

        // The room doesn't exist, so reaching it would be room_not_found.
        let event = ClientEvent::Choose {
            room: RoomCode::new("zzzzzz"),
            option: "123abc".into(),
            custom: true,
        };
        gateway.handle_event(ParticipantId(1), event, &tx).await;

        let summary = next_update(&mut rx).await;
        assert_eq!(summary.error.unwrap().kind, ErrorKind::InvalidChoiceFormat);
    }

    #[tokio::test]
    async fn test_action_in_other_room_is_not_in_room() {
        let gateway = gateway();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        gateway
            .handle_event(ParticipantId(1), ClientEvent::CreateRoom, &tx1)
            .await;
        let code = next_update(&mut rx1).await.code.unwrap();
        gateway
            .handle_event(ParticipantId(2), ClientEvent::CreateRoom, &tx2)
            .await;
        next_update(&mut rx2).await;

        gateway
            .handle_event(ParticipantId(2), ClientEvent::Start { room: code }, &tx2)
            .await;

        let summary = next_update(&mut rx2).await;
        assert_eq!(summary.error.unwrap().kind, ErrorKind::NotInRoom);
        assert!(rx1.try_recv().is_err(), "other room must not hear about it");
    }

    #[tokio::test]
    async fn test_leave_last_member_tears_room_down() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();

        gateway
            .handle_event(ParticipantId(1), ClientEvent::CreateRoom, &tx)
            .await;
        let code = next_update(&mut rx).await.code.unwrap();

        gateway
            .handle_event(ParticipantId(1), ClientEvent::LeaveRoom { room: code }, &tx)
            .await;

        assert_eq!(gateway.registry().room_count().await, 0);
        assert!(rx.try_recv().is_err(), "a leave is not answered");
    }

    #[tokio::test]
    async fn test_handle_malformed_unicasts_malformed_event() {
        let gateway = gateway();
        let (tx, mut rx) = mpsc::unbounded_channel();

        gateway.handle_malformed(ParticipantId(1), "unknown variant `fly`", &tx);

        let error = next_update(&mut rx).await.error.unwrap();
        assert_eq!(error.kind, ErrorKind::MalformedEvent);
        assert!(error.message.contains("fly"));
    }
}
