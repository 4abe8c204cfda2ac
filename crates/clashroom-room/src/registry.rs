//! Room registry: creates, tracks, and routes participants to rooms.

use std::collections::HashMap;
use std::sync::Arc;

use clashroom_protocol::{ParticipantId, RoomCode, RoomSummary};
use clashroom_rules::RuleProvider;
use tokio::sync::Mutex;

use crate::code::generate_code;
use crate::room::spawn_room;
use crate::{ParticipantSender, RoomAction, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Every live room and which participant is in which room.
#[derive(Default)]
struct Directory {
    rooms: HashMap<RoomCode, RoomHandle>,
    /// A participant is in at most one room.
    memberships: HashMap<ParticipantId, RoomCode>,
}

impl Directory {
    /// Drops rooms whose actor has stopped, and memberships pointing at
    /// them.
    fn purge_closed(&mut self) {
        let before = self.rooms.len();
        self.rooms.retain(|_, handle| !handle.is_closed());
        if self.rooms.len() != before {
            let rooms = &self.rooms;
            self.memberships.retain(|_, code| rooms.contains_key(code));
            tracing::debug!(purged = before - self.rooms.len(), "closed rooms purged");
        }
    }

    fn handle(&self, code: &RoomCode) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }

    /// Removes `participant` from whatever room it is in, tearing the room
    /// down if that leaves it empty.
    async fn detach(&mut self, participant: ParticipantId) {
        let Some(code) = self.memberships.remove(&participant) else {
            return;
        };
        let Some(handle) = self.rooms.get(&code) else {
            return;
        };

        match handle.leave(participant).await {
            Ok(0) | Err(RoomError::Unavailable(_)) => {
                self.rooms.remove(&code);
                tracing::info!(%code, rooms = self.rooms.len(), "room torn down");
            }
            Ok(_) => {}
            // The membership is already gone. The room stays listed until
            // its actor answers or closes.
            Err(err) => {
                tracing::warn!(%code, %participant, error = %err, "leave failed");
            }
        }
    }
}

struct Inner<P> {
    config: RoomConfig,
    provider: Arc<P>,
    directory: Mutex<Directory>,
}

/// Process-wide store of live rooms.
///
/// Cloning is cheap and every clone sees the same rooms. Create, join,
/// leave and disconnect hold the registry lock for their whole duration, so
/// they are atomic with respect to each other (teardown of an emptied room
/// included). While they hold it they wait on at most two room actors, and
/// each wait is bounded by `RoomConfig::command_timeout`, so a stuck room
/// delays other registry calls by that long at most. Room actions only take
/// the lock long enough to check membership and clone the room's handle.
pub struct RoomRegistry<P: RuleProvider> {
    inner: Arc<Inner<P>>,
}

impl<P: RuleProvider> Clone for RoomRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: RuleProvider> RoomRegistry<P> {
    pub fn new(config: RoomConfig, provider: P) -> Self {
        Self::with_shared_provider(config, Arc::new(provider))
    }

    pub fn with_shared_provider(config: RoomConfig, provider: Arc<P>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                provider,
                directory: Mutex::new(Directory::default()),
            }),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.inner.config
    }

    /// Creates a room with a fresh code and puts `participant` in it,
    /// leaving any room it was in before.
    pub async fn create_room(
        &self,
        participant: ParticipantId,
        sender: ParticipantSender,
    ) -> Result<RoomSummary, RoomError> {
        let mut dir = self.inner.directory.lock().await;
        dir.purge_closed();
        dir.detach(participant).await;

        let code = {
            let mut rng = rand::rng();
            let mut code = generate_code(&mut rng);
            while dir.rooms.contains_key(&code) {
                tracing::debug!(%code, "room code collision, re-rolling");
                code = generate_code(&mut rng);
            }
            code
        };

        let handle = spawn_room(
            code.clone(),
            self.inner.config.clone(),
            Arc::clone(&self.inner.provider),
        );
        let summary = handle.join(participant, sender).await?;
        dir.rooms.insert(code.clone(), handle);
        dir.memberships.insert(participant, code.clone());

        tracing::info!(%code, %participant, rooms = dir.rooms.len(), "room created");
        Ok(summary)
    }

    /// Puts `participant` in the room `code`. Its previous room, if any, is
    /// left only after the join succeeded.
    pub async fn join_room(
        &self,
        participant: ParticipantId,
        code: &RoomCode,
        sender: ParticipantSender,
    ) -> Result<RoomSummary, RoomError> {
        let mut dir = self.inner.directory.lock().await;
        dir.purge_closed();

        let handle = dir.handle(code)?;
        if dir.memberships.get(&participant) == Some(code) {
            return Err(RoomError::AlreadyInRoom(participant, code.clone()));
        }

        let summary = handle.join(participant, sender).await?;
        dir.detach(participant).await;
        dir.memberships.insert(participant, code.clone());
        Ok(summary)
    }

    /// Removes `participant` from room `code`.
    pub async fn leave_room(
        &self,
        participant: ParticipantId,
        code: &RoomCode,
    ) -> Result<(), RoomError> {
        let mut dir = self.inner.directory.lock().await;
        dir.purge_closed();

        dir.handle(code)?;
        if dir.memberships.get(&participant) != Some(code) {
            return Err(RoomError::NotInRoom(participant, code.clone()));
        }
        dir.detach(participant).await;
        Ok(())
    }

    /// Removes `participant` from its room, if it is in one. Called when a
    /// connection closes.
    pub async fn disconnect(&self, participant: ParticipantId) {
        let mut dir = self.inner.directory.lock().await;
        dir.purge_closed();
        dir.detach(participant).await;
    }

    /// Forwards a room action from a member.
    pub async fn act(
        &self,
        participant: ParticipantId,
        code: &RoomCode,
        action: RoomAction,
    ) -> Result<(), RoomError> {
        let handle = {
            let mut dir = self.inner.directory.lock().await;
            dir.purge_closed();
            let handle = dir.handle(code)?;
            if dir.memberships.get(&participant) != Some(code) {
                return Err(RoomError::NotInRoom(participant, code.clone()));
            }
            handle
        };
        handle.act(participant, action).await
    }

    pub async fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        let handle = {
            let mut dir = self.inner.directory.lock().await;
            dir.purge_closed();
            dir.handle(code)?
        };
        handle.info().await
    }

    /// The room `participant` is currently in.
    pub async fn participant_room(&self, participant: ParticipantId) -> Option<RoomCode> {
        let mut dir = self.inner.directory.lock().await;
        dir.purge_closed();
        dir.memberships.get(&participant).cloned()
    }

    pub async fn room_count(&self) -> usize {
        let mut dir = self.inner.directory.lock().await;
        dir.purge_closed();
        dir.rooms.len()
    }

    pub async fn room_codes(&self) -> Vec<RoomCode> {
        let mut dir = self.inner.directory.lock().await;
        dir.purge_closed();
        dir.rooms.keys().cloned().collect()
    }

    /// Stops every room.
    pub async fn shutdown_all(&self) {
        let mut dir = self.inner.directory.lock().await;
        for (code, handle) in dir.rooms.drain() {
            if handle.shutdown().await.is_err() {
                tracing::debug!(%code, "room already stopped");
            }
        }
        dir.memberships.clear();
    }
}
