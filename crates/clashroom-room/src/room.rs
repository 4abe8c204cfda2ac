//! Room actor: an isolated Tokio task that owns one room.
//!
//! The actor owns the [`RoomSession`], the participants' outbound senders,
//! the tick scheduler while the simulation runs, and the in-flight rule
//! generation task. Commands, ticks and rule results are handled one at a
//! time from a single `select!` loop, so none of them can observe another
//! half-applied.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use clashroom_protocol::{
    ErrorKind, ErrorReport, ParticipantId, RoomCode, RoomState, RoomSummary, ServerEvent,
};
use clashroom_rules::{RuleError, RuleProvider, RuleSet, resolve_custom};
use clashroom_tick::{TickConfig, TickInfo, TickMetrics, TickScheduler};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::session::{LeaveOutcome, Resolution, ResolutionRequest, RulesOutcome};
use crate::{Choice, RoomConfig, RoomError, RoomSession};

/// Channel sender for delivering server events to one participant.
pub type ParticipantSender = mpsc::UnboundedSender<ServerEvent>;

/// A room-scoped action from a member.
#[derive(Debug, Clone)]
pub enum RoomAction {
    Start,
    Choose(Choice),
    CancelSelection,
    Boost,
    Reset,
}

impl RoomAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Choose(_) => "choose",
            Self::CancelSelection => "cancel_selection",
            Self::Boost => "boost",
            Self::Reset => "reset_room",
        }
    }
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        participant: ParticipantId,
        sender: ParticipantSender,
        reply: oneshot::Sender<Result<RoomSummary, RoomError>>,
    },

    /// Replies with the number of participants left. Zero means the actor
    /// is stopping.
    Leave {
        participant: ParticipantId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    Act {
        participant: ParticipantId,
        action: RoomAction,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub state: RoomState,
    pub participants: usize,
    /// Current resolution round.
    pub round: u64,
    /// Whether a tick loop is active.
    pub ticking: bool,
    /// Whether a rule generation call is in flight.
    pub resolving: bool,
    /// Counters of the running tick loop, or of the last one if the
    /// simulation has stopped. `None` before the first game.
    pub tick_metrics: Option<TickMetrics>,
}

/// Handle to a running room actor.
///
/// Cheap to clone. The registry holds one per room. Every request, the
/// wait for channel capacity included, is bounded by the room's
/// `command_timeout`.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
    timeout: Duration,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub async fn join(
        &self,
        participant: ParticipantId,
        sender: ParticipantSender,
    ) -> Result<RoomSummary, RoomError> {
        self.request(|reply| RoomCommand::Join {
            participant,
            sender,
            reply,
        })
        .await?
    }

    /// Removes a participant. Returns how many are left.
    pub async fn leave(&self, participant: ParticipantId) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { participant, reply })
            .await?
    }

    pub async fn act(
        &self,
        participant: ParticipantId,
        action: RoomAction,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Act {
            participant,
            action,
            reply,
        })
        .await?
    }

    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Tells the room to stop.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        match tokio::time::timeout(self.timeout, self.sender.send(RoomCommand::Shutdown)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RoomError::Unavailable(self.code.clone())),
            Err(_) => Err(RoomError::Timeout(self.code.clone())),
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let round_trip = async move {
            self.sender
                .send(command(reply_tx))
                .await
                .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
            reply_rx
                .await
                .map_err(|_| RoomError::Unavailable(self.code.clone()))
        };
        tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| {
                tracing::warn!(code = %self.code, timeout = ?self.timeout, "room request timed out");
                RoomError::Timeout(self.code.clone())
            })?
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

type RulesResult = Result<RuleSet, RuleError>;

/// A rule generation task and the round it was started for.
struct PendingRules {
    round: u64,
    task: JoinHandle<RulesResult>,
}

struct RoomActor<P: RuleProvider> {
    session: RoomSession,
    config: RoomConfig,
    provider: Arc<P>,
    senders: HashMap<ParticipantId, ParticipantSender>,
    ticker: Option<TickScheduler>,
    /// Metrics of the last tick loop that was stopped.
    last_tick_metrics: Option<TickMetrics>,
    pending: Option<PendingRules>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<P: RuleProvider> RoomActor<P> {
    async fn run(mut self) {
        let code = self.session.code().clone();
        tracing::info!(%code, "room actor started");

        loop {
            let step = tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => Ok(ControlFlow::Break(())),
                },
                info = next_tick(&mut self.ticker), if self.ticker.is_some() => {
                    self.handle_tick(info);
                    Ok(ControlFlow::Continue(()))
                }
                (round, result) = pending_rules(&mut self.pending), if self.pending.is_some() => {
                    self.pending = None;
                    self.handle_rules(round, result)
                }
            };

            match step {
                Ok(ControlFlow::Continue(())) => self.reconcile(),
                Ok(ControlFlow::Break(())) => break,
                Err(err) => {
                    tracing::error!(%code, error = %err, "room invariant violated, shutting down");
                    self.broadcast(ServerEvent::Update(
                        self.session
                            .summary()
                            .with_error(ErrorReport::new(ErrorKind::Internal, err.to_string())),
                    ));
                    break;
                }
            }
        }

        self.stop_ticker();
        self.abort_pending();
        tracing::info!(%code, "room actor stopped");
    }

    /// Handles one command. `Err` is fatal for the room.
    fn handle_command(&mut self, command: RoomCommand) -> Result<ControlFlow<()>, RoomError> {
        match command {
            RoomCommand::Join {
                participant,
                sender,
                reply,
            } => {
                let result = self.session.join(participant).map(|()| {
                    self.senders.insert(participant, sender);
                    self.broadcast_summary();
                    self.session.summary()
                });
                let _ = reply.send(result);
            }
            RoomCommand::Leave { participant, reply } => {
                let outcome = match self.session.leave(participant) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        let _ = reply.send(Err(err));
                        return Ok(ControlFlow::Continue(()));
                    }
                };
                self.senders.remove(&participant);
                let _ = reply.send(Ok(self.session.participant_count()));

                match outcome {
                    LeaveOutcome::Empty => {
                        tracing::info!(code = %self.session.code(), "room empty, tearing down");
                        return Ok(ControlFlow::Break(()));
                    }
                    LeaveOutcome::EnteredReady(request) => {
                        self.broadcast_summary();
                        self.begin_resolution(request)?;
                    }
                    LeaveOutcome::ResetToLobby | LeaveOutcome::Left => self.broadcast_summary(),
                }
            }
            RoomCommand::Act {
                participant,
                action,
                reply,
            } => {
                let name = action.name();
                match self.handle_action(participant, action) {
                    Ok(request) => {
                        let _ = reply.send(Ok(()));
                        self.broadcast_summary();
                        if let Some(request) = request {
                            self.begin_resolution(request)?;
                        }
                    }
                    Err(err) => {
                        tracing::debug!(
                            code = %self.session.code(),
                            %participant,
                            action = name,
                            error = %err,
                            "action rejected"
                        );
                        let _ = reply.send(Err(err));
                    }
                }
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(code = %self.session.code(), "room shutting down");
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn handle_action(
        &mut self,
        participant: ParticipantId,
        action: RoomAction,
    ) -> Result<Option<ResolutionRequest>, RoomError> {
        match action {
            RoomAction::Start => self.session.start(participant).map(|()| None),
            RoomAction::Choose(choice) => self.session.choose(participant, choice),
            RoomAction::CancelSelection => self.session.cancel_selection(participant).map(|()| None),
            RoomAction::Boost => self.session.boost(participant).map(|_| None),
            RoomAction::Reset => self.session.reset(participant).map(|()| None),
        }
    }

    fn handle_tick(&mut self, info: TickInfo) {
        if let Some(report) = self.session.tick() {
            self.broadcast(ServerEvent::GameFrame(report.frame));
            if report.winner.is_some() {
                self.broadcast_summary();
            }
        }
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.record_tick_end();
        }
        if info.ticks_skipped > 0 {
            tracing::debug!(
                code = %self.session.code(),
                skipped = info.ticks_skipped,
                "room fell behind its tick interval"
            );
        }
    }

    fn handle_rules(&mut self, round: u64, result: RulesResult) -> Result<ControlFlow<()>, RoomError> {
        let outcome = self.session.apply_rules(round, result);
        self.after_rules(outcome)?;
        Ok(ControlFlow::Continue(()))
    }

    /// Starts producing rules for `request`, replacing any older attempt.
    fn begin_resolution(&mut self, request: ResolutionRequest) -> Result<(), RoomError> {
        self.abort_pending();

        match request.resolution {
            Resolution::Builtin => {
                let outcome = self.session.apply_rules(request.round, Ok(RuleSet::builtin()));
                self.after_rules(outcome)
            }
            Resolution::Custom(options) => {
                tracing::info!(
                    code = %self.session.code(),
                    round = request.round,
                    ?options,
                    "requesting custom rules"
                );
                let provider = Arc::clone(&self.provider);
                let timeout = self.config.rules_timeout;
                let task = tokio::spawn(generate_with_timeout(provider, options, timeout));
                self.pending = Some(PendingRules {
                    round: request.round,
                    task,
                });
                Ok(())
            }
        }
    }

    fn after_rules(&mut self, outcome: RulesOutcome) -> Result<(), RoomError> {
        match outcome {
            RulesOutcome::Started => {
                self.start_ticker()?;
                self.broadcast_summary();
                if let Some(frame) = self.session.frame() {
                    self.broadcast(ServerEvent::GameFrame(frame));
                }
            }
            RulesOutcome::Failed(err) => {
                let report = RoomError::from(err).report();
                self.broadcast(ServerEvent::Update(self.session.summary().with_error(report)));
            }
            RulesOutcome::Discarded => {}
        }
        Ok(())
    }

    fn start_ticker(&mut self) -> Result<(), RoomError> {
        if self.ticker.is_some() {
            return Err(RoomError::ConcurrentStart(self.session.code().clone()));
        }
        self.ticker = Some(TickScheduler::new(TickConfig {
            interval: self.config.tick_interval,
            policy: self.config.tick_policy,
            ..TickConfig::default()
        }));
        tracing::debug!(
            code = %self.session.code(),
            policy = ?self.config.tick_policy,
            "tick loop started"
        );
        Ok(())
    }

    /// Drops the ticker, keeping its metrics for `RoomInfo`.
    fn stop_ticker(&mut self) {
        let Some(ticker) = self.ticker.take() else {
            return;
        };
        let metrics = ticker.metrics().clone();
        tracing::debug!(
            code = %self.session.code(),
            ticks = metrics.total_ticks,
            overruns = metrics.total_overruns,
            skipped = metrics.total_skipped,
            max_tick_us = metrics.max_tick_time.as_micros() as u64,
            "tick loop stopped"
        );
        self.last_tick_metrics = Some(metrics);
    }

    /// Drops whatever the current state no longer allows: the ticker
    /// outside RUNNING, and a resolution for a round that has moved on.
    fn reconcile(&mut self) {
        if !self.session.state().is_running() {
            self.stop_ticker();
        }

        let stale = self.pending.as_ref().is_some_and(|pending| {
            pending.round != self.session.round() || self.session.state() != RoomState::Ready
        });
        if stale {
            self.abort_pending();
        }
    }

    fn abort_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
            tracing::debug!(
                code = %self.session.code(),
                round = pending.round,
                "rule generation abandoned"
            );
        }
    }

    fn broadcast_summary(&self) {
        self.broadcast(ServerEvent::Update(self.session.summary()));
    }

    /// Sends an event to every member. Closed receivers are skipped.
    fn broadcast(&self, event: ServerEvent) {
        for sender in self.senders.values() {
            let _ = sender.send(event.clone());
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.session.code().clone(),
            state: self.session.state(),
            participants: self.session.participant_count(),
            round: self.session.round(),
            ticking: self.ticker.is_some(),
            resolving: self.pending.is_some(),
            tick_metrics: self
                .ticker
                .as_ref()
                .map(|ticker| ticker.metrics().clone())
                .or_else(|| self.last_tick_metrics.clone()),
        }
    }
}

async fn next_tick(ticker: &mut Option<TickScheduler>) -> TickInfo {
    match ticker {
        Some(ticker) => ticker.wait_for_tick().await,
        None => std::future::pending().await,
    }
}

/// Waits for the in-flight rule task. The caller must clear the slot once
/// this resolves.
async fn pending_rules(pending: &mut Option<PendingRules>) -> (u64, RulesResult) {
    match pending {
        Some(pending) => {
            let result = match (&mut pending.task).await {
                Ok(result) => result,
                Err(err) => Err(RuleError::Request(format!("rule task failed: {err}"))),
            };
            (pending.round, result)
        }
        None => std::future::pending().await,
    }
}

async fn generate_with_timeout<P: RuleProvider>(
    provider: Arc<P>,
    options: Vec<String>,
    timeout: Duration,
) -> RulesResult {
    match tokio::time::timeout(timeout, resolve_custom(provider.as_ref(), &options)).await {
        Ok(result) => result,
        Err(_) => Err(RuleError::Timeout(timeout)),
    }
}

/// Spawns a room actor task and returns a handle to it.
pub(crate) fn spawn_room<P: RuleProvider>(
    code: RoomCode,
    config: RoomConfig,
    provider: Arc<P>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let timeout = config.command_timeout;
    let actor = RoomActor {
        session: RoomSession::new(code.clone(), config.clone()),
        config,
        provider,
        senders: HashMap::new(),
        ticker: None,
        last_tick_metrics: None,
        pending: None,
        receiver: rx,
    };
    tokio::spawn(actor.run());
    RoomHandle {
        code,
        sender: tx,
        timeout,
    }
}
