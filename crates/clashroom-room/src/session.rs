//! The per-room state machine.
//!
//! [`RoomSession`] is a plain value: roster, choices, lifecycle state,
//! active rules and the simulation. It has no clock and does no I/O. The
//! room actor feeds it commands, ticks, and rule results, and publishes
//! what it returns.

use std::collections::BTreeMap;
use std::sync::Arc;

use clashroom_protocol::{GameFrame, ParticipantId, RoomCode, RoomState, RoomSummary, WinnerView};
use clashroom_rules::{RuleError, RuleSet, distinct_options};
use clashroom_sim::SimulationEngine;

use crate::{Choice, RoomConfig, RoomError};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Where the rules for a round come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every choice is built-in; use the fixed three-cycle.
    Builtin,
    /// At least one choice is custom; ask the generator about these
    /// distinct options.
    Custom(Vec<String>),
}

/// Emitted when the room needs rules for its current choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    /// The round the result must be applied to.
    pub round: u64,
    pub resolution: Resolution,
}

/// Result of removing a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Nobody is left; the room should be torn down.
    Empty,
    /// The room fell back to the lobby and lost every choice.
    ResetToLobby,
    /// The departure completed the set of choices.
    EnteredReady(ResolutionRequest),
    /// Only the roster changed.
    Left,
}

/// Result of offering rules to the session.
#[derive(Debug)]
pub enum RulesOutcome {
    /// The simulation was spawned and the room is running.
    Started,
    /// Resolution failed. The room is back in choosing with no choices.
    Failed(RuleError),
    /// The result belongs to an older round or the room moved on.
    Discarded,
}

/// What one simulation tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub frame: GameFrame,
    /// Set on the tick that decided the game.
    pub winner: Option<WinnerView>,
}

// ---------------------------------------------------------------------------
// RoomSession
// ---------------------------------------------------------------------------

/// Lifecycle and game state of one room.
pub struct RoomSession {
    code: RoomCode,
    config: RoomConfig,
    state: RoomState,
    roster: BTreeMap<ParticipantId, Option<Choice>>,
    round: u64,
    rules: Option<Arc<RuleSet>>,
    engine: Option<SimulationEngine>,
    winner: Option<usize>,
}

impl RoomSession {
    pub fn new(code: RoomCode, config: RoomConfig) -> Self {
        Self {
            code,
            config,
            state: RoomState::Lobby,
            roster: BTreeMap::new(),
            round: 0,
            rules: None,
            engine: None,
            winner: None,
        }
    }

    // ----- Accessors -----

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    /// Current resolution round. Bumped whenever a pending resolution
    /// becomes stale.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.roster.contains_key(&participant)
    }

    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.roster.keys().copied()
    }

    pub fn choice_of(&self, participant: ParticipantId) -> Option<&Choice> {
        self.roster.get(&participant).and_then(Option::as_ref)
    }

    pub fn rules(&self) -> Option<&RuleSet> {
        self.rules.as_deref()
    }

    pub fn engine(&self) -> Option<&SimulationEngine> {
        self.engine.as_ref()
    }

    /// The winning type, once the game is over.
    pub fn winner(&self) -> Option<WinnerView> {
        let (rules, kind) = (self.rules.as_deref()?, self.winner?);
        Some(WinnerView {
            option: rules.option(kind).to_string(),
            symbol: rules.symbol(kind).to_string(),
            rationale: rules.rationale(kind).map(str::to_string),
        })
    }

    /// Snapshot broadcast after every transition.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary::room(self.code.clone(), self.state, self.roster.len())
            .with_winner(self.winner())
    }

    /// Current unit positions, while a simulation exists.
    pub fn frame(&self) -> Option<GameFrame> {
        self.engine.as_ref().map(|engine| GameFrame {
            tick: engine.tick(),
            units: engine.frame(),
        })
    }

    // ----- Roster -----

    /// Adds a participant. Only possible in the lobby.
    pub fn join(&mut self, participant: ParticipantId) -> Result<(), RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::InvalidState(format!(
                "cannot join room {} in state {}",
                self.code, self.state
            )));
        }
        if self.contains(participant) {
            return Err(RoomError::AlreadyInRoom(participant, self.code.clone()));
        }
        if self.roster.len() >= self.config.max_participants {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        self.roster.insert(participant, None);
        tracing::info!(
            code = %self.code,
            %participant,
            participants = self.roster.len(),
            "participant joined"
        );
        Ok(())
    }

    /// Removes a participant and applies the fallback rules for the
    /// current state.
    pub fn leave(&mut self, participant: ParticipantId) -> Result<LeaveOutcome, RoomError> {
        if self.roster.remove(&participant).is_none() {
            return Err(RoomError::NotInRoom(participant, self.code.clone()));
        }
        tracing::info!(
            code = %self.code,
            %participant,
            participants = self.roster.len(),
            "participant left"
        );

        if self.roster.is_empty() {
            return Ok(LeaveOutcome::Empty);
        }

        let outcome = match self.state {
            RoomState::Choosing if self.roster.len() < self.config.min_participants => {
                self.reset_to_lobby();
                LeaveOutcome::ResetToLobby
            }
            RoomState::Choosing if self.all_chosen() => {
                LeaveOutcome::EnteredReady(self.enter_ready())
            }
            RoomState::Ready => {
                self.reset_to_lobby();
                LeaveOutcome::ResetToLobby
            }
            _ => LeaveOutcome::Left,
        };
        Ok(outcome)
    }

    // ----- Participant actions -----

    /// Moves the room from the lobby into choosing.
    pub fn start(&mut self, participant: ParticipantId) -> Result<(), RoomError> {
        self.require_member(participant)?;
        if self.state != RoomState::Lobby {
            return Err(self.wrong_state("start"));
        }
        if self.roster.len() < self.config.min_participants {
            return Err(RoomError::InvalidState(format!(
                "need at least {} participants to start, have {}",
                self.config.min_participants,
                self.roster.len()
            )));
        }
        self.transition(RoomState::Choosing);
        Ok(())
    }

    /// Records a choice.
    ///
    /// Returns a request when rules are now needed: either the last
    /// missing choice arrived, or a choice was corrected while the room
    /// was already waiting for rules.
    pub fn choose(
        &mut self,
        participant: ParticipantId,
        choice: Choice,
    ) -> Result<Option<ResolutionRequest>, RoomError> {
        self.require_member(participant)?;
        if !self.state.accepts_choices() {
            return Err(self.wrong_state("choose"));
        }

        tracing::debug!(
            code = %self.code,
            %participant,
            option = choice.option(),
            custom = choice.is_custom(),
            "choice recorded"
        );
        self.roster.insert(participant, Some(choice));

        match self.state {
            RoomState::Choosing if self.all_chosen() => Ok(Some(self.enter_ready())),
            RoomState::Ready => {
                self.round += 1;
                Ok(Some(self.resolution_request()))
            }
            _ => Ok(None),
        }
    }

    /// Withdraws the participant's choice. From ready this invalidates the
    /// pending resolution and goes back to choosing.
    pub fn cancel_selection(&mut self, participant: ParticipantId) -> Result<(), RoomError> {
        self.require_member(participant)?;
        if !self.state.accepts_choices() {
            return Err(self.wrong_state("cancel a selection"));
        }

        self.roster.insert(participant, None);
        if self.state == RoomState::Ready {
            self.round += 1;
            self.transition(RoomState::Choosing);
        }
        Ok(())
    }

    /// Boosts every unit of the participant's type. Returns the number of
    /// units affected.
    pub fn boost(&mut self, participant: ParticipantId) -> Result<usize, RoomError> {
        self.require_member(participant)?;
        if !self.state.is_running() {
            return Err(self.wrong_state("boost"));
        }

        let kind = self
            .choice_of(participant)
            .zip(self.rules.as_deref())
            .and_then(|(choice, rules)| rules.index_of(choice.option()));
        match (kind, self.engine.as_mut()) {
            (Some(kind), Some(engine)) => Ok(engine.boost(kind)),
            _ => Err(RoomError::InvalidState(format!(
                "participant {participant} has no units in room {}",
                self.code
            ))),
        }
    }

    /// Returns a finished room to the lobby, keeping the roster.
    pub fn reset(&mut self, participant: ParticipantId) -> Result<(), RoomError> {
        self.require_member(participant)?;
        if self.state != RoomState::GameOver {
            return Err(self.wrong_state("reset"));
        }
        self.reset_to_lobby();
        Ok(())
    }

    // ----- Rules and simulation -----

    /// Offers the outcome of a resolution for `round`.
    ///
    /// The result only takes effect if it is for the current round, the
    /// room is still ready, and every participant still has a choice.
    pub fn apply_rules(
        &mut self,
        round: u64,
        result: Result<RuleSet, RuleError>,
    ) -> RulesOutcome {
        if round != self.round || self.state != RoomState::Ready || !self.all_chosen() {
            tracing::debug!(
                code = %self.code,
                round,
                current = self.round,
                state = %self.state,
                "stale rule result discarded"
            );
            return RulesOutcome::Discarded;
        }

        let rules = match result {
            Ok(rules) => rules,
            Err(err) => return self.fail_resolution(err),
        };

        let kinds: Result<Vec<usize>, RuleError> = self
            .roster
            .values()
            .flatten()
            .map(|choice| {
                rules
                    .index_of(choice.option())
                    .ok_or_else(|| RuleError::MissingOption(choice.option().to_string()))
            })
            .collect();
        let kinds = match kinds {
            Ok(kinds) => kinds,
            Err(err) => return self.fail_resolution(err),
        };

        let rules = Arc::new(rules);
        self.engine = Some(SimulationEngine::spawn(
            self.config.sim.clone(),
            Arc::clone(&rules),
            &kinds,
        ));
        self.rules = Some(rules);
        self.transition(RoomState::Running);
        RulesOutcome::Started
    }

    /// Advances the simulation by one step. Does nothing unless running.
    pub fn tick(&mut self) -> Option<TickReport> {
        if !self.state.is_running() {
            return None;
        }
        let engine = self.engine.as_mut()?;
        let outcome = engine.step();
        let frame = GameFrame {
            tick: outcome.tick,
            units: engine.frame(),
        };
        tracing::trace!(code = %self.code, tick = outcome.tick, "simulation stepped");

        let winner = outcome.winner.and_then(|kind| {
            self.winner = Some(kind);
            self.transition(RoomState::GameOver);
            let view = self.winner();
            if let Some(view) = &view {
                tracing::info!(
                    code = %self.code,
                    winner = %view.option,
                    tick = outcome.tick,
                    "game over"
                );
            }
            view
        });

        Some(TickReport { frame, winner })
    }

    // ----- Internals -----

    fn all_chosen(&self) -> bool {
        !self.roster.is_empty() && self.roster.values().all(Option::is_some)
    }

    fn enter_ready(&mut self) -> ResolutionRequest {
        self.round += 1;
        self.transition(RoomState::Ready);
        self.resolution_request()
    }

    fn resolution_request(&self) -> ResolutionRequest {
        let choices: Vec<&Choice> = self.roster.values().flatten().collect();
        let resolution = if choices.iter().any(|c| c.is_custom()) {
            let options: Vec<&str> = choices.iter().map(|c| c.option()).collect();
            Resolution::Custom(distinct_options(&options))
        } else {
            Resolution::Builtin
        };
        ResolutionRequest {
            round: self.round,
            resolution,
        }
    }

    fn fail_resolution(&mut self, err: RuleError) -> RulesOutcome {
        tracing::warn!(code = %self.code, round = self.round, error = %err, "rule resolution failed");
        self.round += 1;
        self.clear_choices();
        self.transition(RoomState::Choosing);
        RulesOutcome::Failed(err)
    }

    fn reset_to_lobby(&mut self) {
        self.round += 1;
        self.clear_choices();
        self.rules = None;
        self.engine = None;
        self.winner = None;
        self.transition(RoomState::Lobby);
    }

    fn clear_choices(&mut self) {
        for choice in self.roster.values_mut() {
            *choice = None;
        }
    }

    fn transition(&mut self, target: RoomState) {
        if !self.state.can_transition_to(target) {
            tracing::error!(
                code = %self.code,
                from = %self.state,
                to = %target,
                "illegal room transition refused"
            );
            return;
        }
        tracing::info!(code = %self.code, from = %self.state, to = %target, "room state changed");
        self.state = target;
    }

    fn require_member(&self, participant: ParticipantId) -> Result<(), RoomError> {
        if self.contains(participant) {
            Ok(())
        } else {
            Err(RoomError::NotInRoom(participant, self.code.clone()))
        }
    }

    fn wrong_state(&self, action: &str) -> RoomError {
        RoomError::InvalidState(format!(
            "cannot {action} in room {} while {}",
            self.code, self.state
        ))
    }
}
