use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// High-level phases a game room can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Teams are joining; no round has been played yet.
    Waiting,
    /// The game is running and the current round is in the given sub-phase.
    Playing(RoundPhase),
    /// Final results have been published. Terminal.
    Finished,
}

/// Fine-grained phase of the current round while the game is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Game started, the manager has not requested a round yet.
    AwaitingRound,
    /// The clip is playing and buzzers are armed.
    SongPlaying,
    /// A team won the buzzer race.
    BuzzerLocked,
    /// The manager is judging the buzz winner's answer.
    Evaluating,
    /// The round is over; the manager must request the next one.
    Completed,
}

/// Coarse lifecycle reported to clients and to the registry janitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// See [`GamePhase::Waiting`].
    Waiting,
    /// See [`GamePhase::Playing`].
    Playing,
    /// See [`GamePhase::Finished`].
    Finished,
}

impl GamePhase {
    /// Collapse the phase into the room lifecycle state.
    pub fn lifecycle(&self) -> LifecycleState {
        match self {
            GamePhase::Waiting => LifecycleState::Waiting,
            GamePhase::Playing(_) => LifecycleState::Playing,
            GamePhase::Finished => LifecycleState::Finished,
        }
    }

    /// Round sub-phase, when a game is playing.
    pub fn round_phase(&self) -> Option<RoundPhase> {
        match self {
            GamePhase::Playing(round) => Some(*round),
            _ => None,
        }
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Manager starts the game once enough teams are connected.
    StartGame,
    /// A song was selected and the next round begins.
    StartRound,
    /// The first accepted buzz of the current window.
    Buzz,
    /// Hand the locked buzz over to the manager for judging.
    BeginEvaluation,
    /// The buzz winner answered wrong; buzzers are re-armed.
    WrongAnswer,
    /// Replay the clip from its start offset.
    RestartSong,
    /// Resume the clip after a buzz without replaying it.
    ContinueSong,
    /// Close the round (skip or finish).
    FinishRound,
    /// End the game and publish final scores.
    EndGame,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event:?} is not allowed while {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: GamePhase,
        /// Current phase.
        actual: GamePhase,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: GamePhase,
    /// Phase the state machine will transition to.
    pub to: GamePhase,
    /// Event that triggered this transition.
    pub event: GameEvent,
}

/// Per-room state machine. Every phase change of a room goes through
/// [`GameStateMachine::compute_transition`].
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Waiting,
            version: 0,
            pending: None,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine in the waiting phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Plan a transition by validating that the event can be applied from the current phase.
    pub fn plan(&mut self, event: GameEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, returning the new phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GamePhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        self.phase = plan.to;
        self.version += 1;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Plan and apply in one step, for transitions with no asynchronous work attached.
    pub fn transition(&mut self, event: GameEvent) -> Result<GamePhase, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;
        self.phase = next;
        self.version += 1;

        Ok(next)
    }

    /// Force the terminal phase regardless of the current one. Used when a room
    /// hits an internal fault and must stop accepting gameplay.
    pub fn force_finish(&mut self) {
        self.pending = None;
        if self.phase != GamePhase::Finished {
            self.phase = GamePhase::Finished;
            self.version += 1;
        }
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        use RoundPhase::*;

        let next = match (self.phase, event) {
            (GamePhase::Waiting, GameEvent::StartGame) => GamePhase::Playing(AwaitingRound),
            (GamePhase::Playing(AwaitingRound | Completed), GameEvent::StartRound) => {
                GamePhase::Playing(SongPlaying)
            }
            (GamePhase::Playing(SongPlaying), GameEvent::Buzz) => GamePhase::Playing(BuzzerLocked),
            (GamePhase::Playing(BuzzerLocked), GameEvent::BeginEvaluation) => {
                GamePhase::Playing(Evaluating)
            }
            (GamePhase::Playing(Evaluating), GameEvent::WrongAnswer) => {
                GamePhase::Playing(SongPlaying)
            }
            (
                GamePhase::Playing(SongPlaying | BuzzerLocked | Evaluating | Completed),
                GameEvent::RestartSong,
            ) => GamePhase::Playing(SongPlaying),
            (GamePhase::Playing(BuzzerLocked | Evaluating), GameEvent::ContinueSong) => {
                GamePhase::Playing(SongPlaying)
            }
            (
                GamePhase::Playing(SongPlaying | BuzzerLocked | Evaluating),
                GameEvent::FinishRound,
            ) => GamePhase::Playing(Completed),
            // Ending twice republishes the results; the phase stays put.
            (_, GameEvent::EndGame) => GamePhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
