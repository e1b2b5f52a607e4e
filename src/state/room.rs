//! The game room aggregate. A room is owned by exactly one actor task (see
//! [`crate::state::actor`]) which calls into it one command at a time, so nothing
//! here needs locking.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dto::{
        room::{RoomSnapshot, RoomSummary, RoundSnapshot, SongSnapshot, TeamSummary},
        validation::validate_team_name,
        ws::{ClientMessage, ServerMessage},
    },
    error::ServiceError,
    services::{game_directory::GameDirectory, song_selector::SongSelector},
    state::{
        connection::{BroadcastBus, ConnectionHandle, ConnectionId, OutboundSender},
        game::{GameCode, GameSettings, Role, Round, Team},
        scoring::{self, UsedSongs, Verdict},
        state_machine::{
            GameEvent, GamePhase, GameStateMachine, LifecycleState, PlanId, RoundPhase,
        },
    },
};

/// Connected teams required before a game can start.
pub const MIN_TEAMS_TO_START: usize = 2;

/// Collaborators and configuration shared by every room.
#[derive(Clone)]
pub struct RoomDeps {
    /// Song source consulted on each round start.
    pub selector: Arc<dyn SongSelector>,
    /// Lobby consulted once for the room's settings.
    pub directory: Arc<dyn GameDirectory>,
    /// Process configuration.
    pub config: Arc<AppConfig>,
}

/// Liveness summary used by the registry janitor and the `/games` listing.
#[derive(Debug, Clone)]
pub struct RoomStatus {
    /// Room code.
    pub code: GameCode,
    /// Coarse lifecycle.
    pub lifecycle: LifecycleState,
    /// Roster size.
    pub teams: usize,
    /// Registered sockets.
    pub connections: usize,
    /// Whether the room stopped after an internal fault.
    pub errored: bool,
    /// Time since the last join or inbound message.
    pub idle_for: Duration,
}

impl RoomStatus {
    /// Whether the janitor should reap the room.
    pub fn is_expired(&self, finished_grace: Duration, idle_timeout: Duration) -> bool {
        let finished = self.lifecycle == LifecycleState::Finished && self.idle_for >= finished_grace;
        let abandoned = self.connections == 0 && self.idle_for >= idle_timeout;
        finished || abandoned
    }
}

impl From<&RoomStatus> for RoomSummary {
    fn from(status: &RoomStatus) -> Self {
        Self {
            game_code: status.code.clone(),
            state: status.lifecycle,
            teams: status.teams,
            connections: status.connections,
            errored: status.errored,
        }
    }
}

/// One live game: roster, round lifecycle and attached connections.
pub struct GameRoom {
    code: GameCode,
    machine: GameStateMachine,
    teams: IndexMap<String, Team>,
    round_counter: u32,
    used_songs: UsedSongs,
    current_round: Option<Round>,
    bus: BroadcastBus,
    settings: Option<GameSettings>,
    errored: bool,
    last_activity: Instant,
    deps: RoomDeps,
}

impl GameRoom {
    /// Create an empty room in `Waiting`.
    pub fn new(code: GameCode, deps: RoomDeps) -> Self {
        Self {
            code,
            machine: GameStateMachine::new(),
            teams: IndexMap::new(),
            round_counter: 0,
            used_songs: UsedSongs::default(),
            current_round: None,
            bus: BroadcastBus::new(),
            settings: None,
            errored: false,
            last_activity: Instant::now(),
            deps,
        }
    }

    /// Room code.
    pub fn code(&self) -> &GameCode {
        &self.code
    }

    /// Current phase of the room state machine.
    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    /// Period of the liveness sweep.
    pub fn sweep_interval(&self) -> Duration {
        self.deps.config.heartbeat_sweep_interval
    }

    /// Register a socket. Team sockets must carry the team name from their handshake.
    ///
    /// On success the new connection receives a `connection_ack` with the full snapshot.
    pub async fn join(
        &mut self,
        role: Role,
        team_name: Option<String>,
        tx: OutboundSender,
    ) -> Result<ConnectionId, ServiceError> {
        self.last_activity = Instant::now();

        let identity = match role {
            Role::Team => {
                let raw = team_name.ok_or_else(|| {
                    ServiceError::InvalidInput("team connections must send team_join first".into())
                })?;
                let name = raw.trim().to_string();
                validate_team_name(&name).map_err(|err| {
                    ServiceError::InvalidInput(
                        err.message
                            .map(|message| message.to_string())
                            .unwrap_or_else(|| "invalid team name".into()),
                    )
                })?;
                self.admit_team(&name).await?;
                Some(name)
            }
            Role::Manager | Role::Display => None,
        };

        let handle = ConnectionHandle::new(role, identity.clone(), tx);
        let connection = self.bus.register(handle);
        info!(
            code = %self.code,
            connection = %connection,
            role = %role,
            team = identity.as_deref().unwrap_or("-"),
            "connection joined"
        );

        self.bus.send_to(
            &connection,
            ServerMessage::ConnectionAck {
                success: true,
                role,
                team_name: identity.clone(),
                teams_count: self.teams.len(),
                snapshot: self.snapshot(),
            },
        );

        if let Some(team_name) = identity {
            self.bus.broadcast(
                ServerMessage::TeamJoined {
                    team_name,
                    teams: self.team_summaries(),
                    total_teams: self.teams.len(),
                },
                None,
            );
        }

        Ok(connection)
    }

    /// Create, reactivate or take over a roster entry for `name`.
    async fn admit_team(&mut self, name: &str) -> Result<(), ServiceError> {
        if let Some(team) = self.teams.get(name) {
            if team.connected {
                for previous in self.bus.team_connections(name) {
                    self.bus.send_to(
                        &previous,
                        ServerMessage::Kicked {
                            reason: "another connection joined as this team".into(),
                        },
                    );
                    if let Some(handle) = self.bus.remove(&previous) {
                        handle.close();
                    }
                    info!(code = %self.code, team = %name, connection = %previous, "team connection taken over");
                }
            }
            if let Some(team) = self.teams.get_mut(name) {
                team.connected = true;
            }
            return Ok(());
        }

        if self.machine.phase() == GamePhase::Finished {
            return Err(ServiceError::InvalidState(
                "the game is finished; new teams cannot join".into(),
            ));
        }
        let settings = self.settings().await;
        if !settings.has_room_for(self.teams.len()) {
            return Err(ServiceError::InvalidState(format!(
                "the game is full ({} teams)",
                settings.max_teams
            )));
        }

        self.teams.insert(name.to_string(), Team::joined());
        Ok(())
    }

    /// Process one text frame from `connection`. Failures are reported to the sender only.
    pub async fn handle_inbound(&mut self, connection: ConnectionId, text: &str) {
        let now = Instant::now();
        let Some(handle) = self.bus.get_mut(&connection) else {
            debug!(code = %self.code, connection = %connection, "message from unknown connection ignored");
            return;
        };
        handle.touch(now);
        let role = handle.role;
        let identity = handle.identity.clone();
        self.last_activity = now;

        let result = match ClientMessage::from_json_str(text) {
            Ok(message) => self.dispatch(connection, role, identity, message).await,
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            warn!(
                code = %self.code,
                connection = %connection,
                role = %role,
                error = %err,
                "rejected client message"
            );
            self.bus.send_to(&connection, ServerMessage::error(&err));
        }
    }

    async fn dispatch(
        &mut self,
        connection: ConnectionId,
        role: Role,
        identity: Option<String>,
        message: ClientMessage,
    ) -> Result<(), ServiceError> {
        if message == ClientMessage::Unknown {
            return Err(ServiceError::InvalidInput("unknown message type".into()));
        }
        if !message.allowed_for(role) {
            return Err(ServiceError::Forbidden(format!(
                "`{}` is not allowed for {role} connections",
                message.kind()
            )));
        }

        match message {
            ClientMessage::TeamJoin(_) => Err(ServiceError::InvalidState(format!(
                "connection already joined as `{}`",
                identity.unwrap_or_default()
            ))),
            ClientMessage::TeamLeave {} => {
                self.drop_connection(connection, true, "team left");
                Ok(())
            }
            ClientMessage::Ping {} => {
                self.bus.send_to(&connection, ServerMessage::Pong {});
                Ok(())
            }
            ClientMessage::StartGame {} => self.start_game().await,
            ClientMessage::StartRound {} => self.start_round().await,
            ClientMessage::BuzzPressed {
                team_name,
                reaction_time_ms,
            } => {
                if identity.as_deref() != Some(team_name.trim()) {
                    return Err(ServiceError::Forbidden(format!(
                        "cannot buzz for `{team_name}` from this connection"
                    )));
                }
                self.buzz(team_name.trim(), reaction_time_ms)
            }
            ClientMessage::SubmitAnswer(payload) => self.submit_answer(
                identity.as_deref().unwrap_or_default(),
                payload.song_name,
                payload.artist_name,
            ),
            ClientMessage::EvaluateAnswer {
                song_correct,
                artist_correct,
                wrong_answer,
            } => self.evaluate(Verdict {
                song_correct,
                artist_correct,
                wrong_answer,
            }),
            ClientMessage::RestartSong {} => self.resume_song(true),
            ClientMessage::ContinueSong {} => self.resume_song(false),
            ClientMessage::SkipRound {} => self.finish_round(true),
            ClientMessage::FinishRound {} => self.finish_round(false),
            ClientMessage::RoundTimeout {} => self.timeout_round(),
            ClientMessage::EndGame {} => self.end_game(),
            ClientMessage::KickTeam { team_name } => self.kick(team_name.trim()),
            ClientMessage::Unknown => Err(ServiceError::InvalidInput("unknown message type".into())),
        }
    }

    /// `Waiting` → `Playing`, once enough teams are connected.
    pub async fn start_game(&mut self) -> Result<(), ServiceError> {
        if self.machine.phase() == GamePhase::Waiting {
            let connected = self.teams.values().filter(|team| team.connected).count();
            if connected < MIN_TEAMS_TO_START {
                return Err(ServiceError::InvalidState(format!(
                    "at least {MIN_TEAMS_TO_START} connected teams are required to start (got {connected})"
                )));
            }
            self.settings().await;
        }

        self.machine.transition(GameEvent::StartGame)?;
        info!(code = %self.code, teams = self.teams.len(), "game started");
        self.bus.broadcast(
            ServerMessage::GameStarted {
                teams: self.team_summaries(),
            },
            None,
        );
        Ok(())
    }

    /// Select an unused song and open the next round.
    pub async fn start_round(&mut self) -> Result<(), ServiceError> {
        let settings = self.settings().await;
        if self.machine.phase().lifecycle() == LifecycleState::Playing
            && self.round_counter >= settings.max_rounds
        {
            return Err(ServiceError::InvalidState(format!(
                "all {} rounds have been played",
                settings.max_rounds
            )));
        }

        let plan = self.machine.plan(GameEvent::StartRound)?;
        let selection = self
            .deps
            .selector
            .select(settings.genres.clone(), self.used_songs.to_sorted_vec());

        let songs = match timeout(self.deps.config.collaborator_timeout, selection).await {
            Ok(Ok(songs)) => songs,
            Ok(Err(err)) => {
                self.abort_plan(plan.id, "song selection failed");
                warn!(code = %self.code, error = %err, "song selector failed");
                return Err(ServiceError::Unavailable(err.to_string()));
            }
            Err(_) => {
                self.abort_plan(plan.id, "song selection timed out");
                warn!(code = %self.code, "song selector timed out");
                return Err(ServiceError::Timeout);
            }
        };

        let Some(song) = songs
            .into_iter()
            .find(|song| !self.used_songs.contains(song.id))
        else {
            self.abort_plan(plan.id, "no unused songs");
            return Err(ServiceError::Exhausted(
                "every song for the selected genres has already been played".into(),
            ));
        };

        self.machine.apply(plan.id)?;
        self.used_songs.record(song.id);
        self.round_counter += 1;
        let round = Round::new(self.round_counter, song);
        let announcement = ServerMessage::round_started(round.number, SongSnapshot::from(&round.song));
        info!(
            code = %self.code,
            round = round.number,
            song = round.song.id,
            "round started"
        );
        self.current_round = Some(round);
        self.bus.broadcast(announcement, None);
        Ok(())
    }

    fn abort_plan(&mut self, plan_id: PlanId, cause: &'static str) {
        if let Err(err) = self.machine.abort(plan_id) {
            warn!(code = %self.code, plan_id = %plan_id, cause, error = ?err, "failed to abort transition");
        }
    }

    /// Arbitrate a buzz. Only the first buzz of an open window has any effect.
    pub fn buzz(&mut self, team_name: &str, reaction_time_ms: Option<u64>) -> Result<(), ServiceError> {
        if self.machine.phase() != GamePhase::Playing(RoundPhase::SongPlaying) {
            debug!(code = %self.code, team = %team_name, "buzz ignored; buzzer not armed");
            return Ok(());
        }
        let Some(round) = self.current_round.as_mut() else {
            debug!(code = %self.code, team = %team_name, "buzz ignored; no round");
            return Ok(());
        };

        self.machine.transition(GameEvent::Buzz)?;
        let reaction_time_ms = round.lock_buzzer(team_name, reaction_time_ms);
        let round_number = round.number;
        info!(
            code = %self.code,
            round = round_number,
            window = round.window(),
            team = %team_name,
            reaction_time_ms,
            "buzzer locked"
        );
        self.bus.broadcast(
            ServerMessage::BuzzerLocked {
                round_number,
                team_name: team_name.to_string(),
                reaction_time_ms: Some(reaction_time_ms),
            },
            None,
        );
        self.machine.transition(GameEvent::BeginEvaluation)?;
        Ok(())
    }

    /// Forward the buzz winner's typed answer to the managers.
    pub fn submit_answer(
        &mut self,
        team_name: &str,
        song_name: Option<String>,
        artist_name: Option<String>,
    ) -> Result<(), ServiceError> {
        if !matches!(
            self.machine.phase(),
            GamePhase::Playing(RoundPhase::BuzzerLocked | RoundPhase::Evaluating)
        ) {
            return Err(ServiceError::InvalidState(
                "answers can only be submitted while holding the buzzer".into(),
            ));
        }
        let round = self
            .current_round
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidState("no round in progress".into()))?;
        if round.buzz_winner.as_deref() != Some(team_name) {
            return Err(ServiceError::Forbidden(format!(
                "`{team_name}` does not hold the buzzer"
            )));
        }

        let song_name = non_blank(song_name);
        let artist_name = non_blank(artist_name);
        if song_name.is_none() && artist_name.is_none() {
            return Err(ServiceError::InvalidInput("the answer is empty".into()));
        }

        info!(code = %self.code, round = round.number, team = %team_name, "answer submitted");
        self.bus.broadcast(
            ServerMessage::AnswerSubmitted {
                round_number: round.number,
                team_name: team_name.to_string(),
                song_name,
                artist_name,
            },
            Some(Role::Manager),
        );
        Ok(())
    }

    /// Apply the manager's verdict to the buzz winner.
    pub fn evaluate(&mut self, verdict: Verdict) -> Result<(), ServiceError> {
        if self.machine.phase() != GamePhase::Playing(RoundPhase::Evaluating) {
            return Err(ServiceError::InvalidState(
                "answers can only be evaluated after a buzz".into(),
            ));
        }
        let round = self
            .current_round
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidState("no round in progress".into()))?;

        let outcome = scoring::apply_verdict(&self.deps.config.scoring, round, &mut self.teams, verdict)?;
        if outcome.reopen_buzzer {
            self.machine.transition(GameEvent::WrongAnswer)?;
            round.open_window();
        }
        let round_number = round.number;

        info!(
            code = %self.code,
            round = round_number,
            team = %outcome.team_name,
            points_delta = outcome.points_delta,
            "answer evaluated"
        );
        self.bus.broadcast(
            ServerMessage::AnswerEvaluated {
                round_number,
                team_name: outcome.team_name,
                points_delta: outcome.points_delta,
                wrong_answer: verdict.wrong_answer,
                buzzer_open: outcome.reopen_buzzer,
                locked_components: outcome.locked,
                team_scores: scoring::team_scores(&self.teams),
            },
            None,
        );
        Ok(())
    }

    /// Return to `SongPlaying` with a fresh buzz window, keeping locks and song.
    pub fn resume_song(&mut self, restarted: bool) -> Result<(), ServiceError> {
        let event = if restarted {
            GameEvent::RestartSong
        } else {
            GameEvent::ContinueSong
        };
        self.machine.transition(event)?;
        let round_number = match self.current_round.as_mut() {
            Some(round) => {
                round.open_window();
                round.number
            }
            None => self.round_counter,
        };
        self.bus.broadcast(
            ServerMessage::RoundResumed {
                round_number,
                restarted,
            },
            None,
        );
        Ok(())
    }

    /// Close the current round and reveal the answer.
    pub fn finish_round(&mut self, skipped: bool) -> Result<(), ServiceError> {
        self.machine.transition(GameEvent::FinishRound)?;
        self.announce_completion(skipped);
        Ok(())
    }

    /// The buzz winner ran out of time: charge the timeout penalty when an
    /// answer was pending, then close the round.
    pub fn timeout_round(&mut self) -> Result<(), ServiceError> {
        let answering = matches!(
            self.machine.phase(),
            GamePhase::Playing(RoundPhase::BuzzerLocked | RoundPhase::Evaluating)
        );
        self.machine.transition(GameEvent::FinishRound)?;

        let Some(round) = self.current_round.as_ref() else {
            return Ok(());
        };
        let round_number = round.number;
        let charged = round.buzz_winner.clone().filter(|_| answering);
        let points_delta = charged.as_deref().map_or(0, |team_name| {
            scoring::apply_timeout_penalty(&self.deps.config.scoring, &mut self.teams, team_name)
        });

        info!(
            code = %self.code,
            round = round_number,
            team = charged.as_deref().unwrap_or("-"),
            points_delta,
            "round timed out"
        );
        self.bus.broadcast(
            ServerMessage::RoundTimeout {
                round_number,
                team_name: charged,
                points_delta,
                team_scores: scoring::team_scores(&self.teams),
            },
            None,
        );
        self.announce_completion(false);
        Ok(())
    }

    fn announce_completion(&self, skipped: bool) {
        let Some(round) = self.current_round.as_ref() else {
            return;
        };
        info!(code = %self.code, round = round.number, skipped, "round completed");
        self.bus.broadcast(
            ServerMessage::RoundCompleted {
                round_number: round.number,
                skipped,
                song_name: round.song.title.clone(),
                artist_or_content: round.song.artist.clone(),
            },
            None,
        );
    }

    /// Move to `Finished` and publish the final scores. Ending a finished game
    /// only republishes them.
    pub fn end_game(&mut self) -> Result<(), ServiceError> {
        self.machine.transition(GameEvent::EndGame)?;
        self.current_round = None;
        self.publish_final_results(self.errored);
        Ok(())
    }

    fn publish_final_results(&self, aborted: bool) {
        let winner = scoring::winner(&self.teams);
        info!(
            code = %self.code,
            rounds = self.round_counter,
            winner = winner.as_deref().unwrap_or("-"),
            aborted,
            "game ended"
        );
        self.bus.broadcast(
            ServerMessage::GameEnded {
                winner,
                final_scores: scoring::team_scores(&self.teams),
                rounds_played: self.round_counter,
                aborted,
            },
            None,
        );
    }

    /// Remove a team and every connection representing it.
    pub fn kick(&mut self, team_name: &str) -> Result<(), ServiceError> {
        if self.machine.phase() == GamePhase::Finished {
            return Err(ServiceError::InvalidState(
                "teams cannot be kicked once the game is finished".into(),
            ));
        }
        if self.teams.shift_remove(team_name).is_none() {
            return Err(ServiceError::NotFound(format!("team `{team_name}` not found")));
        }

        for connection in self.bus.team_connections(team_name) {
            self.bus.send_to(
                &connection,
                ServerMessage::Kicked {
                    reason: "removed by the game manager".into(),
                },
            );
            if let Some(handle) = self.bus.remove(&connection) {
                handle.close();
            }
        }
        info!(code = %self.code, team = %team_name, "team kicked");

        let held_buzzer = self
            .current_round
            .as_ref()
            .is_some_and(|round| round.buzz_winner.as_deref() == Some(team_name));
        let answering = matches!(
            self.machine.phase(),
            GamePhase::Playing(RoundPhase::BuzzerLocked | RoundPhase::Evaluating)
        );

        self.bus.broadcast(
            ServerMessage::TeamLeft {
                team_name: team_name.to_string(),
                teams: self.team_summaries(),
                total_teams: self.teams.len(),
            },
            None,
        );

        if held_buzzer && answering {
            self.resume_song(false)?;
        }
        Ok(())
    }

    /// Refresh the heartbeat of `connection`.
    pub fn heartbeat(&mut self, connection: ConnectionId, now: Instant) {
        if let Some(handle) = self.bus.get_mut(&connection) {
            handle.touch(now);
        }
    }

    /// The transport reported the socket closed.
    pub fn disconnect(&mut self, connection: ConnectionId) {
        self.drop_connection(connection, false, "socket closed");
    }

    /// Drop every connection silent for longer than the heartbeat timeout.
    pub fn sweep_stale(&mut self, now: Instant) -> usize {
        let stale = self
            .bus
            .stale(now, self.deps.config.heartbeat_timeout);
        for connection in &stale {
            self.drop_connection(*connection, true, "heartbeat timeout");
        }
        stale.len()
    }

    fn drop_connection(&mut self, connection: ConnectionId, close: bool, cause: &'static str) {
        let Some(handle) = self.bus.remove(&connection) else {
            return;
        };
        if close {
            handle.close();
        }
        info!(code = %self.code, connection = %connection, role = %handle.role, cause, "connection left");

        let Some(team_name) = handle.identity else {
            return;
        };
        if !self.bus.team_connections(&team_name).is_empty() {
            return;
        }
        let Some(team) = self.teams.get_mut(&team_name) else {
            return;
        };
        team.connected = false;

        self.bus.broadcast(
            ServerMessage::TeamLeft {
                team_name,
                teams: self.team_summaries(),
                total_teams: self.teams.len(),
            },
            None,
        );
    }

    /// Full picture of the room, as sent on join.
    pub fn snapshot(&self) -> RoomSnapshot {
        let phase = self.machine.phase();
        RoomSnapshot {
            game_code: self.code.clone(),
            state: phase.lifecycle(),
            round_state: phase.round_phase(),
            round_number: self.round_counter,
            teams: self.team_summaries(),
            current_round: self.current_round.as_ref().map(RoundSnapshot::from),
            used_song_count: self.used_songs.count(),
            errored: self.errored,
        }
    }

    /// Liveness summary.
    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            code: self.code.clone(),
            lifecycle: self.machine.phase().lifecycle(),
            teams: self.teams.len(),
            connections: self.bus.len(),
            errored: self.errored,
            idle_for: self.last_activity.elapsed(),
        }
    }

    /// Close every attached socket. Returns how many were closed.
    pub fn shutdown(&mut self) -> usize {
        let closed = self.bus.close_all();
        for team in self.teams.values_mut() {
            team.connected = false;
        }
        info!(code = %self.code, closed, "room shut down");
        closed
    }

    /// Stop gameplay after an internal fault; the room stays queryable until reaped.
    pub fn fail(&mut self, message: &str) {
        self.errored = true;
        self.machine.force_finish();
        self.current_round = None;
        self.bus.broadcast(
            ServerMessage::Error {
                message: format!("internal error, game aborted: {message}"),
            },
            None,
        );
        self.publish_final_results(true);
    }

    fn team_summaries(&self) -> Vec<TeamSummary> {
        self.teams.iter().map(TeamSummary::from).collect()
    }

    /// Lobby settings, fetched once. Failures fall back to configured defaults
    /// without caching so the next call retries.
    async fn settings(&mut self) -> GameSettings {
        if let Some(settings) = &self.settings {
            return settings.clone();
        }

        let lookup = self.deps.directory.settings(&self.code);
        match timeout(self.deps.config.collaborator_timeout, lookup).await {
            Ok(Ok(Some(settings))) => {
                info!(
                    code = %self.code,
                    max_teams = settings.max_teams,
                    max_rounds = settings.max_rounds,
                    genres = settings.genres.len(),
                    "loaded game settings"
                );
                self.settings = Some(settings.clone());
                return settings;
            }
            Ok(Ok(None)) => {
                warn!(code = %self.code, "lobby does not know this game; using defaults");
            }
            Ok(Err(err)) => {
                warn!(code = %self.code, error = %err, "failed to load game settings; using defaults");
            }
            Err(_) => {
                warn!(code = %self.code, "game settings lookup timed out; using defaults");
            }
        }
        self.deps.config.defaults.clone()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        services::{
            game_directory::{DirectoryError, StaticGameDirectory},
            song_selector::{CatalogSongSelector, SelectorError},
        },
        state::{connection::OutboundFrame, game::Song},
    };

    pub(crate) fn catalog(count: u64) -> Vec<Song> {
        (1..=count)
            .map(|id| Song {
                id,
                title: format!("Song {id}"),
                artist: format!("Artist {id}"),
                media_ref: format!("media{id:07}"),
                start_offset_secs: 5,
                is_soundtrack: false,
                genres: vec!["rock".into()],
            })
            .collect()
    }

    pub(crate) fn deps_with(
        selector: Arc<dyn SongSelector>,
        directory: Arc<dyn GameDirectory>,
        config: AppConfig,
    ) -> RoomDeps {
        RoomDeps {
            selector,
            directory,
            config: Arc::new(config),
        }
    }

    pub(crate) fn test_deps(songs: u64) -> RoomDeps {
        deps_with(
            Arc::new(CatalogSongSelector::new(catalog(songs))),
            Arc::new(StaticGameDirectory::default()),
            AppConfig::default(),
        )
    }

    fn room(songs: u64) -> GameRoom {
        GameRoom::new(GameCode::parse("ABC123").unwrap(), test_deps(songs))
    }

    struct Client {
        id: ConnectionId,
        rx: mpsc::UnboundedReceiver<OutboundFrame>,
    }

    impl Client {
        fn messages(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                if let OutboundFrame::Message(message) = frame {
                    out.push((*message).clone());
                }
            }
            out
        }

        fn closed(&mut self) -> bool {
            let mut closed = false;
            while let Ok(frame) = self.rx.try_recv() {
                closed |= matches!(frame, OutboundFrame::Close);
            }
            closed
        }
    }

    async fn connect(room: &mut GameRoom, role: Role, team: Option<&str>) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = room.join(role, team.map(Into::into), tx).await.unwrap();
        Client { id, rx }
    }

    async fn send(room: &mut GameRoom, client: &Client, json: &str) {
        room.handle_inbound(client.id, json).await;
    }

    fn errors(messages: &[ServerMessage]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|message| match message {
                ServerMessage::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Room `ABC123` playing its first round with `Red` and `Blue` connected.
    async fn playing_room() -> (GameRoom, Client, Client, Client) {
        let mut room = room(5);
        let mut red = connect(&mut room, Role::Team, Some("Red")).await;
        let mut blue = connect(&mut room, Role::Team, Some("Blue")).await;
        let mut manager = connect(&mut room, Role::Manager, None).await;
        send(&mut room, &manager, r#"{"type":"start_game"}"#).await;
        send(&mut room, &manager, r#"{"type":"start_round"}"#).await;
        red.messages();
        blue.messages();
        assert!(errors(&manager.messages()).is_empty());
        (room, red, blue, manager)
    }

    #[tokio::test]
    async fn join_sends_ack_with_snapshot() {
        let mut room = room(3);
        let mut red = connect(&mut room, Role::Team, Some("  Red ")).await;

        let messages = red.messages();
        match &messages[0] {
            ServerMessage::ConnectionAck {
                success,
                role,
                team_name,
                teams_count,
                snapshot,
            } => {
                assert!(*success);
                assert_eq!(*role, Role::Team);
                assert_eq!(team_name.as_deref(), Some("Red"));
                assert_eq!(*teams_count, 1);
                assert_eq!(snapshot.state, LifecycleState::Waiting);
            }
            other => panic!("unexpected first message {other:?}"),
        }
        assert!(matches!(messages[1], ServerMessage::TeamJoined { total_teams: 1, .. }));
    }

    #[tokio::test]
    async fn invalid_team_names_are_rejected() {
        let mut room = room(3);
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = room.join(Role::Team, Some("   ".into()), tx.clone()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        let err = room.join(Role::Team, None, tx).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(room.snapshot().teams.is_empty());
    }

    #[tokio::test]
    async fn start_game_requires_two_connected_teams() {
        let mut room = room(3);
        let _red = connect(&mut room, Role::Team, Some("Red")).await;
        let mut manager = connect(&mut room, Role::Manager, None).await;

        send(&mut room, &manager, r#"{"type":"start_game"}"#).await;
        assert_eq!(errors(&manager.messages()).len(), 1);
        assert_eq!(room.phase(), GamePhase::Waiting);

        let _blue = connect(&mut room, Role::Team, Some("Blue")).await;
        send(&mut room, &manager, r#"{"type":"start_game"}"#).await;
        let messages = manager.messages();
        assert!(errors(&messages).is_empty());
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::GameStarted { .. })));
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::AwaitingRound));
    }

    #[tokio::test]
    async fn first_buzz_wins_and_later_buzzes_are_silent() {
        let (mut room, mut red, mut blue, mut manager) = playing_room().await;

        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(&mut room, &blue, r#"{"type":"buzz_pressed","team_name":"Blue"}"#).await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;

        let locked: Vec<_> = manager
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::BuzzerLocked { team_name, .. } => Some(team_name),
                _ => None,
            })
            .collect();
        assert_eq!(locked, vec!["Red".to_string()]);
        assert!(errors(&blue.messages()).is_empty());
        assert!(errors(&red.messages()).is_empty());

        let snapshot = room.snapshot();
        assert_eq!(snapshot.round_state, Some(RoundPhase::Evaluating));
        assert_eq!(
            snapshot.current_round.unwrap().buzz_winner.as_deref(),
            Some("Red")
        );
    }

    #[tokio::test]
    async fn buzz_for_another_team_is_forbidden() {
        let (mut room, mut red, _blue, _manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Blue"}"#).await;
        assert_eq!(errors(&red.messages()).len(), 1);
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::SongPlaying));
    }

    #[tokio::test]
    async fn song_then_wrong_answer_nets_eight_and_rearms() {
        let (mut room, mut red, mut blue, mut manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(
            &mut room,
            &manager,
            r#"{"type":"evaluate_answer","song_correct":true,"artist_correct":false,"wrong_answer":false}"#,
        )
        .await;
        send(
            &mut room,
            &manager,
            r#"{"type":"evaluate_answer","song_correct":false,"artist_correct":false,"wrong_answer":true}"#,
        )
        .await;

        let evaluations: Vec<_> = manager
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::AnswerEvaluated {
                    points_delta,
                    buzzer_open,
                    team_scores,
                    ..
                } => Some((points_delta, buzzer_open, team_scores["Red"])),
                _ => None,
            })
            .collect();
        assert_eq!(evaluations, vec![(10, false, 10), (-2, true, 8)]);
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::SongPlaying));

        red.messages();
        send(&mut room, &blue, r#"{"type":"buzz_pressed","team_name":"Blue"}"#).await;
        assert!(
            red.messages()
                .iter()
                .any(|m| matches!(m, ServerMessage::BuzzerLocked { team_name, .. } if team_name == "Blue"))
        );
        let round = room.snapshot().current_round.unwrap();
        assert!(round.locked_components.song_name);
        assert_eq!(round.buzz_winner.as_deref(), Some("Blue"));
    }

    #[tokio::test]
    async fn evaluation_without_buzz_is_rejected() {
        let (mut room, _red, _blue, mut manager) = playing_room().await;
        send(
            &mut room,
            &manager,
            r#"{"type":"evaluate_answer","song_correct":true,"artist_correct":false,"wrong_answer":false}"#,
        )
        .await;
        let messages = manager.messages();
        assert_eq!(errors(&messages).len(), 1);
        assert!(!messages.iter().any(|m| matches!(m, ServerMessage::AnswerEvaluated { .. })));
        assert!(room.snapshot().teams.iter().all(|team| team.score == 0));
    }

    #[tokio::test]
    async fn reconnect_receives_authoritative_snapshot() {
        let (mut room, red, _blue, manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(
            &mut room,
            &manager,
            r#"{"type":"evaluate_answer","song_correct":false,"artist_correct":true,"wrong_answer":false}"#,
        )
        .await;

        room.disconnect(red.id);
        assert!(!room.snapshot().teams[0].connected);

        let mut red_again = connect(&mut room, Role::Team, Some("Red")).await;
        let Some(ServerMessage::ConnectionAck { snapshot, .. }) = red_again.messages().into_iter().next()
        else {
            panic!("expected connection_ack");
        };
        assert_eq!(snapshot, room.snapshot());
        assert_eq!(snapshot.teams[0].score, 5);
        assert!(snapshot.teams[0].connected);
        let round = snapshot.current_round.unwrap();
        assert!(round.locked_components.artist_or_content);
        assert!(!round.locked_components.song_name);
    }

    #[tokio::test]
    async fn duplicate_connected_name_takes_over() {
        let mut room = room(3);
        let mut first = connect(&mut room, Role::Team, Some("Red")).await;
        first.messages();
        let _second = connect(&mut room, Role::Team, Some("Red")).await;

        let messages = first.messages();
        assert!(messages.iter().any(|m| matches!(m, ServerMessage::Kicked { .. })));
        assert_eq!(room.snapshot().teams.len(), 1);
        assert_eq!(room.status().connections, 1);
    }

    #[tokio::test]
    async fn songs_are_never_repeated_and_exhaustion_is_reported() {
        let (mut room, _red, _blue, mut manager) = playing_room().await;
        let mut seen = vec![room.snapshot().current_round.unwrap().song.id];

        for _ in 0..4 {
            send(&mut room, &manager, r#"{"type":"skip_round"}"#).await;
            send(&mut room, &manager, r#"{"type":"start_round"}"#).await;
            seen.push(room.snapshot().current_round.unwrap().song.id);
        }
        assert!(errors(&manager.messages()).is_empty());
        let mut unique = seen.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 5);

        send(&mut room, &manager, r#"{"type":"finish_round"}"#).await;
        manager.messages();
        send(&mut room, &manager, r#"{"type":"start_round"}"#).await;
        let errs = errors(&manager.messages());
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("no songs left"));
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::Completed));
        assert_eq!(room.snapshot().round_number, 5);
    }

    #[tokio::test]
    async fn max_rounds_is_enforced() {
        let settings = GameSettings {
            max_rounds: 1,
            ..GameSettings::default()
        };
        let deps = deps_with(
            Arc::new(CatalogSongSelector::new(catalog(5))),
            Arc::new(StaticGameDirectory::new(settings)),
            AppConfig::default(),
        );
        let mut room = GameRoom::new(GameCode::parse("ABC123").unwrap(), deps);
        let _red = connect(&mut room, Role::Team, Some("Red")).await;
        let _blue = connect(&mut room, Role::Team, Some("Blue")).await;
        room.start_game().await.unwrap();
        room.start_round().await.unwrap();
        room.finish_round(false).unwrap();

        let err = room.start_round().await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    struct SlowSelector;

    impl SongSelector for SlowSelector {
        fn select(
            &self,
            _genres: Vec<String>,
            _exclude: Vec<u64>,
        ) -> BoxFuture<'static, Result<Vec<Song>, SelectorError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            })
        }
    }

    struct FailingDirectory {
        calls: Arc<AtomicUsize>,
    }

    impl GameDirectory for FailingDirectory {
        fn settings(
            &self,
            _code: &GameCode,
        ) -> BoxFuture<'static, Result<Option<GameSettings>, DirectoryError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(DirectoryError::Status(503)) })
        }
    }

    #[tokio::test]
    async fn selector_timeout_leaves_room_unchanged() {
        let config = AppConfig {
            collaborator_timeout: Duration::from_millis(20),
            ..AppConfig::default()
        };
        let deps = deps_with(
            Arc::new(SlowSelector),
            Arc::new(StaticGameDirectory::default()),
            config,
        );
        let mut room = GameRoom::new(GameCode::parse("ABC123").unwrap(), deps);
        let _red = connect(&mut room, Role::Team, Some("Red")).await;
        let _blue = connect(&mut room, Role::Team, Some("Blue")).await;
        room.start_game().await.unwrap();

        assert_eq!(room.start_round().await.unwrap_err(), ServiceError::Timeout);
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::AwaitingRound));
        assert_eq!(room.snapshot().round_number, 0);
        assert!(room.snapshot().current_round.is_none());
    }

    #[tokio::test]
    async fn settings_failures_fall_back_without_caching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let deps = deps_with(
            Arc::new(CatalogSongSelector::new(catalog(3))),
            Arc::new(FailingDirectory {
                calls: calls.clone(),
            }),
            AppConfig::default(),
        );
        let mut room = GameRoom::new(GameCode::parse("ABC123").unwrap(), deps);
        let _red = connect(&mut room, Role::Team, Some("Red")).await;
        let _blue = connect(&mut room, Role::Team, Some("Blue")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        room.start_game().await.unwrap();
        room.start_round().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn heartbeat_sweep_marks_teams_disconnected() {
        let mut room = room(3);
        let mut red = connect(&mut room, Role::Team, Some("Red")).await;
        let blue = connect(&mut room, Role::Team, Some("Blue")).await;
        let later = Instant::now() + Duration::from_secs(61);
        room.heartbeat(blue.id, later);

        assert_eq!(room.sweep_stale(later), 1);
        assert!(red.closed());
        let snapshot = room.snapshot();
        assert_eq!(snapshot.teams.len(), 2);
        assert!(!snapshot.teams[0].connected);
        assert!(snapshot.teams[1].connected);
    }

    #[tokio::test]
    async fn kicking_the_buzz_winner_reopens_the_buzzer() {
        let (mut room, mut red, _blue, mut manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(&mut room, &manager, r#"{"type":"kick_team","team_name":"Red"}"#).await;

        assert!(red.messages().iter().any(|m| matches!(m, ServerMessage::Kicked { .. })));
        assert!(errors(&manager.messages()).is_empty());
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::SongPlaying));
        assert_eq!(room.snapshot().teams.len(), 1);

        send(&mut room, &manager, r#"{"type":"kick_team","team_name":"Red"}"#).await;
        assert_eq!(errors(&manager.messages()).len(), 1);
    }

    #[tokio::test]
    async fn roles_cannot_cross_permissions() {
        let (mut room, mut red, _blue, _manager) = playing_room().await;
        let mut display = connect(&mut room, Role::Display, None).await;
        display.messages();

        send(&mut room, &red, r#"{"type":"end_game"}"#).await;
        send(&mut room, &display, r#"{"type":"skip_round"}"#).await;
        send(&mut room, &display, r#"{"type":"nonsense"}"#).await;
        send(&mut room, &display, "{not json").await;
        send(&mut room, &display, r#"{"type":"ping"}"#).await;

        assert_eq!(errors(&red.messages()).len(), 1);
        let messages = display.messages();
        assert_eq!(errors(&messages).len(), 3);
        assert_eq!(messages.last(), Some(&ServerMessage::Pong {}));
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::SongPlaying));
    }

    #[tokio::test]
    async fn end_game_reports_winner_and_blocks_new_teams() {
        let (mut room, red, _blue, mut manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(
            &mut room,
            &manager,
            r#"{"type":"evaluate_answer","song_correct":true,"artist_correct":true,"wrong_answer":false}"#,
        )
        .await;
        send(&mut room, &manager, r#"{"type":"end_game"}"#).await;

        let ended = manager.messages().into_iter().find_map(|m| match m {
            ServerMessage::GameEnded {
                winner,
                final_scores,
                rounds_played,
                aborted,
            } => Some((winner, final_scores["Red"], rounds_played, aborted)),
            _ => None,
        });
        assert_eq!(ended, Some((Some("Red".into()), 15, 1, false)));

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(room.join(Role::Team, Some("Green".into()), tx.clone()).await.is_err());
        assert!(room.join(Role::Team, Some("Red".into()), tx).await.is_ok());

        send(&mut room, &manager, r#"{"type":"end_game"}"#).await;
        let messages = manager.messages();
        assert!(errors(&messages).is_empty());
        assert!(messages.iter().any(|m| matches!(
            m,
            ServerMessage::GameEnded { winner: Some(winner), aborted: false, .. } if winner == "Red"
        )));
        assert_eq!(room.phase(), GamePhase::Finished);
    }

    #[tokio::test]
    async fn submitted_answer_reaches_managers_only() {
        let (mut room, mut red, mut blue, mut manager) = playing_room().await;
        let mut display = connect(&mut room, Role::Display, None).await;
        display.messages();

        send(&mut room, &red, r#"{"type":"submit_answer","song_name":"Song 1"}"#).await;
        assert_eq!(errors(&red.messages()).len(), 1);

        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(&mut room, &blue, r#"{"type":"submit_answer","song_name":"Song 1"}"#).await;
        send(&mut room, &red, r#"{"type":"submit_answer","song_name":"  "}"#).await;
        send(
            &mut room,
            &red,
            r#"{"type":"submit_answer","song_name":" Song 1 ","artist_name":"Artist 1"}"#,
        )
        .await;

        assert_eq!(errors(&blue.messages()).len(), 1);
        let red_messages = red.messages();
        assert_eq!(errors(&red_messages).len(), 1);
        assert!(!red_messages.iter().any(|m| matches!(m, ServerMessage::AnswerSubmitted { .. })));
        assert!(!display.messages().iter().any(|m| matches!(m, ServerMessage::AnswerSubmitted { .. })));

        let submitted: Vec<_> = manager
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::AnswerSubmitted {
                    team_name,
                    song_name,
                    artist_name,
                    ..
                } => Some((team_name, song_name, artist_name)),
                _ => None,
            })
            .collect();
        assert_eq!(
            submitted,
            vec![(
                "Red".to_string(),
                Some("Song 1".to_string()),
                Some("Artist 1".to_string())
            )]
        );
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::Evaluating));
    }

    #[tokio::test]
    async fn timeout_charges_the_pending_answer_and_closes_the_round() {
        let (mut room, red, _blue, mut manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        manager.messages();
        send(&mut room, &manager, r#"{"type":"round_timeout"}"#).await;

        let messages = manager.messages();
        assert!(errors(&messages).is_empty());
        let timeout_at = messages
            .iter()
            .position(|m| matches!(m, ServerMessage::RoundTimeout { .. }))
            .unwrap();
        match &messages[timeout_at] {
            ServerMessage::RoundTimeout {
                team_name,
                points_delta,
                team_scores,
                ..
            } => {
                assert_eq!(team_name.as_deref(), Some("Red"));
                assert_eq!(*points_delta, -2);
                assert_eq!(team_scores["Red"], -2);
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert!(matches!(
            messages[timeout_at + 1],
            ServerMessage::RoundCompleted { skipped: false, .. }
        ));
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::Completed));

        send(&mut room, &manager, r#"{"type":"round_timeout"}"#).await;
        assert_eq!(errors(&manager.messages()).len(), 1);
    }

    #[tokio::test]
    async fn timeout_without_pending_answer_is_free() {
        let (mut room, red, _blue, manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(
            &mut room,
            &manager,
            r#"{"type":"evaluate_answer","song_correct":false,"artist_correct":false,"wrong_answer":true}"#,
        )
        .await;
        room.timeout_round().unwrap();

        let scores: Vec<_> = room.snapshot().teams.iter().map(|team| team.score).collect();
        assert_eq!(scores, vec![-2, 0]);
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::Completed));
    }

    #[tokio::test]
    async fn fail_aborts_the_game() {
        let (mut room, mut red, _blue, _manager) = playing_room().await;
        room.fail("boom");

        let messages = red.messages();
        assert!(matches!(messages[0], ServerMessage::Error { .. }));
        assert!(matches!(
            messages[1],
            ServerMessage::GameEnded { aborted: true, .. }
        ));
        let snapshot = room.snapshot();
        assert!(snapshot.errored);
        assert_eq!(snapshot.state, LifecycleState::Finished);

        room.end_game().unwrap();
        assert!(red.messages().iter().any(|m| matches!(m, ServerMessage::GameEnded { aborted: true, .. })));
    }

    #[tokio::test]
    async fn restart_and_continue_reopen_the_buzzer() {
        let (mut room, red, _blue, mut manager) = playing_room().await;
        send(&mut room, &red, r#"{"type":"buzz_pressed","team_name":"Red"}"#).await;
        send(&mut room, &manager, r#"{"type":"continue_song"}"#).await;
        send(&mut room, &manager, r#"{"type":"finish_round"}"#).await;
        send(&mut room, &manager, r#"{"type":"continue_song"}"#).await;
        send(&mut room, &manager, r#"{"type":"restart_song"}"#).await;

        let messages = manager.messages();
        assert_eq!(errors(&messages).len(), 1);
        let resumed: Vec<_> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::RoundResumed { restarted, .. } => Some(*restarted),
                _ => None,
            })
            .collect();
        assert_eq!(resumed, vec![false, true]);
        assert_eq!(room.phase(), GamePhase::Playing(RoundPhase::SongPlaying));
    }

    #[test]
    fn status_expiry_rules() {
        let status = RoomStatus {
            code: GameCode::parse("ABC123").unwrap(),
            lifecycle: LifecycleState::Finished,
            teams: 2,
            connections: 2,
            errored: false,
            idle_for: Duration::from_secs(301),
        };
        assert!(status.is_expired(Duration::from_secs(300), Duration::from_secs(1_800)));

        let playing = RoomStatus {
            lifecycle: LifecycleState::Playing,
            ..status.clone()
        };
        assert!(!playing.is_expired(Duration::from_secs(300), Duration::from_secs(1_800)));

        let abandoned = RoomStatus {
            connections: 0,
            idle_for: Duration::from_secs(1_801),
            ..playing
        };
        assert!(abandoned.is_expired(Duration::from_secs(300), Duration::from_secs(1_800)));
    }
}
