use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    dto::room::{RoomSnapshot, SongSnapshot, TeamSummary},
    error::ServiceError,
    state::game::{LockedComponents, Role},
};

/// Payload of the team handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct TeamJoinPayload {
    /// Requested team name, trimmed by the room.
    #[validate(length(min = 1, max = 50))]
    pub team_name: String,
}

/// Typed answer of the buzz winner.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct SubmitAnswerPayload {
    /// Guessed song title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub song_name: Option<String>,
    /// Guessed artist, or film/show for soundtracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub artist_name: Option<String>,
}

/// Messages accepted from room clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Team handshake; only valid as the first frame of a team socket.
    TeamJoin(TeamJoinPayload),
    /// The team leaves and its socket is closed.
    TeamLeave {},
    /// Application-level keepalive, answered with `pong`.
    Ping {},
    /// Leave the waiting room.
    StartGame {},
    /// Select a song and open the next round.
    StartRound {},
    /// A team hits its buzzer.
    BuzzPressed {
        /// Must match the connection's team.
        team_name: String,
        /// Reaction time measured by the client.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reaction_time_ms: Option<u64>,
    },
    /// The buzz winner types its answer for the manager.
    SubmitAnswer(SubmitAnswerPayload),
    /// The manager's verdict on the buzz winner's answer.
    EvaluateAnswer {
        /// Title found.
        song_correct: bool,
        /// Artist or film/show found.
        artist_correct: bool,
        /// Penalise and re-arm the buzzer.
        wrong_answer: bool,
    },
    /// Replay the clip from its start offset.
    RestartSong {},
    /// Resume playback where it stopped.
    ContinueSong {},
    /// Close the round without an answer.
    SkipRound {},
    /// Close the round.
    FinishRound {},
    /// The buzz winner ran out of time; penalise and close the round.
    RoundTimeout {},
    /// Finish the game and publish the results.
    EndGame {},
    /// Remove a team from the game.
    KickTeam {
        /// Team to remove.
        team_name: String,
    },
    /// Any unrecognised `type`.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, ServiceError> {
        let message: Self = serde_json::from_str(text)
            .map_err(|err| ServiceError::InvalidInput(format!("malformed message: {err}")))?;
        match &message {
            ClientMessage::TeamJoin(payload) => payload.validate()?,
            ClientMessage::SubmitAnswer(payload) => payload.validate()?,
            _ => {}
        }
        Ok(message)
    }

    /// Wire name of the message, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::TeamJoin(_) => "team_join",
            ClientMessage::TeamLeave {} => "team_leave",
            ClientMessage::Ping {} => "ping",
            ClientMessage::StartGame {} => "start_game",
            ClientMessage::StartRound {} => "start_round",
            ClientMessage::BuzzPressed { .. } => "buzz_pressed",
            ClientMessage::SubmitAnswer(_) => "submit_answer",
            ClientMessage::EvaluateAnswer { .. } => "evaluate_answer",
            ClientMessage::RestartSong {} => "restart_song",
            ClientMessage::ContinueSong {} => "continue_song",
            ClientMessage::SkipRound {} => "skip_round",
            ClientMessage::FinishRound {} => "finish_round",
            ClientMessage::RoundTimeout {} => "round_timeout",
            ClientMessage::EndGame {} => "end_game",
            ClientMessage::KickTeam { .. } => "kick_team",
            ClientMessage::Unknown => "unknown",
        }
    }

    /// Whether a connection with `role` may send this message.
    pub fn allowed_for(&self, role: Role) -> bool {
        match self {
            ClientMessage::Ping {} => true,
            ClientMessage::TeamJoin(_)
            | ClientMessage::TeamLeave {}
            | ClientMessage::BuzzPressed { .. }
            | ClientMessage::SubmitAnswer(_) => role == Role::Team,
            ClientMessage::StartGame {}
            | ClientMessage::StartRound {}
            | ClientMessage::EvaluateAnswer { .. }
            | ClientMessage::RestartSong {}
            | ClientMessage::ContinueSong {}
            | ClientMessage::SkipRound {}
            | ClientMessage::FinishRound {}
            | ClientMessage::RoundTimeout {}
            | ClientMessage::EndGame {}
            | ClientMessage::KickTeam { .. } => role == Role::Manager,
            ClientMessage::Unknown => false,
        }
    }
}

/// Messages pushed by a room to its connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame after a successful join.
    ConnectionAck {
        /// Always `true`; refused joins get `error` instead.
        success: bool,
        /// Role the socket joined with.
        role: Role,
        /// Team represented by the socket.
        #[serde(skip_serializing_if = "Option::is_none")]
        team_name: Option<String>,
        /// Roster size.
        teams_count: usize,
        /// Full room state.
        snapshot: RoomSnapshot,
    },
    /// Reply to `ping`.
    Pong {},
    /// A team joined or reconnected.
    TeamJoined {
        /// Team that joined.
        team_name: String,
        /// Roster after the join.
        teams: Vec<TeamSummary>,
        /// Roster size.
        total_teams: usize,
    },
    /// A team disconnected or was kicked.
    TeamLeft {
        /// Team that left.
        team_name: String,
        /// Roster after the departure.
        teams: Vec<TeamSummary>,
        /// Roster size.
        total_teams: usize,
    },
    /// The game left the waiting room.
    GameStarted {
        /// Roster at start.
        teams: Vec<TeamSummary>,
    },
    /// A new round is playing.
    RoundStarted {
        /// 1-based round number.
        round_number: u32,
        /// Catalogue id of the song.
        song_id: u64,
        /// Answer: the song title.
        song_name: String,
        /// Answer: the artist or film/show.
        artist_or_content: String,
        /// Playback reference.
        media_ref: String,
        /// Clip start, in seconds.
        start_offset_secs: u32,
        /// Whether `artist_or_content` names a film or show.
        is_soundtrack: bool,
    },
    /// A team won the buzz window.
    BuzzerLocked {
        /// Current round.
        round_number: u32,
        /// Buzz winner.
        team_name: String,
        /// Reported or measured reaction time.
        #[serde(skip_serializing_if = "Option::is_none")]
        reaction_time_ms: Option<u64>,
    },
    /// The buzz winner's typed answer, sent to managers only.
    AnswerSubmitted {
        /// Current round.
        round_number: u32,
        /// Buzz winner.
        team_name: String,
        /// Guessed song title.
        #[serde(skip_serializing_if = "Option::is_none")]
        song_name: Option<String>,
        /// Guessed artist or film/show.
        #[serde(skip_serializing_if = "Option::is_none")]
        artist_name: Option<String>,
    },
    /// Scores after a verdict.
    AnswerEvaluated {
        /// Current round.
        round_number: u32,
        /// Team the verdict applied to.
        team_name: String,
        /// Net score change.
        points_delta: i32,
        /// Whether the answer was judged wrong.
        wrong_answer: bool,
        /// Whether buzzers are armed again.
        buzzer_open: bool,
        /// Lock flags after the verdict.
        locked_components: LockedComponents,
        /// Totals, in roster order.
        team_scores: IndexMap<String, i32>,
    },
    /// The song plays again with a fresh buzz window.
    RoundResumed {
        /// Current round.
        round_number: u32,
        /// Replayed from the start offset rather than continued.
        restarted: bool,
    },
    /// The buzz winner ran out of time.
    RoundTimeout {
        /// Current round.
        round_number: u32,
        /// Team charged with the penalty, if a buzz was pending.
        #[serde(skip_serializing_if = "Option::is_none")]
        team_name: Option<String>,
        /// Score change of that team.
        points_delta: i32,
        /// Totals, in roster order.
        team_scores: IndexMap<String, i32>,
    },
    /// The round is closed and the answer revealed.
    RoundCompleted {
        /// Closed round.
        round_number: u32,
        /// Closed without an answer.
        skipped: bool,
        /// Song title.
        song_name: String,
        /// Artist or film/show.
        artist_or_content: String,
    },
    /// Final results.
    GameEnded {
        /// Strict leader; absent on ties.
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<String>,
        /// Totals, in roster order.
        final_scores: IndexMap<String, i32>,
        /// Rounds started during the game.
        rounds_played: u32,
        /// The game stopped after an internal fault.
        aborted: bool,
    },
    /// The socket is being closed by the room.
    Kicked {
        /// Human-readable cause.
        reason: String,
    },
    /// A message from this socket was refused.
    Error {
        /// Human-readable cause.
        message: String,
    },
}

impl ServerMessage {
    /// Build the round start broadcast from the selected song.
    pub fn round_started(round_number: u32, song: SongSnapshot) -> Self {
        ServerMessage::RoundStarted {
            round_number,
            song_id: song.id,
            song_name: song.song_name,
            artist_or_content: song.artist_or_content,
            media_ref: song.media_ref,
            start_offset_secs: song.start_offset_secs,
            is_soundtrack: song.is_soundtrack,
        }
    }

    /// Error frame carrying a service error.
    pub fn error(err: &ServiceError) -> Self {
        ServerMessage::Error {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_tagged_messages() {
        let message = ClientMessage::from_json_str(
            r#"{"type": "buzz_pressed", "team_name": "Red", "reaction_time_ms": 812}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::BuzzPressed {
                team_name: "Red".into(),
                reaction_time_ms: Some(812),
            }
        );

        let message = ClientMessage::from_json_str(r#"{"type": "ping"}"#).unwrap();
        assert_eq!(message, ClientMessage::Ping {});
    }

    #[test]
    fn empty_messages_ignore_extra_fields() {
        let message =
            ClientMessage::from_json_str(r#"{"type": "start_round", "timestamp": 1}"#).unwrap();
        assert_eq!(message, ClientMessage::StartRound {});
    }

    #[test]
    fn unknown_type_is_parsed_as_unknown() {
        let message = ClientMessage::from_json_str(r#"{"type": "dance"}"#).unwrap();
        assert_eq!(message, ClientMessage::Unknown);
        assert!(!message.allowed_for(Role::Manager));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let err = ClientMessage::from_json_str(
            r#"{"type": "evaluate_answer", "song_correct": true}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        assert!(ClientMessage::from_json_str("not json").is_err());
        assert!(ClientMessage::from_json_str(r#"{"type": "team_join"}"#).is_err());
    }

    #[test]
    fn team_join_is_validated() {
        assert!(ClientMessage::from_json_str(r#"{"type": "team_join", "team_name": ""}"#).is_err());
        let message =
            ClientMessage::from_json_str(r#"{"type": "team_join", "team_name": "Red"}"#).unwrap();
        assert_eq!(message.kind(), "team_join");
    }

    #[test]
    fn submit_answer_fields_are_optional_and_bounded() {
        let message = ClientMessage::from_json_str(
            r#"{"type": "submit_answer", "song_name": "Billie Jean"}"#,
        )
        .unwrap();
        assert_eq!(
            message,
            ClientMessage::SubmitAnswer(SubmitAnswerPayload {
                song_name: Some("Billie Jean".into()),
                artist_name: None,
            })
        );
        assert!(message.allowed_for(Role::Team));
        assert!(!message.allowed_for(Role::Manager));

        let long = format!(r#"{{"type": "submit_answer", "artist_name": "{}"}}"#, "x".repeat(201));
        assert!(ClientMessage::from_json_str(&long).is_err());

        let timeout = ClientMessage::from_json_str(r#"{"type": "round_timeout"}"#).unwrap();
        assert!(timeout.allowed_for(Role::Manager));
        assert!(!timeout.allowed_for(Role::Team));
    }

    #[test]
    fn permissions_are_disjoint() {
        let buzz = ClientMessage::BuzzPressed {
            team_name: "Red".into(),
            reaction_time_ms: None,
        };
        assert!(buzz.allowed_for(Role::Team));
        assert!(!buzz.allowed_for(Role::Manager));
        assert!(!buzz.allowed_for(Role::Display));

        let start = ClientMessage::StartRound {};
        assert!(start.allowed_for(Role::Manager));
        assert!(!start.allowed_for(Role::Team));
        assert!(!start.allowed_for(Role::Display));

        assert!(ClientMessage::Ping {}.allowed_for(Role::Display));
    }

    #[test]
    fn server_messages_are_flat_and_tagged() {
        let value = serde_json::to_value(ServerMessage::BuzzerLocked {
            round_number: 2,
            team_name: "Red".into(),
            reaction_time_ms: None,
        })
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "buzzer_locked", "round_number": 2, "team_name": "Red"})
        );

        let value = serde_json::to_value(ServerMessage::Pong {}).unwrap();
        assert_eq!(value, serde_json::json!({"type": "pong"}));
    }
}
