use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::{
        game::{GameCode, LockedComponents, Round, Song, SongId, Team},
        state_machine::{LifecycleState, RoundPhase},
    },
};

/// Public projection of a roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeamSummary {
    /// Team name.
    pub name: String,
    /// Running total.
    pub score: i32,
    /// Whether a live socket represents the team.
    pub connected: bool,
}

impl From<(&String, &Team)> for TeamSummary {
    fn from((name, team): (&String, &Team)) -> Self {
        Self {
            name: name.clone(),
            score: team.score,
            connected: team.connected,
        }
    }
}

/// Song reference sent to clients. The answer text travels in-band; only the
/// manager UI chooses to display it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SongSnapshot {
    /// Catalogue id.
    pub id: SongId,
    /// Song title.
    pub song_name: String,
    /// Artist, or film/show for soundtracks.
    pub artist_or_content: String,
    /// Playback reference.
    pub media_ref: String,
    /// Clip start, in seconds.
    pub start_offset_secs: u32,
    /// Whether `artist_or_content` names a film or show.
    pub is_soundtrack: bool,
}

impl From<&Song> for SongSnapshot {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            song_name: song.title.clone(),
            artist_or_content: song.artist.clone(),
            media_ref: song.media_ref.clone(),
            start_offset_secs: song.start_offset_secs,
            is_soundtrack: song.is_soundtrack,
        }
    }
}

/// Snapshot of the round attached to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoundSnapshot {
    /// 1-based round number.
    pub round_number: u32,
    /// Song being guessed.
    pub song: SongSnapshot,
    /// Winner of the latest buzz window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buzz_winner: Option<String>,
    /// Components found so far.
    pub locked_components: LockedComponents,
    /// RFC 3339 start time, diagnostics only.
    pub started_at: String,
}

impl From<&Round> for RoundSnapshot {
    fn from(round: &Round) -> Self {
        Self {
            round_number: round.number,
            song: SongSnapshot::from(&round.song),
            buzz_winner: round.buzz_winner.clone(),
            locked_components: round.locked,
            started_at: format_system_time(round.started_at),
        }
    }
}

/// Complete picture of a room, sent on every join and served over REST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoomSnapshot {
    /// Room code.
    #[schema(value_type = String)]
    pub game_code: GameCode,
    /// Coarse lifecycle.
    pub state: LifecycleState,
    /// Round phase while playing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_state: Option<RoundPhase>,
    /// Number of rounds started so far.
    pub round_number: u32,
    /// Roster in join order.
    pub teams: Vec<TeamSummary>,
    /// Round in progress, or the last completed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_round: Option<RoundSnapshot>,
    /// Songs played so far.
    pub used_song_count: usize,
    /// Set when the room stopped after an internal fault.
    pub errored: bool,
}

/// Row of the `/games` listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Room code.
    #[schema(value_type = String)]
    pub game_code: GameCode,
    /// Coarse lifecycle.
    pub state: LifecycleState,
    /// Roster size.
    pub teams: usize,
    /// Attached sockets.
    pub connections: usize,
    /// Whether the room stopped after an internal fault.
    pub errored: bool,
}
