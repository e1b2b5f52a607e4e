use std::{
    fmt,
    time::{Instant, SystemTime},
};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dto::validation::validate_game_code, error::ServiceError};

/// Default clip start offset (seconds) when the catalogue does not provide one.
pub const DEFAULT_START_OFFSET_SECS: u32 = 5;

/// Identifier of a song in the external catalogue.
pub type SongId = u64;

/// Normalised game code: six ASCII alphanumerics, upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GameCode(String);

impl GameCode {
    /// Number of characters in every game code.
    pub const LENGTH: usize = 6;

    /// Trim, upper-case and validate a raw code.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let normalized = raw.trim().to_ascii_uppercase();
        validate_game_code(&normalized).map_err(|err| {
            ServiceError::InvalidInput(
                err.message
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| format!("invalid game code `{raw}`")),
            )
        })?;
        Ok(Self(normalized))
    }

    /// Borrow the normalised code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role a client connection plays in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A competing team with a buzzer.
    Team,
    /// The game master adjudicating answers.
    Manager,
    /// A read-only scoreboard mirror.
    Display,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Team => "team",
            Role::Manager => "manager",
            Role::Display => "display",
        };
        f.write_str(label)
    }
}

/// Song metadata, opaque to the room beyond these fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Song {
    /// Catalogue identifier.
    pub id: SongId,
    /// Title, the "song name" component.
    pub title: String,
    /// Artist, or the film/show for soundtrack variants.
    pub artist: String,
    /// Playback reference (YouTube id or URL).
    #[serde(alias = "youtube_id")]
    pub media_ref: String,
    /// Second at which the clip starts.
    #[serde(default = "default_start_offset")]
    pub start_offset_secs: u32,
    /// Whether the "artist" component names a film or show.
    #[serde(default)]
    pub is_soundtrack: bool,
    /// Genre slugs, used only by the in-memory catalogue.
    #[serde(default)]
    pub genres: Vec<String>,
}

fn default_start_offset() -> u32 {
    DEFAULT_START_OFFSET_SECS
}

/// Roster entry for a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Running total.
    pub score: i32,
    /// Whether a live connection currently represents the team.
    pub connected: bool,
}

impl Team {
    /// A freshly joined team.
    pub fn joined() -> Self {
        Self {
            score: 0,
            connected: true,
        }
    }
}

/// Per-round correctness flags; each flips at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct LockedComponents {
    /// The song title was found.
    pub song_name: bool,
    /// The artist (or film/show) was found.
    pub artist_or_content: bool,
}

impl LockedComponents {
    /// Both components have been found.
    pub fn all_locked(&self) -> bool {
        self.song_name && self.artist_or_content
    }
}

/// One accepted buzz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuzzRecord {
    /// Team that won the window.
    pub team_name: String,
    /// Buzz window the press was accepted in (1-based).
    pub window: u32,
    /// Reported reaction time.
    pub reaction_time_ms: u64,
}

/// State of the round currently attached to a room.
#[derive(Debug, Clone)]
pub struct Round {
    /// Matches the room's round counter at creation.
    pub number: u32,
    /// Song being guessed.
    pub song: Song,
    /// Winner of the latest buzz window, kept once set.
    pub buzz_winner: Option<String>,
    /// Components already awarded this round.
    pub locked: LockedComponents,
    /// Wall-clock start, for diagnostics.
    pub started_at: SystemTime,
    /// Every accepted buzz, oldest first.
    pub buzz_history: Vec<BuzzRecord>,
    window: u32,
    window_opened_at: Instant,
}

impl Round {
    /// Start a round with its first buzz window open.
    pub fn new(number: u32, song: Song) -> Self {
        Self {
            number,
            song,
            buzz_winner: None,
            locked: LockedComponents::default(),
            started_at: SystemTime::now(),
            buzz_history: Vec::new(),
            window: 1,
            window_opened_at: Instant::now(),
        }
    }

    /// Open a fresh buzz window after the song resumes.
    pub fn open_window(&mut self) {
        self.window += 1;
        self.window_opened_at = Instant::now();
    }

    /// Record the winner of the current window and return the reaction time used.
    pub fn lock_buzzer(&mut self, team_name: &str, reported_ms: Option<u64>) -> u64 {
        let reaction_time_ms = reported_ms.unwrap_or_else(|| {
            u64::try_from(self.window_opened_at.elapsed().as_millis()).unwrap_or(u64::MAX)
        });
        self.buzz_winner = Some(team_name.to_string());
        self.buzz_history.push(BuzzRecord {
            team_name: team_name.to_string(),
            window: self.window,
            reaction_time_ms,
        });
        reaction_time_ms
    }

    /// Current buzz window number (1-based).
    pub fn window(&self) -> u32 {
        self.window
    }
}

/// Lobby-provided configuration for a game.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Maximum number of teams, 0 meaning unlimited.
    pub max_teams: usize,
    /// Number of rounds after which `start_round` is refused.
    pub max_rounds: u32,
    /// Genre slugs passed to the song selector; empty means every genre.
    pub genres: Vec<String>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_teams: 8,
            max_rounds: 10,
            genres: Vec::new(),
        }
    }
}

impl GameSettings {
    /// Whether one more team fits given the current roster size.
    pub fn has_room_for(&self, current_teams: usize) -> bool {
        self.max_teams == 0 || current_teams < self.max_teams
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song() -> Song {
        Song {
            id: 1,
            title: "Song".into(),
            artist: "Artist".into(),
            media_ref: "dQw4w9WgXcQ".into(),
            start_offset_secs: DEFAULT_START_OFFSET_SECS,
            is_soundtrack: false,
            genres: vec![],
        }
    }

    #[test]
    fn game_code_is_case_insensitive() {
        let lower = GameCode::parse(" abc123 ").unwrap();
        let upper = GameCode::parse("ABC123").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_str(), "ABC123");
    }

    #[test]
    fn game_code_rejects_bad_shapes() {
        assert!(GameCode::parse("ABC12").is_err());
        assert!(GameCode::parse("ABC1234").is_err());
        assert!(GameCode::parse("ABC-12").is_err());
        assert!(GameCode::parse("").is_err());
    }

    #[test]
    fn song_accepts_catalogue_shape() {
        let song: Song = serde_json::from_str(
            r#"{"id": 7, "title": "T", "artist": "A", "youtube_id": "abcdefghijk"}"#,
        )
        .unwrap();
        assert_eq!(song.media_ref, "abcdefghijk");
        assert_eq!(song.start_offset_secs, DEFAULT_START_OFFSET_SECS);
        assert!(!song.is_soundtrack);
    }

    #[test]
    fn lock_buzzer_prefers_reported_reaction_time() {
        let mut round = Round::new(1, song());
        assert_eq!(round.lock_buzzer("Red", Some(420)), 420);
        assert_eq!(round.buzz_winner.as_deref(), Some("Red"));
        assert_eq!(round.buzz_history[0].window, 1);

        round.open_window();
        round.lock_buzzer("Blue", None);
        assert_eq!(round.buzz_winner.as_deref(), Some("Blue"));
        assert_eq!(round.buzz_history.len(), 2);
        assert_eq!(round.buzz_history[1].window, 2);
    }

    #[test]
    fn unlimited_teams_when_max_is_zero() {
        let settings = GameSettings {
            max_teams: 0,
            ..GameSettings::default()
        };
        assert!(settings.has_room_for(1_000));
        assert!(!GameSettings::default().has_room_for(8));
    }
}
