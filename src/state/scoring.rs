//! Score keeping: component locks, running totals and the used-song ledger.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    error::ServiceError,
    state::game::{LockedComponents, Round, SongId, Team},
};

/// Point values applied by [`apply_verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    /// Awarded once per round for the song title.
    pub song_points: i32,
    /// Awarded once per round for the artist or film/show.
    pub artist_points: i32,
    /// Deducted for each wrong answer.
    pub wrong_answer_penalty: i32,
    /// Deducted when the buzz winner runs out of time to answer.
    pub timeout_penalty: i32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            song_points: 10,
            artist_points: 5,
            wrong_answer_penalty: 2,
            timeout_penalty: 2,
        }
    }
}

/// The manager's judgement of the buzz winner's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// The song title was right.
    pub song_correct: bool,
    /// The artist or film/show was right.
    pub artist_correct: bool,
    /// The answer was wrong; penalise and re-arm buzzers.
    pub wrong_answer: bool,
}

/// Result of applying a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutcome {
    /// Team the verdict applied to.
    pub team_name: String,
    /// Net score change.
    pub points_delta: i32,
    /// Lock flags after the verdict.
    pub locked: LockedComponents,
    /// Whether the buzzer must be re-armed.
    pub reopen_buzzer: bool,
}

/// Apply `verdict` to the round's buzz winner.
///
/// Already locked components score nothing. Nothing is mutated when the round
/// has no winner or the winner left the roster.
pub fn apply_verdict(
    rules: &ScoringRules,
    round: &mut Round,
    teams: &mut IndexMap<String, Team>,
    verdict: Verdict,
) -> Result<EvaluationOutcome, ServiceError> {
    let team_name = round
        .buzz_winner
        .clone()
        .ok_or_else(|| ServiceError::InvalidState("no team holds the buzzer".into()))?;
    let team = teams.get_mut(&team_name).ok_or_else(|| {
        ServiceError::InvalidState(format!("buzz winner `{team_name}` is no longer in the game"))
    })?;

    let mut points_delta = 0;
    if verdict.song_correct && !round.locked.song_name {
        round.locked.song_name = true;
        points_delta += rules.song_points;
    }
    if verdict.artist_correct && !round.locked.artist_or_content {
        round.locked.artist_or_content = true;
        points_delta += rules.artist_points;
    }
    if verdict.wrong_answer {
        points_delta -= rules.wrong_answer_penalty;
    }
    team.score += points_delta;

    Ok(EvaluationOutcome {
        team_name,
        points_delta,
        locked: round.locked,
        reopen_buzzer: verdict.wrong_answer,
    })
}

/// Deduct the timeout penalty from `team_name` and return the score change.
/// A team that already left the roster is not charged.
pub fn apply_timeout_penalty(
    rules: &ScoringRules,
    teams: &mut IndexMap<String, Team>,
    team_name: &str,
) -> i32 {
    match teams.get_mut(team_name) {
        Some(team) => {
            team.score -= rules.timeout_penalty;
            -rules.timeout_penalty
        }
        None => 0,
    }
}

/// Current totals, in roster order.
pub fn team_scores(teams: &IndexMap<String, Team>) -> IndexMap<String, i32> {
    teams
        .iter()
        .map(|(name, team)| (name.clone(), team.score))
        .collect()
}

/// The team with the strictly highest score, if any. Ties yield `None`.
pub fn winner(teams: &IndexMap<String, Team>) -> Option<String> {
    let top = teams.values().map(|team| team.score).max()?;
    let mut leaders = teams.iter().filter(|(_, team)| team.score == top);
    let (name, _) = leaders.next()?;
    match leaders.next() {
        Some(_) => None,
        None => Some(name.clone()),
    }
}

/// Songs already played in a room; append-only.
#[derive(Debug, Clone, Default)]
pub struct UsedSongs {
    ids: HashSet<SongId>,
}

impl UsedSongs {
    /// Record a played song. Returns `false` when it was already recorded.
    pub fn record(&mut self, id: SongId) -> bool {
        self.ids.insert(id)
    }

    /// Whether the song was already played.
    pub fn contains(&self, id: SongId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of songs played.
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// Sorted ids, as sent to the song selector.
    pub fn to_sorted_vec(&self) -> Vec<SongId> {
        let mut ids: Vec<_> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
