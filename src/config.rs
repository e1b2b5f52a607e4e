//! Application-level configuration loading: timing policy, collaborator endpoints and
//! game defaults.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{
    game::{GameSettings, Song},
    scoring::ScoringRules,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BUZZ_ARENA_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Connections silent for longer than this are dropped.
    pub heartbeat_timeout: Duration,
    /// Period of the per-room liveness sweep.
    pub heartbeat_sweep_interval: Duration,
    /// Upper bound for every song selector / lobby call.
    pub collaborator_timeout: Duration,
    /// How long a finished room lingers before the janitor reaps it.
    pub finished_grace: Duration,
    /// How long a room without connections lingers before the janitor reaps it.
    pub idle_timeout: Duration,
    /// Period of the janitor.
    pub janitor_interval: Duration,
    /// Base URL of the song management service.
    pub songs_url: Option<String>,
    /// Base URL of the lobby service.
    pub lobby_url: Option<String>,
    /// Settings used when the lobby is absent or unreachable.
    pub defaults: GameSettings,
    /// Point values.
    pub scoring: ScoringRules,
    /// Songs served by the in-memory selector when `songs_url` is absent.
    pub catalog: Vec<Song>,
}

impl AppConfig {
    /// Load the configuration from the resolved path, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration from `path`, falling back to built-in defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        catalog = app_config.catalog.len(),
                        songs_url = app_config.songs_url.as_deref().unwrap_or("-"),
                        lobby_url = app_config.lobby_url.as_deref().unwrap_or("-"),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    heartbeat_timeout_secs: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    heartbeat_sweep_interval_secs: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    collaborator_timeout_ms: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    finished_grace_secs: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    idle_timeout_secs: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    janitor_interval_secs: Duration,
    songs_url: Option<String>,
    lobby_url: Option<String>,
    defaults: GameSettings,
    scoring: ScoringRules,
    catalog: Vec<Song>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: Duration::from_secs(60),
            heartbeat_sweep_interval_secs: Duration::from_secs(10),
            collaborator_timeout_ms: Duration::from_millis(5_000),
            finished_grace_secs: Duration::from_secs(300),
            idle_timeout_secs: Duration::from_secs(1_800),
            janitor_interval_secs: Duration::from_secs(30),
            songs_url: None,
            lobby_url: None,
            defaults: GameSettings::default(),
            scoring: ScoringRules::default(),
            catalog: Vec::new(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            heartbeat_timeout: value.heartbeat_timeout_secs,
            heartbeat_sweep_interval: non_zero(value.heartbeat_sweep_interval_secs),
            collaborator_timeout: value.collaborator_timeout_ms,
            finished_grace: value.finished_grace_secs,
            idle_timeout: value.idle_timeout_secs,
            janitor_interval: non_zero(value.janitor_interval_secs),
            songs_url: value.songs_url.filter(|url| !url.trim().is_empty()),
            lobby_url: value.lobby_url.filter(|url| !url.trim().is_empty()),
            defaults: value.defaults,
            scoring: value.scoring,
            catalog: value.catalog,
        }
    }
}

/// `tokio::time::interval` panics on a zero period.
fn non_zero(period: Duration) -> Duration {
    period.max(Duration::from_secs(1))
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(60));
        assert_eq!(config.heartbeat_sweep_interval, Duration::from_secs(10));
        assert_eq!(config.collaborator_timeout, Duration::from_millis(5_000));
        assert_eq!(config.finished_grace, Duration::from_secs(300));
        assert_eq!(config.defaults, GameSettings::default());
        assert_eq!(config.scoring, ScoringRules::default());
        assert!(config.songs_url.is_none());
    }

    #[test]
    fn fields_override_defaults() {
        let config = AppConfig::from_json_str(
            r#"{
                "heartbeat_timeout_secs": 15,
                "collaborator_timeout_ms": 250,
                "janitor_interval_secs": 0,
                "songs_url": "http://songs:8000/",
                "lobby_url": "  ",
                "defaults": {"max_teams": 0, "genres": ["rock"]},
                "scoring": {"wrong_answer_penalty": 3},
                "catalog": [{"id": 1, "title": "T", "artist": "A", "media_ref": "m"}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(15));
        assert_eq!(config.collaborator_timeout, Duration::from_millis(250));
        assert_eq!(config.janitor_interval, Duration::from_secs(1));
        assert_eq!(config.songs_url.as_deref(), Some("http://songs:8000/"));
        assert!(config.lobby_url.is_none());
        assert_eq!(config.defaults.max_teams, 0);
        assert_eq!(config.defaults.max_rounds, 10);
        assert_eq!(config.scoring.wrong_answer_penalty, 3);
        assert_eq!(config.scoring.song_points, 10);
        assert_eq!(config.catalog.len(), 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/buzz-arena.json"));
        assert_eq!(config.idle_timeout, Duration::from_secs(1_800));
    }

    #[test]
    fn invalid_document_is_an_error() {
        assert!(AppConfig::from_json_str(r#"{"heartbeat_timeout_secs": "soon"}"#).is_err());
    }
}
