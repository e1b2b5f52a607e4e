//! Lobby/settings collaborators: which genres and limits apply to a game code.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::state::game::{GameCode, GameSettings};

/// Errors raised while fetching game settings.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The lobby service could not be reached.
    #[error("lobby service request failed: {0}")]
    Request(String),
    /// The lobby service answered with an error status.
    #[error("lobby service returned status {0}")]
    Status(u16),
}

/// Read-only view of the lobby service.
pub trait GameDirectory: Send + Sync {
    /// Settings for `code`, or `None` when the lobby does not know the game.
    fn settings(
        &self,
        code: &GameCode,
    ) -> BoxFuture<'static, Result<Option<GameSettings>, DirectoryError>>;
}

/// Serves the same settings for every game.
#[derive(Debug, Clone, Default)]
pub struct StaticGameDirectory {
    settings: GameSettings,
}

impl StaticGameDirectory {
    /// Serve `settings` for every code.
    pub fn new(settings: GameSettings) -> Self {
        Self { settings }
    }
}

impl GameDirectory for StaticGameDirectory {
    fn settings(
        &self,
        _code: &GameCode,
    ) -> BoxFuture<'static, Result<Option<GameSettings>, DirectoryError>> {
        let settings = self.settings.clone();
        Box::pin(async move { Ok(Some(settings)) })
    }
}

#[cfg(feature = "http-collaborators")]
pub use self::http::HttpGameDirectory;

#[cfg(feature = "http-collaborators")]
mod http {
    use futures::future::BoxFuture;
    use reqwest::StatusCode;
    use serde::Deserialize;

    use super::{DirectoryError, GameDirectory};
    use crate::state::game::{GameCode, GameSettings};

    /// Client for the game management service (`GET /api/games/{code}`).
    #[derive(Debug, Clone)]
    pub struct HttpGameDirectory {
        client: reqwest::Client,
        base_url: String,
        fallback: GameSettings,
    }

    impl HttpGameDirectory {
        /// Target the service rooted at `base_url`; missing fields use `fallback`.
        pub fn new(base_url: impl Into<String>, fallback: GameSettings) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                fallback,
            }
        }
    }

    #[derive(Debug, Deserialize)]
    struct GameResponse {
        settings: RemoteSettings,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct RemoteSettings {
        max_teams: Option<usize>,
        rounds_per_game: Option<u32>,
        selected_genres: Option<Vec<String>>,
    }

    impl RemoteSettings {
        fn resolve(self, fallback: &GameSettings) -> GameSettings {
            GameSettings {
                max_teams: self.max_teams.unwrap_or(fallback.max_teams),
                max_rounds: self.rounds_per_game.unwrap_or(fallback.max_rounds),
                genres: self
                    .selected_genres
                    .unwrap_or_else(|| fallback.genres.clone()),
            }
        }
    }

    impl GameDirectory for HttpGameDirectory {
        fn settings(
            &self,
            code: &GameCode,
        ) -> BoxFuture<'static, Result<Option<GameSettings>, DirectoryError>> {
            let client = self.client.clone();
            let url = format!("{}/api/games/{}", self.base_url, code);
            let fallback = self.fallback.clone();
            Box::pin(async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|err| DirectoryError::Request(err.to_string()))?;
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !response.status().is_success() {
                    return Err(DirectoryError::Status(response.status().as_u16()));
                }
                let body: GameResponse = response
                    .json()
                    .await
                    .map_err(|err| DirectoryError::Request(err.to_string()))?;
                Ok(Some(body.settings.resolve(&fallback)))
            })
        }
    }

}
