//! Song selection collaborators consulted once per round start.

use std::sync::Arc;

use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::state::game::{Song, SongId};

/// Errors raised while asking for candidate songs.
#[derive(Debug, Error)]
pub enum SelectorError {
    /// The song service could not be reached.
    #[error("song service request failed: {0}")]
    Request(String),
    /// The song service answered with an error status.
    #[error("song service returned status {0}")]
    Status(u16),
}

/// Source of candidate songs for a set of genres.
///
/// An empty result means every song for those genres has been played.
pub trait SongSelector: Send + Sync {
    /// Return candidates for `genres` (empty = any genre), skipping `exclude`.
    fn select(
        &self,
        genres: Vec<String>,
        exclude: Vec<SongId>,
    ) -> BoxFuture<'static, Result<Vec<Song>, SelectorError>>;
}

/// In-memory catalogue, shuffled on every call.
#[derive(Debug, Clone, Default)]
pub struct CatalogSongSelector {
    songs: Arc<Vec<Song>>,
}

impl CatalogSongSelector {
    /// Build a selector over a fixed catalogue.
    pub fn new(songs: Vec<Song>) -> Self {
        Self {
            songs: Arc::new(songs),
        }
    }
}

impl SongSelector for CatalogSongSelector {
    fn select(
        &self,
        genres: Vec<String>,
        exclude: Vec<SongId>,
    ) -> BoxFuture<'static, Result<Vec<Song>, SelectorError>> {
        let songs = self.songs.clone();
        Box::pin(async move {
            let mut candidates: Vec<Song> = songs
                .iter()
                .filter(|song| !exclude.contains(&song.id))
                .filter(|song| {
                    genres.is_empty() || song.genres.iter().any(|genre| genres.contains(genre))
                })
                .cloned()
                .collect();
            candidates.shuffle(&mut rand::rng());
            Ok(candidates)
        })
    }
}

#[cfg(feature = "http-collaborators")]
pub use self::http::HttpSongSelector;

#[cfg(feature = "http-collaborators")]
mod http {
    use futures::future::BoxFuture;
    use serde::{Deserialize, Serialize};
    use tracing::debug;

    use super::{SelectorError, SongSelector};
    use crate::state::game::{DEFAULT_START_OFFSET_SECS, Song, SongId};

    const SELECTION_LIMIT: usize = 10;

    /// Client for the song management service (`POST /api/songs/select`).
    #[derive(Debug, Clone)]
    pub struct HttpSongSelector {
        client: reqwest::Client,
        base_url: String,
    }

    impl HttpSongSelector {
        /// Target the service rooted at `base_url`.
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
            }
        }
    }

    #[derive(Debug, Serialize)]
    struct SelectionRequest {
        genres: Vec<String>,
        exclude_song_ids: Vec<SongId>,
        limit: usize,
    }

    #[derive(Debug, Deserialize)]
    struct SelectionResponse {
        songs: Vec<RemoteSong>,
    }

    #[derive(Debug, Deserialize)]
    struct RemoteSong {
        id: SongId,
        title: String,
        artist: String,
        youtube_id: Option<String>,
        #[serde(default)]
        genres: Vec<String>,
        #[serde(default)]
        start_offset: Option<u32>,
    }

    impl RemoteSong {
        fn into_song(self) -> Option<Song> {
            let media_ref = self.youtube_id.filter(|id| !id.is_empty())?;
            let is_soundtrack = self
                .genres
                .iter()
                .any(|genre| genre.to_ascii_lowercase().contains("soundtrack"));
            Some(Song {
                id: self.id,
                title: self.title,
                artist: self.artist,
                media_ref,
                start_offset_secs: self.start_offset.unwrap_or(DEFAULT_START_OFFSET_SECS),
                is_soundtrack,
                genres: self.genres,
            })
        }
    }

    impl SongSelector for HttpSongSelector {
        fn select(
            &self,
            genres: Vec<String>,
            exclude: Vec<SongId>,
        ) -> BoxFuture<'static, Result<Vec<Song>, SelectorError>> {
            let client = self.client.clone();
            let url = format!("{}/api/songs/select", self.base_url);
            Box::pin(async move {
                let request = SelectionRequest {
                    genres,
                    exclude_song_ids: exclude,
                    limit: SELECTION_LIMIT,
                };
                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|err| SelectorError::Request(err.to_string()))?;
                if !response.status().is_success() {
                    return Err(SelectorError::Status(response.status().as_u16()));
                }
                let body: SelectionResponse = response
                    .json()
                    .await
                    .map_err(|err| SelectorError::Request(err.to_string()))?;

                let total = body.songs.len();
                let songs: Vec<Song> = body
                    .songs
                    .into_iter()
                    .filter_map(RemoteSong::into_song)
                    .collect();
                if songs.len() < total {
                    debug!(
                        skipped = total - songs.len(),
                        "ignoring songs without a media reference"
                    );
                }
                Ok(songs)
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn remote_songs_without_media_are_skipped() {
            let body: SelectionResponse = serde_json::from_str(
                r#"{"songs": [
                    {"id": 1, "title": "A", "artist": "X", "youtube_id": "abcdefghijk", "genres": ["movie-soundtracks"]},
                    {"id": 2, "title": "B", "artist": "Y", "youtube_id": null}
                ], "total_available": 2}"#,
            )
            .unwrap();
            let songs: Vec<_> = body
                .songs
                .into_iter()
                .filter_map(RemoteSong::into_song)
                .collect();
            assert_eq!(songs.len(), 1);
            assert!(songs[0].is_soundtrack);
            assert_eq!(songs[0].start_offset_secs, DEFAULT_START_OFFSET_SECS);
        }
    }
}
