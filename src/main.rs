//! Buzz Arena binary entrypoint wiring configuration, collaborators, the room janitor and
//! the REST/WebSocket layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::{
    net::TcpListener,
    time::{MissedTickBehavior, interval},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use buzz_arena::{
    config::AppConfig,
    routes,
    services::{
        game_directory::{GameDirectory, StaticGameDirectory},
        song_selector::{CatalogSongSelector, SongSelector},
    },
    state::{AppState, RoomDeps, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(AppConfig::load());
    let deps = RoomDeps {
        selector: build_selector(&config),
        directory: build_directory(&config),
        config: config.clone(),
    };
    let app_state = AppState::new(deps);

    tokio::spawn(run_janitor(app_state.clone()));
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal(app_state))
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the song source: the remote service when configured, the in-memory catalogue otherwise.
fn build_selector(config: &AppConfig) -> Arc<dyn SongSelector> {
    if let Some(selector) = remote_selector(config) {
        return selector;
    }

    if config.catalog.is_empty() {
        warn!("song catalogue is empty; every round start will report exhaustion");
    } else {
        info!(songs = config.catalog.len(), "using in-memory song catalogue");
    }
    Arc::new(CatalogSongSelector::new(config.catalog.clone()))
}

/// Pick the settings source: the lobby service when configured, static defaults otherwise.
fn build_directory(config: &AppConfig) -> Arc<dyn GameDirectory> {
    remote_directory(config)
        .unwrap_or_else(|| Arc::new(StaticGameDirectory::new(config.defaults.clone())))
}

#[cfg(feature = "http-collaborators")]
fn remote_selector(config: &AppConfig) -> Option<Arc<dyn SongSelector>> {
    use buzz_arena::services::song_selector::HttpSongSelector;

    let url = config.songs_url.as_deref()?;
    info!(url, "using remote song selector");
    Some(Arc::new(HttpSongSelector::new(url)))
}

#[cfg(not(feature = "http-collaborators"))]
fn remote_selector(config: &AppConfig) -> Option<Arc<dyn SongSelector>> {
    if config.songs_url.is_some() {
        warn!("songs_url is set but HTTP collaborators are disabled; using the catalogue");
    }
    None
}

#[cfg(feature = "http-collaborators")]
fn remote_directory(config: &AppConfig) -> Option<Arc<dyn GameDirectory>> {
    use buzz_arena::services::game_directory::HttpGameDirectory;

    let url = config.lobby_url.as_deref()?;
    info!(url, "using remote lobby service");
    Some(Arc::new(HttpGameDirectory::new(url, config.defaults.clone())))
}

#[cfg(not(feature = "http-collaborators"))]
fn remote_directory(config: &AppConfig) -> Option<Arc<dyn GameDirectory>> {
    if config.lobby_url.is_some() {
        warn!("lobby_url is set but HTTP collaborators are disabled; using defaults");
    }
    None
}

/// Periodically reaps finished and abandoned rooms.
async fn run_janitor(state: SharedState) {
    let config = state.config().clone();
    let mut ticker = interval(config.janitor_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let reaped = state
            .registry()
            .reap_expired(config.finished_grace, config.idle_timeout)
            .await;
        if !reaped.is_empty() {
            info!(
                count = reaped.len(),
                rooms = ?reaped,
                remaining = state.registry().len(),
                "janitor reaped rooms"
            );
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM, then close every room so upgraded sockets do not
/// hold the graceful shutdown open.
async fn shutdown_signal(state: SharedState) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!(rooms = state.registry().len(), "shutting down");
    state.registry().shutdown_all().await;
}
