use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    error::AppError,
    services::websocket_service,
    state::{
        SharedState,
        game::{GameCode, Role},
    },
};

#[utoipa::path(
    get,
    path = "/ws/team/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character game code")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket; first frame must be team_join"),
        (status = 400, description = "Invalid game code")
    )
)]
/// Upgrade into a team WebSocket session.
pub async fn team_ws(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    upgrade(state, ws, &code, Role::Team)
}

#[utoipa::path(
    get,
    path = "/ws/manager/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character game code")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Invalid game code")
    )
)]
/// Upgrade into a manager WebSocket session.
pub async fn manager_ws(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    upgrade(state, ws, &code, Role::Manager)
}

#[utoipa::path(
    get,
    path = "/ws/display/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character game code")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Invalid game code")
    )
)]
/// Upgrade into a read-only display WebSocket session.
pub async fn display_ws(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    upgrade(state, ws, &code, Role::Display)
}

fn upgrade(
    state: SharedState,
    ws: WebSocketUpgrade,
    raw_code: &str,
    role: Role,
) -> Result<Response, AppError> {
    let code = GameCode::parse(raw_code)?;
    Ok(ws
        .on_upgrade(move |socket| websocket_service::handle_socket(state, socket, code, role))
        .into_response())
}

/// Configure the per-role WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/ws/team/{code}", get(team_ws))
        .route("/ws/manager/{code}", get(manager_ws))
        .route("/ws/display/{code}", get(display_ws))
}
