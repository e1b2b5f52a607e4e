use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::room::{RoomSnapshot, RoomSummary},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes inspecting and terminating live rooms.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", get(list_games))
        .route("/games/{code}", get(get_game).delete(delete_game))
}

/// List every live room.
#[utoipa::path(
    get,
    path = "/games",
    tag = "rooms",
    responses(
        (status = 200, description = "Live rooms", body = [RoomSummary])
    )
)]
pub async fn list_games(State(state): State<SharedState>) -> Json<Vec<RoomSummary>> {
    Json(game_service::list_games(&state).await)
}

/// Return the full snapshot of one room.
#[utoipa::path(
    get,
    path = "/games/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character game code")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSnapshot),
        (status = 400, description = "Invalid game code"),
        (status = 404, description = "No live room for this code")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = game_service::game_snapshot(&state, &code).await?;
    Ok(Json(snapshot))
}

/// Terminate a room, closing every attached socket.
#[utoipa::path(
    delete,
    path = "/games/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character game code")),
    responses(
        (status = 204, description = "Room terminated"),
        (status = 400, description = "Invalid game code"),
        (status = 404, description = "No live room for this code")
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    game_service::terminate_game(&state, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}
