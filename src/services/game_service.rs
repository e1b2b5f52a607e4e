use tracing::info;

use crate::{
    dto::room::{RoomSnapshot, RoomSummary},
    error::ServiceError,
    state::{SharedState, game::GameCode},
};

/// Summaries of every live room, sorted by code.
pub async fn list_games(state: &SharedState) -> Vec<RoomSummary> {
    state
        .registry()
        .statuses()
        .await
        .iter()
        .map(RoomSummary::from)
        .collect()
}

/// Snapshot of the room addressed by `raw_code`.
pub async fn game_snapshot(state: &SharedState, raw_code: &str) -> Result<RoomSnapshot, ServiceError> {
    let code = GameCode::parse(raw_code)?;
    let room = state
        .registry()
        .get(&code)
        .ok_or_else(|| ServiceError::NotFound(format!("game `{code}` has no live room")))?;
    room.snapshot().await
}

/// Terminate the room addressed by `raw_code`, closing its sockets.
pub async fn terminate_game(state: &SharedState, raw_code: &str) -> Result<(), ServiceError> {
    let code = GameCode::parse(raw_code)?;
    let closed = state
        .registry()
        .remove(&code)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("game `{code}` has no live room")))?;
    info!(code = %code, closed, "room terminated through the API");
    Ok(())
}
