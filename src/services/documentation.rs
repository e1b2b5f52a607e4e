use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Buzz Arena.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::list_games,
        crate::routes::game::get_game,
        crate::routes::game::delete_game,
        crate::routes::websocket::team_ws,
        crate::routes::websocket::manager_ws,
        crate::routes::websocket::display_ws,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::RoomSummary,
            crate::dto::room::RoundSnapshot,
            crate::dto::room::SongSnapshot,
            crate::dto::room::TeamSummary,
            crate::state::game::LockedComponents,
            crate::state::game::Role,
            crate::state::state_machine::LifecycleState,
            crate::state::state_machine::RoundPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Live game rooms and their WebSocket endpoints"),
    )
)]
pub struct ApiDoc;
