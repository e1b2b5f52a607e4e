/// OpenAPI documentation generation.
pub mod documentation;
/// Read-only and administrative operations on live rooms.
pub mod game_service;
/// Lobby/settings collaborators.
pub mod game_directory;
/// Health check service.
pub mod health_service;
/// Song selection collaborators.
pub mod song_selector;
/// WebSocket connection and message handling service.
pub mod websocket_service;
