pub mod actor;
pub mod connection;
pub mod game;
pub mod registry;
pub mod room;
pub mod scoring;
pub mod state_machine;

use std::sync::Arc;

use crate::config::AppConfig;

pub use self::actor::RoomHandle;
pub use self::registry::GameRegistry;
pub use self::room::RoomDeps;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration and the room registry.
pub struct AppState {
    config: Arc<AppConfig>,
    registry: GameRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(deps: RoomDeps) -> SharedState {
        Arc::new(Self {
            config: deps.config.clone(),
            registry: GameRegistry::new(deps),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live rooms.
    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }
}
