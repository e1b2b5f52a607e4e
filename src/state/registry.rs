use std::time::Duration;

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{info, warn};

use crate::state::{
    actor::{RoomHandle, spawn_room},
    game::GameCode,
    room::{RoomDeps, RoomStatus},
};

/// Process-wide map from game code to running room.
///
/// Creation goes through the `DashMap` entry API, so two callers racing on the same
/// code serialize on that code's shard and observe a single room.
pub struct GameRegistry {
    rooms: DashMap<GameCode, RoomHandle>,
    deps: RoomDeps,
}

impl GameRegistry {
    /// Create an empty registry whose rooms share `deps`.
    pub fn new(deps: RoomDeps) -> Self {
        Self {
            rooms: DashMap::new(),
            deps,
        }
    }

    /// Return the room for `code`, creating it in `Waiting` on first contact.
    pub fn get_or_create(&self, code: &GameCode) -> RoomHandle {
        match self.rooms.entry(code.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_closed() {
                    warn!(code = %code, "replacing stopped room");
                    let handle = spawn_room(code.clone(), self.deps.clone());
                    entry.insert(handle.clone());
                    handle
                } else {
                    entry.get().clone()
                }
            }
            Entry::Vacant(entry) => {
                info!(code = %code, "creating room");
                let handle = spawn_room(code.clone(), self.deps.clone());
                entry.insert(handle.clone());
                handle
            }
        }
    }

    /// Existing room for `code`.
    pub fn get(&self, code: &GameCode) -> Option<RoomHandle> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    /// Remove and stop the room for `code`. Returns the number of sockets closed.
    pub async fn remove(&self, code: &GameCode) -> Option<usize> {
        let (_, handle) = self.rooms.remove(code)?;
        let closed = handle.shutdown().await;
        info!(code = %code, closed, "room removed");
        Some(closed)
    }

    /// Number of registered rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is registered.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Status of every live room, sorted by code.
    pub async fn statuses(&self) -> Vec<RoomStatus> {
        let mut statuses = Vec::new();
        for handle in self.handles() {
            if let Ok(status) = handle.status().await {
                statuses.push(status);
            }
        }
        statuses.sort_by(|a, b| a.code.cmp(&b.code));
        statuses
    }

    /// Remove rooms that finished past `finished_grace`, sat empty past
    /// `idle_timeout`, or whose task stopped. Returns the reaped codes.
    pub async fn reap_expired(
        &self,
        finished_grace: Duration,
        idle_timeout: Duration,
    ) -> Vec<GameCode> {
        let mut reaped = Vec::new();
        for handle in self.handles() {
            let expired = match handle.status().await {
                Ok(status) => status.is_expired(finished_grace, idle_timeout),
                Err(_) => true,
            };
            if !expired {
                continue;
            }
            // A concurrent get_or_create may have replaced the entry meanwhile.
            let removed = self
                .rooms
                .remove_if(handle.code(), |_, current| current.same_channel(&handle));
            if removed.is_some() {
                let closed = handle.shutdown().await;
                info!(code = %handle.code(), closed, "reaped room");
                reaped.push(handle.code().clone());
            }
        }
        reaped
    }

    /// Stop every room, closing all sockets.
    pub async fn shutdown_all(&self) {
        let codes: Vec<GameCode> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        for code in codes {
            self.remove(&code).await;
        }
    }

    fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.iter().map(|entry| entry.value().clone()).collect()
    }
}
