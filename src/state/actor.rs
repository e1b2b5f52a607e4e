//! One tokio task per room. The task owns the [`GameRoom`] and drains its command
//! queue one command at a time, which is what makes buzzer arbitration and score
//! updates race-free.

use std::{any::Any, panic::AssertUnwindSafe, time::Instant};

use futures::FutureExt;
use tokio::{
    sync::{mpsc, oneshot},
    time::{MissedTickBehavior, interval},
};
use tracing::{error, info};

use crate::{
    dto::room::RoomSnapshot,
    error::ServiceError,
    state::{
        connection::{ConnectionId, OutboundSender},
        game::{GameCode, Role},
        room::{GameRoom, RoomDeps, RoomStatus},
    },
};

/// Commands accepted by a room task.
pub enum RoomCommand {
    /// Register a socket after its handshake.
    Join {
        /// Role of the socket.
        role: Role,
        /// Team name from `team_join`, for team sockets.
        team_name: Option<String>,
        /// Writer channel of the socket.
        tx: OutboundSender,
        /// Connection id, or the reason the join was refused.
        reply: oneshot::Sender<Result<ConnectionId, ServiceError>>,
    },
    /// A raw text frame from a registered socket.
    Inbound {
        /// Sending socket.
        connection: ConnectionId,
        /// Frame payload.
        text: String,
    },
    /// Transport-level liveness signal.
    Heartbeat {
        /// Socket that showed activity.
        connection: ConnectionId,
    },
    /// The socket is gone.
    Disconnect {
        /// Closed socket.
        connection: ConnectionId,
    },
    /// Full room snapshot.
    Snapshot {
        /// Receives the snapshot.
        reply: oneshot::Sender<RoomSnapshot>,
    },
    /// Liveness summary.
    Status {
        /// Receives the status.
        reply: oneshot::Sender<RoomStatus>,
    },
    /// Close every socket and stop the task.
    Shutdown {
        /// Receives the number of closed sockets.
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable address of a running room.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    code: GameCode,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Code of the room.
    pub fn code(&self) -> &GameCode {
        &self.code
    }

    /// Join the room; resolves once the room has processed the join.
    pub async fn join(
        &self,
        role: Role,
        team_name: Option<String>,
        tx: OutboundSender,
    ) -> Result<ConnectionId, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            role,
            team_name,
            tx,
            reply,
        })?;
        rx.await.map_err(|_| room_closed())?
    }

    /// Queue a text frame. Returns `false` when the room is gone.
    pub fn inbound(&self, connection: ConnectionId, text: String) -> bool {
        self.send(RoomCommand::Inbound { connection, text }).is_ok()
    }

    /// Queue a heartbeat refresh.
    pub fn heartbeat(&self, connection: ConnectionId) {
        let _ = self.send(RoomCommand::Heartbeat { connection });
    }

    /// Queue a disconnect.
    pub fn disconnect(&self, connection: ConnectionId) {
        let _ = self.send(RoomCommand::Disconnect { connection });
    }

    /// Ask the room for its snapshot.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply })?;
        rx.await.map_err(|_| room_closed())
    }

    /// Ask the room for its liveness summary.
    pub async fn status(&self) -> Result<RoomStatus, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Status { reply })?;
        rx.await.map_err(|_| room_closed())
    }

    /// Stop the room, closing every socket. Returns how many sockets were closed.
    pub async fn shutdown(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.send(RoomCommand::Shutdown { reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Whether the room task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether both handles address the same room task.
    pub fn same_channel(&self, other: &RoomHandle) -> bool {
        self.tx.same_channel(&other.tx)
    }

    fn send(&self, command: RoomCommand) -> Result<(), ServiceError> {
        self.tx.send(command).map_err(|_| room_closed())
    }
}

fn room_closed() -> ServiceError {
    ServiceError::Unavailable("room is closed".into())
}

/// Spawn the task for a new room and return its handle.
pub fn spawn_room(code: GameCode, deps: RoomDeps) -> RoomHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let room = GameRoom::new(code.clone(), deps);
    tokio::spawn(run_room(room, rx));
    RoomHandle { code, tx }
}

async fn run_room(mut room: GameRoom, mut commands: mpsc::UnboundedReceiver<RoomCommand>) {
    let mut sweep = interval(room.sweep_interval());
    sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    sweep.tick().await;

    info!(code = %room.code(), "room started");

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                if let RoomCommand::Shutdown { reply } = command {
                    let _ = reply.send(room.shutdown());
                    break;
                }
                let outcome = AssertUnwindSafe(execute(&mut room, command))
                    .catch_unwind()
                    .await;
                if let Err(panic) = outcome {
                    contain_panic(&mut room, panic);
                }
            }
            _ = sweep.tick() => {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    room.sweep_stale(Instant::now())
                }));
                if let Err(panic) = outcome {
                    contain_panic(&mut room, panic);
                }
            }
        }
    }

    info!(code = %room.code(), "room stopped");
}

async fn execute(room: &mut GameRoom, command: RoomCommand) {
    match command {
        RoomCommand::Join {
            role,
            team_name,
            tx,
            reply,
        } => {
            let _ = reply.send(room.join(role, team_name, tx).await);
        }
        RoomCommand::Inbound { connection, text } => room.handle_inbound(connection, &text).await,
        RoomCommand::Heartbeat { connection } => room.heartbeat(connection, Instant::now()),
        RoomCommand::Disconnect { connection } => room.disconnect(connection),
        RoomCommand::Snapshot { reply } => {
            let _ = reply.send(room.snapshot());
        }
        RoomCommand::Status { reply } => {
            let _ = reply.send(room.status());
        }
        RoomCommand::Shutdown { reply } => {
            let _ = reply.send(room.shutdown());
        }
    }
}

fn contain_panic(room: &mut GameRoom, panic: Box<dyn Any + Send>) {
    let message = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into());
    error!(code = %room.code(), panic = %message, "room processing panicked; aborting game");
    room.fail(&message);
}
