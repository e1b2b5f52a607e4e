use std::{fmt, sync::Arc, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, Stream, StreamExt};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, timeout, timeout_at},
};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    state::{
        RoomHandle, SharedState,
        connection::{ConnectionId, OutboundFrame, OutboundSender},
        game::{GameCode, Role},
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle the full lifecycle of one room WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, code: GameCode, role: Role) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();

    // Dedicated writer task so the room never waits on a slow socket.
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let message = match frame {
                OutboundFrame::Message(message) => match serde_json::to_string(&*message) {
                    Ok(payload) => Message::Text(payload.into()),
                    Err(err) => {
                        warn!(error = %err, "failed to serialize message `{message:?}`");
                        continue;
                    }
                },
                OutboundFrame::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let team_name = match role {
        Role::Team => match await_team_join(&mut receiver).await {
            Ok(name) => Some(name),
            Err(err) => {
                warn!(code = %code, error = %err, "team handshake failed");
                reject(&outbound_tx, &err);
                finalize(writer_task, outbound_tx).await;
                return;
            }
        },
        Role::Manager | Role::Display => None,
    };

    let room = state.registry().get_or_create(&code);
    let connection = match room.join(role, team_name, outbound_tx.clone()).await {
        Ok(connection) => connection,
        Err(err) => {
            warn!(code = %code, role = %role, error = %err, "join refused");
            reject(&outbound_tx, &err);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let end = read_frames(&mut receiver, &room, connection, &outbound_tx).await;
    debug!(code = %code, connection = %connection, ?end, "reader stopped");
    room.disconnect(connection);
    finalize(writer_task, outbound_tx).await;
}

/// Why the reader loop of a joined socket stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    /// Close frame or end of stream.
    ClientClosed,
    /// Transport error.
    TransportError,
    /// The room task is gone.
    RoomClosed,
    /// The room closed this connection (kick, takeover, sweep, shutdown).
    WriterClosed,
}

/// Forward frames of a joined socket to its room until either side stops.
async fn read_frames<S, E>(
    receiver: &mut S,
    room: &RoomHandle,
    connection: ConnectionId,
    outbound_tx: &OutboundSender,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let code = room.code();
    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(code = %code, connection = %connection, payload = %text.as_str(), "received message");
                    if !room.inbound(connection, text.as_str().to_owned()) {
                        info!(code = %code, connection = %connection, "room closed; dropping socket");
                        return ReadEnd::RoomClosed;
                    }
                }
                // Pings are answered by the transport; both directions prove liveness.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => room.heartbeat(connection),
                Some(Ok(Message::Binary(_))) => {
                    send_direct(
                        outbound_tx,
                        ServerMessage::error(&ServiceError::InvalidInput(
                            "binary frames are not supported".into(),
                        )),
                    );
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(code = %code, connection = %connection, "socket closed by client");
                    return ReadEnd::ClientClosed;
                }
                Some(Err(err)) => {
                    warn!(code = %code, connection = %connection, error = %err, "websocket error");
                    return ReadEnd::TransportError;
                }
            },
            _ = outbound_tx.closed() => return ReadEnd::WriterClosed,
        }
    }
}

/// Wait for the `team_join` handshake and return the requested team name.
async fn await_team_join<S, E>(receiver: &mut S) -> Result<String, ServiceError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let deadline = Instant::now() + IDENT_TIMEOUT;
    loop {
        let frame = match timeout_at(deadline, receiver.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => return Err(ServiceError::Unavailable(err.to_string())),
            Ok(None) => return Err(ServiceError::Unavailable("socket closed".into())),
            Err(_) => {
                return Err(ServiceError::InvalidInput(
                    "team_join was not received in time".into(),
                ));
            }
        };

        match frame {
            Message::Text(text) => {
                return match ClientMessage::from_json_str(text.as_str())? {
                    ClientMessage::TeamJoin(payload) => Ok(payload.team_name),
                    other => Err(ServiceError::InvalidInput(format!(
                        "expected team_join as first message, got `{}`",
                        other.kind()
                    ))),
                };
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return Err(ServiceError::Unavailable("socket closed".into())),
            Message::Binary(_) => {
                return Err(ServiceError::InvalidInput(
                    "binary frames are not supported".into(),
                ));
            }
        }
    }
}

fn send_direct(tx: &OutboundSender, message: ServerMessage) {
    let _ = tx.send(OutboundFrame::Message(Arc::new(message)));
}

/// Report `err` to the client and close the socket.
fn reject(tx: &OutboundSender, err: &ServiceError) {
    send_direct(tx, ServerMessage::error(err));
    let _ = tx.send(OutboundFrame::Close);
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(mut writer_task: JoinHandle<()>, outbound_tx: OutboundSender) {
    drop(outbound_tx);
    if timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task).await.is_err() {
        writer_task.abort();
    }
}
