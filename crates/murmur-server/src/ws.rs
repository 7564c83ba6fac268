//! Live channel: one task per WebSocket connection.
//!
//! The socket is split. A writer task owns the sink and drains the
//! connection's outbound queue; the connection task reads frames, decodes
//! them into [`ClientEvent`]s and dispatches each one explicitly. The
//! connection task holds the only strong sender of the outbound queue, so
//! when it returns every [`ConnectionHandle`] pointing here goes dead. It
//! returns as soon as either half of the socket fails.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use murmur_shared::constants::MAX_TRANSPORT_MESSAGE_SIZE;
use murmur_shared::protocol::{ClientEvent, Identify, SendMessage, ServerEvent};
use murmur_shared::ConnectionId;

use crate::api::AppState;
use crate::error::STORAGE_UNAVAILABLE;
use crate::lifecycle::ConnectionLifecycle;
use crate::registry::ConnectionHandle;
use crate::relay::{RelayError, RelayService};

/// GET /ws
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    // Frames over MAX_FRAME_SIZE still reach `ClientEvent::from_frame`,
    // which answers them with an `error` event.
    ws.max_message_size(MAX_TRANSPORT_MESSAGE_SIZE)
        .on_upgrade(move |socket| run_connection(socket, state))
}

async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, ws_receiver) = socket.split();
    drive(ws_sender, ws_receiver, state).await;
}

async fn drive<W, R>(ws_sender: W, mut ws_receiver: R, state: AppState)
where
    W: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let conn = ConnectionId::new();
    let (tx, rx) = mpsc::channel::<ServerEvent>(state.config.outbound_buffer);

    let mut lifecycle =
        ConnectionLifecycle::new(ConnectionHandle::new(conn, &tx), state.registry.clone());

    info!(conn = %conn, "WebSocket connection opened");

    let mut writer_handle = tokio::spawn(writer_task(conn, ws_sender, rx));

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&text, &mut lifecycle, &state.relay, &tx).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(conn = %conn, len = data.len(), "Ignoring binary frame");
                }
                // Pongs to client pings are sent by the WebSocket layer.
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(conn = %conn, reason = ?frame, "Client initiated close");
                    break;
                }
                Some(Err(e)) => {
                    warn!(conn = %conn, error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            },
            _ = &mut writer_handle => {
                debug!(conn = %conn, "Writer stopped, closing connection");
                break;
            }
        }
    }

    debug!(conn = %conn, state = ?lifecycle.state(), "Connection loop ended");
    lifecycle.close().await;
    drop(tx);
    writer_handle.abort();

    info!(conn = %conn, "WebSocket connection closed");
}

async fn writer_task<W>(conn: ConnectionId, mut ws_sender: W, mut rx: mpsc::Receiver<ServerEvent>)
where
    W: Sink<Message> + Unpin,
{
    while let Some(event) = rx.recv().await {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(conn = %conn, error = %e, "Failed to encode server event");
                continue;
            }
        };
        if ws_sender.send(Message::Text(frame)).await.is_err() {
            debug!(conn = %conn, "WebSocket send failed, stopping writer");
            break;
        }
    }
}

/// Handle one text frame from the client.
///
/// Rejections are answered on the same connection with an `error` event;
/// the connection stays open.
async fn dispatch(
    frame: &str,
    lifecycle: &mut ConnectionLifecycle,
    relay: &RelayService,
    tx: &mpsc::Sender<ServerEvent>,
) {
    let event = match ClientEvent::from_frame(frame) {
        Ok(event) => event,
        Err(e) => {
            debug!(conn = %lifecycle.id(), error = %e, "Rejected client frame");
            reply(tx, ServerEvent::error(e.to_string()));
            return;
        }
    };

    match event {
        ClientEvent::Identify(Identify { user_id }) => {
            if let Err(e) = lifecycle.identify(user_id).await {
                reply(tx, ServerEvent::error(e.to_string()));
            }
        }
        ClientEvent::Send(SendMessage { from, to, text }) => {
            // An identified connection may omit `from`.
            let from = match lifecycle.identity() {
                Some(identity) if from.is_blank() => identity.clone(),
                _ => from,
            };
            match relay.handle_send(from, to, text).await {
                Ok(outcome) => {
                    debug!(conn = %lifecycle.id(), ?outcome, "Live send accepted");
                }
                Err(RelayError::Persistence(detail)) => {
                    warn!(conn = %lifecycle.id(), error = %detail, "Live send not stored");
                    reply(tx, ServerEvent::error(STORAGE_UNAVAILABLE));
                }
                Err(e) => reply(tx, ServerEvent::error(e.to_string())),
            }
        }
    }
}

fn reply(tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    if tx.try_send(event).is_err() {
        debug!("Dropping reply to a saturated connection");
    }
}
