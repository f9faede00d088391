//! Manages the WebSocket connection lifecycle for a chat session.

use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use voice_relay_core::{
    audio::AudioClip,
    protocol::ServerMessage,
    registry::ShutdownSignal,
    session::{CompletionReceiver, Session},
};

/// Outbound messages buffered per connection before the session waits on the socket.
const OUTBOUND_BUFFER: usize = 32;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Registers the session, opens the chat handle, runs the read loop until the
/// client leaves or the relay shuts down, then releases everything.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!("New WebSocket connection established");

    let (socket_tx, socket_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer = tokio::spawn(forward_outbound(socket_tx, outbound_rx));

    let shutdown = state.registry.register(session_id).await;
    let (mut session, completions) = Session::new(
        session_id,
        state.chat_model.clone(),
        state.system_prompt.clone(),
        state.config.generation,
        outbound_tx,
    );

    session.open().await;
    run_session(&mut session, socket_rx, completions, shutdown).await;

    session.close();

    // Dropping the session closes the outbound channel, which ends the writer.
    drop(session);
    if let Err(e) = writer.await {
        error!(error = ?e, "Outbound writer task panicked");
    }
    // Deregister last so the relay's shutdown waits for the close frame.
    state.registry.deregister(&session_id).await;
    info!("WebSocket connection closed");
}

/// The main event loop for an open WebSocket session.
///
/// Client frames, finished chat requests and the relay shutdown signal are
/// handled in arrival order on this one task.
async fn run_session(
    session: &mut Session,
    mut socket_rx: SplitStream<WebSocket>,
    mut completions: CompletionReceiver,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            frame = socket_rx.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => session.handle_frame(&text).await,
                    Some(Ok(Message::Binary(data))) => match AudioClip::from_bytes(&data) {
                        Ok(clip) => session.submit_audio(clip).await,
                        Err(e) => {
                            warn!(error = %e, "Rejecting binary frame");
                            session.reject_malformed().await;
                        }
                    },
                    Some(Ok(Message::Close(_))) => {
                        info!("Client sent close frame. Shutting down session.");
                        break;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                    None => {
                        info!("Client stream ended.");
                        break;
                    }
                }
            },
            Some(done) = completions.recv() => session.complete(done).await,
            _ = &mut shutdown => {
                info!("Relay shutting down. Closing session.");
                break;
            }
        }
    }
}

/// Writes queued server messages to the socket until the session drops its
/// sender, then closes the socket.
async fn forward_outbound(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMessage>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        let kind = msg.kind();
        if let Err(e) = send_msg(&mut socket_tx, msg).await {
            debug!(%kind, error = %e, "Client socket closed; stopping writer");
            return;
        }
    }
    if let Err(e) = socket_tx.close().await {
        debug!(error = %e, "Socket already closed");
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
