//! Per-Connection Chat Session
//!
//! A [`Session`] is a small state machine:
//!
//! ```text
//! Uninitialized --open ok--> Ready <--complete-- Busy
//!       |                      |------submit----->^
//!       +--open err--> Failed
//! any --close--> Closed
//! ```
//!
//! While `Busy` the chat handle lives inside the task that performs the
//! external call and comes back through a [`Completion`]. Input arriving in
//! that window finds no handle and is dropped without a reply.

use crate::{
    audio::AudioClip,
    llm_client::{ChatHandle, ChatModel, GenerationSettings},
    prompt::PLACEHOLDER_TRANSCRIPT,
    protocol::{ClientMessage, Inbound, ServerMessage},
};
use std::{fmt, sync::Arc};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

pub const INIT_FAILED_MESSAGE: &str = "Failed to initialize AI session";
pub const REQUEST_FAILED_MESSAGE: &str = "Error processing your request. Please try again.";
pub const INVALID_MESSAGE_FORMAT: &str = "Invalid message format";
pub const PROCESSING_VOICE_MESSAGE: &str = "Processing your voice input...";
pub const INTERRUPTION_MESSAGE: &str = "I'm listening...";

/// Observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    /// A request to the chat API is in flight.
    Busy,
    /// The chat handle could not be allocated; input is ignored.
    Failed,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::Busy => "busy",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

enum Phase {
    Uninitialized,
    Ready(Box<dyn ChatHandle>),
    Busy,
    Failed,
    Closed,
}

/// How a finished reply is presented to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyKind {
    /// The client synthesizes speech itself.
    ClientSpeech,
    NativeAudio,
}

enum Request {
    Text(String),
    Audio(AudioClip),
}

/// The outcome of one external chat call, carrying the handle back.
pub struct Completion {
    handle: Box<dyn ChatHandle>,
    reply: ReplyKind,
    outcome: anyhow::Result<String>,
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("reply", &self.reply)
            .field("ok", &self.outcome.is_ok())
            .finish()
    }
}

/// Receives [`Completion`]s for one session; feed each to [`Session::complete`].
pub type CompletionReceiver = mpsc::Receiver<Completion>;

/// One chat session, owned by the task serving its connection.
pub struct Session {
    id: Uuid,
    phase: Phase,
    model: Arc<dyn ChatModel>,
    system_prompt: Arc<String>,
    settings: GenerationSettings,
    outbound: mpsc::Sender<ServerMessage>,
    completion_tx: mpsc::Sender<Completion>,
}

impl Session {
    /// Creates an uninitialized session that writes its messages to `outbound`.
    pub fn new(
        id: Uuid,
        model: Arc<dyn ChatModel>,
        system_prompt: Arc<String>,
        settings: GenerationSettings,
        outbound: mpsc::Sender<ServerMessage>,
    ) -> (Self, CompletionReceiver) {
        // Only one request is ever in flight.
        let (completion_tx, completion_rx) = mpsc::channel(1);
        let session = Self {
            id,
            phase: Phase::Uninitialized,
            model,
            system_prompt,
            settings,
            outbound,
            completion_tx,
        };
        (session, completion_rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Uninitialized => SessionState::Uninitialized,
            Phase::Ready(_) => SessionState::Ready,
            Phase::Busy => SessionState::Busy,
            Phase::Failed => SessionState::Failed,
            Phase::Closed => SessionState::Closed,
        }
    }

    /// Allocates the chat handle and announces the session.
    ///
    /// Only acts on an uninitialized session, so `session_ready` goes out at
    /// most once.
    pub async fn open(&mut self) {
        if !matches!(self.phase, Phase::Uninitialized) {
            warn!(state = %self.state(), "Ignoring open on an already opened session");
            return;
        }

        match self
            .model
            .start_chat(&self.system_prompt, &self.settings)
            .await
        {
            Ok(handle) => {
                self.phase = Phase::Ready(handle);
                info!(model = %self.model.model_name(), "Chat session initialized");
                self.emit(ServerMessage::SessionReady {
                    session_id: self.id,
                })
                .await;
            }
            Err(e) => {
                self.phase = Phase::Failed;
                error!(error = ?e, "Failed to initialize chat session");
                self.emit(ServerMessage::error(INIT_FAILED_MESSAGE)).await;
            }
        }
    }

    /// Parses and dispatches one text frame from the client.
    pub async fn handle_frame(&mut self, raw: &str) {
        match ClientMessage::parse(raw) {
            Ok(Inbound::Message(message)) => self.handle_message(message).await,
            Ok(Inbound::Unknown(kind)) => warn!(%kind, "Unknown message type"),
            Err(e) => {
                warn!(error = %e, "Rejecting malformed client message");
                self.reject_malformed().await;
            }
        }
    }

    /// Tells the client its last message could not be understood.
    pub async fn reject_malformed(&mut self) {
        self.emit(ServerMessage::error(INVALID_MESSAGE_FORMAT)).await;
    }

    pub async fn handle_message(&mut self, message: ClientMessage) {
        debug!(kind = message.kind(), state = %self.state(), "Client message");
        match message {
            ClientMessage::TextInput { text } => self.submit_text(text).await,
            ClientMessage::AudioData { audio } => match AudioClip::from_base64(&audio) {
                Ok(clip) => self.submit_audio(clip).await,
                Err(e) => {
                    warn!(error = %e, "Rejecting undecodable audio payload");
                    self.reject_malformed().await;
                }
            },
            ClientMessage::Interruption => self.interrupt().await,
            ClientMessage::Ping => self.emit(ServerMessage::Pong).await,
        }
    }

    /// Forwards typed text to the chat API. Dropped unless the session is ready.
    pub async fn submit_text(&mut self, text: String) {
        let Some(handle) = self.take_ready_handle("text_input") else {
            return;
        };
        self.dispatch(handle, Request::Text(text), ReplyKind::ClientSpeech);
    }

    /// Forwards recorded audio. Dropped unless the session is ready.
    ///
    /// Models without native audio receive [`PLACEHOLDER_TRANSCRIPT`] instead,
    /// since the relay performs no speech recognition.
    pub async fn submit_audio(&mut self, clip: AudioClip) {
        let Some(handle) = self.take_ready_handle("audio_data") else {
            return;
        };

        if self.model.supports_native_audio() {
            debug!(mime = clip.mime_type, bytes = clip.byte_len(), "Forwarding native audio");
            self.dispatch(handle, Request::Audio(clip), ReplyKind::NativeAudio);
        } else {
            self.emit(ServerMessage::Processing {
                message: PROCESSING_VOICE_MESSAGE.to_string(),
            })
            .await;
            self.dispatch(
                handle,
                Request::Text(PLACEHOLDER_TRANSCRIPT.to_string()),
                ReplyKind::ClientSpeech,
            );
        }
    }

    /// Acknowledges that the user interrupted playback.
    ///
    /// An in-flight request keeps running; its reply is still delivered.
    pub async fn interrupt(&mut self) {
        info!(state = %self.state(), "Interruption received");
        self.emit(ServerMessage::InterruptionAcknowledged {
            message: INTERRUPTION_MESSAGE.to_string(),
        })
        .await;
    }

    /// Applies a finished request: returns the handle and reports the outcome.
    pub async fn complete(&mut self, completion: Completion) {
        let Completion {
            handle,
            reply,
            outcome,
        } = completion;

        if !matches!(self.phase, Phase::Busy) {
            debug!(state = %self.state(), "Discarding completion for inactive session");
            return;
        }
        self.phase = Phase::Ready(handle);

        match outcome {
            Ok(text) => {
                let message = match reply {
                    ReplyKind::ClientSpeech => ServerMessage::spoken_reply(text),
                    ReplyKind::NativeAudio => ServerMessage::native_audio_reply(text),
                };
                self.emit(message).await;
            }
            Err(e) => {
                error!(error = ?e, "Chat request failed");
                self.emit(ServerMessage::error(REQUEST_FAILED_MESSAGE)).await;
            }
        }
    }

    /// Releases the chat handle. Returns `false` if the session was already closed.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Closed => false,
            Phase::Ready(handle) => {
                drop(handle);
                info!("Session cleaned up");
                true
            }
            Phase::Busy => {
                info!("Session cleaned up; in-flight request will be discarded");
                true
            }
            Phase::Uninitialized | Phase::Failed => {
                info!("Session cleaned up");
                true
            }
        }
    }

    fn take_ready_handle(&mut self, kind: &'static str) -> Option<Box<dyn ChatHandle>> {
        match std::mem::replace(&mut self.phase, Phase::Busy) {
            Phase::Ready(handle) => Some(handle),
            other => {
                self.phase = other;
                debug!(%kind, state = %self.state(), "Dropping input: session not ready");
                None
            }
        }
    }

    fn dispatch(&self, mut handle: Box<dyn ChatHandle>, request: Request, reply: ReplyKind) {
        let completion_tx = self.completion_tx.clone();
        let span = tracing::info_span!("chat_request", session_id = %self.id);
        tokio::spawn(
            async move {
                let outcome = match &request {
                    Request::Text(text) => handle.send_text(text).await,
                    Request::Audio(clip) => handle.send_audio(clip).await,
                };
                if completion_tx
                    .send(Completion {
                        handle,
                        reply,
                        outcome,
                    })
                    .await
                    .is_err()
                {
                    debug!("Session ended before the chat reply arrived");
                }
            }
            .instrument(span),
        );
    }

    async fn emit(&self, message: ServerMessage) {
        let kind = message.kind();
        if self.outbound.send(message).await.is_err() {
            debug!(%kind, "Client connection gone; dropping outbound message");
        }
    }
}
