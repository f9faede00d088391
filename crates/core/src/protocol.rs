//! Defines the WebSocket message protocol between the browser client and the relay.
//!
//! Every frame is a JSON object tagged by its `type` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Client-side message kinds the relay knows how to handle.
pub const CLIENT_MESSAGE_KINDS: [&str; 4] = ["audio_data", "text_input", "interruption", "ping"];

/// Messages sent from the client (browser) to the relay.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A recorded voice clip, base64 encoded.
    AudioData { audio: String },
    /// A typed question from the user.
    TextInput { text: String },
    /// The user started talking over the assistant.
    Interruption,
    /// Application-level liveness check.
    Ping,
}

/// Result of parsing a text frame that was well-formed JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Message(ClientMessage),
    /// A syntactically valid frame whose `type` the relay does not handle.
    Unknown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("invalid payload for `{kind}`: {source}")]
    InvalidPayload {
        kind: String,
        source: serde_json::Error,
    },
}

impl ClientMessage {
    /// Parses a raw text frame.
    ///
    /// Unknown message kinds are not an error; they come back as
    /// [`Inbound::Unknown`] so the caller can log and ignore them.
    pub fn parse(raw: &str) -> Result<Inbound, ProtocolError> {
        let value: Value = serde_json::from_str(raw)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_string();

        if !CLIENT_MESSAGE_KINDS.contains(&kind.as_str()) {
            return Ok(Inbound::Unknown(kind));
        }

        serde_json::from_value(value)
            .map(Inbound::Message)
            .map_err(|source| ProtocolError::InvalidPayload { kind, source })
    }

    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AudioData { .. } => "audio_data",
            Self::TextInput { .. } => "text_input",
            Self::Interruption => "interruption",
            Self::Ping => "ping",
        }
    }
}

/// Messages sent from the relay to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The chat session is allocated and accepting input.
    SessionReady {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    /// A reply from the assistant.
    AiResponse {
        text: String,
        /// Present (as `null`) only for replies to native-audio requests.
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<Option<String>>,
        /// Asks the client to synthesize speech for `text` on the device.
        #[serde(rename = "needsTTS", skip_serializing_if = "Option::is_none")]
        needs_tts: Option<bool>,
    },
    /// Progress notice while a voice request is being handled.
    Processing { message: String },
    InterruptionAcknowledged { message: String },
    Error { message: String },
    Pong,
}

impl ServerMessage {
    /// A reply the client should speak with its own synthesizer.
    pub fn spoken_reply(text: impl Into<String>) -> Self {
        Self::AiResponse {
            text: text.into(),
            audio: None,
            needs_tts: Some(true),
        }
    }

    /// A reply to a native-audio request; the API returns no audio of its own.
    pub fn native_audio_reply(text: impl Into<String>) -> Self {
        Self::AiResponse {
            text: text.into(),
            audio: Some(None),
            needs_tts: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The wire tag of this message, handy for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionReady { .. } => "session_ready",
            Self::AiResponse { .. } => "ai_response",
            Self::Processing { .. } => "processing",
            Self::InterruptionAcknowledged { .. } => "interruption_acknowledged",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }
}
