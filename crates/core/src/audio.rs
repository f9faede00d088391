//! Audio payloads as they travel from the browser to the chat API.
//!
//! Browsers send recorded audio either base64-encoded inside an `audio_data`
//! message or as a raw binary frame. Both are normalized into an [`AudioClip`]
//! carrying base64 data and a MIME type sniffed from the container header.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// MIME type assumed when the container cannot be recognised.
pub const DEFAULT_AUDIO_MIME: &str = "audio/wav";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AudioError {
    #[error("audio payload is empty")]
    Empty,
    #[error("audio payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// A recorded clip ready to be attached to a chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub mime_type: &'static str,
    /// Base64 (standard alphabet, padded) encoded audio bytes.
    pub data: String,
}

impl AudioClip {
    /// Builds a clip from the base64 string of an `audio_data` message.
    pub fn from_base64(encoded: &str) -> Result<Self, AudioError> {
        let encoded = encoded.trim();
        // Browsers hand out data URLs from FileReader; keep only the payload.
        let encoded = match encoded.split_once(";base64,") {
            Some((_, payload)) => payload,
            None => encoded,
        };
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| AudioError::InvalidBase64(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AudioError::Empty);
        }
        Ok(Self {
            mime_type: sniff_mime_type(&bytes),
            data: encoded.to_string(),
        })
    }

    /// Builds a clip from the raw bytes of a binary WebSocket frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AudioError> {
        if bytes.is_empty() {
            return Err(AudioError::Empty);
        }
        Ok(Self {
            mime_type: sniff_mime_type(bytes),
            data: STANDARD.encode(bytes),
        })
    }

    /// Size of the decoded audio in bytes.
    pub fn byte_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|&b| b == b'=').count();
        self.data.len() / 4 * 3 - padding
    }
}

/// Guesses the container format from its magic bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => "audio/wav",
        [0x1A, 0x45, 0xDF, 0xA3, ..] => "audio/webm",
        [b'O', b'g', b'g', b'S', ..] => "audio/ogg",
        [b'f', b'L', b'a', b'C', ..] => "audio/flac",
        [b'I', b'D', b'3', ..] => "audio/mpeg",
        [0xFF, second, ..] if *second & 0xE0 == 0xE0 => "audio/mpeg",
        _ => DEFAULT_AUDIO_MIME,
    }
}
