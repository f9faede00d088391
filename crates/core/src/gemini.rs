//! Google Gemini `generateContent` client.
//!
//! Each [`ChatHandle`] resends the full conversation on every turn, the same
//! way the Gemini chat SDKs do.

use crate::{
    audio::AudioClip,
    llm_client::{ChatHandle, ChatModel, GenerationSettings},
};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Models with this marker in their name take audio parts directly.
const NATIVE_AUDIO_MARKER: &str = "native-audio-dialog";

// --- Local Gemini REST Types ---
mod gemini_types {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateContentRequest<'a> {
        pub system_instruction: SystemInstruction<'a>,
        pub contents: &'a [Content],
        pub generation_config: GenerationConfig,
    }

    #[derive(Serialize, Debug)]
    pub(super) struct SystemInstruction<'a> {
        pub parts: [TextPart<'a>; 1],
    }

    #[derive(Serialize, Debug)]
    pub(super) struct TextPart<'a> {
        pub text: &'a str,
    }

    #[derive(Serialize, Debug, Clone, PartialEq)]
    pub(super) struct Content {
        pub role: &'static str,
        pub parts: Vec<Part>,
    }

    #[derive(Serialize, Debug, Clone, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub(super) enum Part {
        Text(String),
        InlineData(Blob),
    }

    #[derive(Serialize, Debug, Clone, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Blob {
        pub mime_type: String,
        pub data: String,
    }

    #[derive(Serialize, Debug, Clone, Copy)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerationConfig {
        pub max_output_tokens: u32,
        pub temperature: f32,
        pub top_p: f32,
        pub top_k: u32,
    }

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct GenerateContentResponse {
        #[serde(default)]
        pub candidates: Vec<Candidate>,
        pub prompt_feedback: Option<PromptFeedback>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Candidate {
        pub content: Option<CandidateContent>,
        pub finish_reason: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct CandidateContent {
        #[serde(default)]
        pub parts: Vec<ResponsePart>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ResponsePart {
        pub text: Option<String>,
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct PromptFeedback {
        pub block_reason: Option<String>,
    }
}

use gemini_types::{Blob, Content, GenerateContentRequest, GenerateContentResponse, Part};

/// A [`ChatModel`] backed by the Gemini REST API.
pub struct GeminiChatModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiChatModel {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_api_base(api_key, model, GEMINI_API_BASE.to_string())
    }

    /// Points the client at a different endpoint, e.g. a local proxy.
    pub fn with_api_base(api_key: String, model: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for GeminiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_native_audio(&self) -> bool {
        self.model.contains(NATIVE_AUDIO_MARKER)
    }

    async fn start_chat(
        &self,
        system_prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<Box<dyn ChatHandle>> {
        if self.api_key.trim().is_empty() {
            bail!("Gemini API key is empty");
        }
        if self.model.trim().is_empty() {
            bail!("Gemini model name is empty");
        }
        Ok(Box::new(GeminiChatHandle {
            http: self.http.clone(),
            api_key: self.api_key.clone(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                self.api_base,
                self.model.trim_start_matches("models/")
            ),
            system_prompt: system_prompt.to_string(),
            generation_config: gemini_types::GenerationConfig {
                max_output_tokens: settings.max_output_tokens,
                temperature: settings.temperature,
                top_p: settings.top_p,
                top_k: settings.top_k,
            },
            history: Vec::new(),
        }))
    }
}

struct GeminiChatHandle {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    system_prompt: String,
    generation_config: gemini_types::GenerationConfig,
    history: Vec<Content>,
}

impl GeminiChatHandle {
    /// Sends the history plus `turn`; both turns are recorded only on success.
    async fn send_turn(&mut self, turn: Content) -> Result<String> {
        let mut contents = self.history.clone();
        contents.push(turn.clone());

        let request = GenerateContentRequest {
            system_instruction: gemini_types::SystemInstruction {
                parts: [gemini_types::TextPart {
                    text: &self.system_prompt,
                }],
            },
            contents: &contents,
            generation_config: self.generation_config,
        };

        debug!(endpoint = %self.endpoint, turns = contents.len(), "Sending Gemini request");
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini API returned {}: {}", status, body);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        let reply = extract_reply(parsed)?;

        self.history.push(turn);
        self.history.push(Content {
            role: "model",
            parts: vec![Part::Text(reply.clone())],
        });
        Ok(reply)
    }
}

#[async_trait]
impl ChatHandle for GeminiChatHandle {
    async fn send_text(&mut self, text: &str) -> Result<String> {
        self.send_turn(Content {
            role: "user",
            parts: vec![Part::Text(text.to_string())],
        })
        .await
    }

    async fn send_audio(&mut self, clip: &AudioClip) -> Result<String> {
        self.send_turn(Content {
            role: "user",
            parts: vec![Part::InlineData(Blob {
                mime_type: clip.mime_type.to_string(),
                data: clip.data.clone(),
            })],
        })
        .await
    }
}

/// Joins the text parts of the first candidate.
fn extract_reply(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        bail!("Gemini blocked the prompt: {}", reason);
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("No candidates in Gemini response")?;
    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        bail!(
            "Gemini response had no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        );
    }
    Ok(text)
}
