//! Chat API Clients
//!
//! The relay treats the generative-AI service as an opaque chat: a
//! [`ChatModel`] hands out one [`ChatHandle`] per session, and the handle keeps
//! whatever conversation history the service needs. Dropping the handle
//! releases it.

use crate::audio::AudioClip;
use anyhow::{Context, Result, anyhow, bail};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

/// Sampling and length limits applied to every chat request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_output_tokens: 512,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

/// A factory for chat sessions against one model of an external service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model identifier requests are sent to.
    fn model_name(&self) -> &str;

    /// Whether the model accepts recorded audio as chat input.
    fn supports_native_audio(&self) -> bool;

    /// Allocates a new chat handle primed with the system prompt.
    async fn start_chat(
        &self,
        system_prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<Box<dyn ChatHandle>>;
}

/// One conversation with the external service.
///
/// Implementations append the user and model turns to their history only
/// when a request succeeds.
#[async_trait]
pub trait ChatHandle: Send + Sync {
    async fn send_text(&mut self, text: &str) -> Result<String>;

    async fn send_audio(&mut self, clip: &AudioClip) -> Result<String>;
}

/// A [`ChatModel`] for any OpenAI-compatible chat completions API.
///
/// Top-k sampling has no equivalent in this API and is not sent.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAICompatibleClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_native_audio(&self) -> bool {
        false
    }

    async fn start_chat(
        &self,
        system_prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<Box<dyn ChatHandle>> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?
            .into();
        Ok(Box::new(OpenAIChatHandle {
            client: self.client.clone(),
            model: self.model.clone(),
            settings: *settings,
            history: vec![system],
        }))
    }
}

struct OpenAIChatHandle {
    client: Client<OpenAIConfig>,
    model: String,
    settings: GenerationSettings,
    history: Vec<ChatCompletionRequestMessage>,
}

#[async_trait]
impl ChatHandle for OpenAIChatHandle {
    async fn send_text(&mut self, text: &str) -> Result<String> {
        let user: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(text)
            .build()?
            .into();
        let mut messages = self.history.clone();
        messages.push(user.clone());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.settings.max_output_tokens)
            .temperature(self.settings.temperature)
            .top_p(self.settings.top_p)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let reply = response
            .choices
            .first()
            .context("No response choice from LLM")?
            .message
            .content
            .clone()
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("LLM response had no text content"))?;

        self.history.push(user);
        self.history.push(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(reply.clone())
                .build()?
                .into(),
        );
        Ok(reply)
    }

    async fn send_audio(&mut self, _clip: &AudioClip) -> Result<String> {
        bail!("Model '{}' does not accept audio input", self.model)
    }
}

/// A deterministic offline [`ChatModel`] for local development and
/// integration testing.
///
/// Replies are built from the Revolt Motors facts without contacting any
/// service.
#[derive(Debug, Clone, Default)]
pub struct CannedChatModel {
    native_audio: bool,
}

impl CannedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A variant that claims to understand recorded audio.
    pub fn with_native_audio() -> Self {
        Self { native_audio: true }
    }
}

#[async_trait]
impl ChatModel for CannedChatModel {
    fn model_name(&self) -> &str {
        if self.native_audio {
            "canned-native-audio-dialog"
        } else {
            "canned"
        }
    }

    fn supports_native_audio(&self) -> bool {
        self.native_audio
    }

    async fn start_chat(
        &self,
        _system_prompt: &str,
        _settings: &GenerationSettings,
    ) -> Result<Box<dyn ChatHandle>> {
        Ok(Box::new(CannedChatHandle))
    }
}

struct CannedChatHandle;

#[async_trait]
impl ChatHandle for CannedChatHandle {
    async fn send_text(&mut self, text: &str) -> Result<String> {
        Ok(canned_reply(text))
    }

    async fn send_audio(&mut self, clip: &AudioClip) -> Result<String> {
        Ok(format!(
            "I received {} bytes of {} audio. Ask me anything about the RV1, RV400 or RV BlazeX!",
            clip.byte_len(),
            clip.mime_type
        ))
    }
}

fn canned_reply(text: &str) -> String {
    let lower = text.to_lowercase();
    if lower.contains("rv400") {
        "The RV400 has a top speed of 85 kmph, a range of up to 150 km and charges fully in about 4.5 hours.".to_string()
    } else if lower.contains("rv1") {
        "The RV1 is our entry-level electric motorcycle, starting from ₹94,983.".to_string()
    } else if lower.contains("blazex") {
        "The RV BlazeX is our high-performance variant with smart connectivity built in.".to_string()
    } else if lower.contains("book") {
        "You can book any Revolt motorcycle on our website for just ₹499.".to_string()
    } else {
        "Revolt Motors builds the RV1, RV400 and RV BlazeX electric motorcycles. Which one would you like to know about?".to_string()
    }
}
