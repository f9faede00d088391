//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the chat model and the session registry.

use crate::config::Config;
use std::sync::Arc;
use voice_relay_core::{llm_client::ChatModel, registry::SessionRegistry};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_model: Arc<dyn ChatModel>,
    pub system_prompt: Arc<String>,
    pub registry: SessionRegistry,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, chat_model: Arc<dyn ChatModel>, system_prompt: String) -> Self {
        Self {
            chat_model,
            system_prompt: Arc::new(system_prompt),
            registry: SessionRegistry::new(),
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Provider;
    use std::path::PathBuf;
    use tracing::Level;
    use voice_relay_core::llm_client::{CannedChatModel, GenerationSettings};

    pub(crate) fn offline_state() -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            provider: Provider::Offline,
            google_api_key: None,
            openai_api_key: None,
            openai_api_base: None,
            chat_model: "canned".to_string(),
            generation: GenerationSettings::default(),
            log_level: Level::INFO,
            prompts_path: None,
            static_dir: PathBuf::from("./frontend"),
        };
        Arc::new(AppState::new(
            config,
            Arc::new(CannedChatModel::new()),
            "You are Rev.".to_string(),
        ))
    }

    #[tokio::test]
    async fn test_new_state_starts_empty() {
        let state = offline_state();
        assert!(state.registry.is_empty().await);
        assert_eq!(state.system_prompt.as_str(), "You are Rev.");
        assert_eq!(state.chat_model.model_name(), "canned");
    }
}
