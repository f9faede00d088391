//! Persona and Prompt Loading
//!
//! The relay speaks as "Rev", the Revolt Motors assistant. The built-in
//! instructions can be replaced at startup by a `system_prompt.md` file.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// File name looked up inside the prompts directory.
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.md";

/// Transcript forwarded in place of real speech-to-text when the active model
/// cannot take audio directly.
pub const PLACEHOLDER_TRANSCRIPT: &str = "Tell me about Revolt Motors bikes";

/// Built-in system instructions for the Revolt Motors assistant.
pub const SYSTEM_INSTRUCTIONS: &str = r#"You are Rev, the official AI assistant for Revolt Motors, India's leading electric motorcycle company. Your role is to help customers learn about Revolt's electric bikes and assist with their inquiries.

Key Information about Revolt Motors:
- Revolt Motors manufactures premium electric motorcycles in India
- Main models: RV1, RV400, and RV BlazeX
- RV400: Top speed 85 kmph, 150km range, 4.5 hour charging, AI-enabled features
- RV1: Entry-level model starting from ₹94,983
- RV BlazeX: High-performance variant
- All bikes feature mobile app integration, GPS tracking, and smart connectivity
- Booking available for ₹499 on the website
- AI-enabled features include voice commands, smart diagnostics, and predictive maintenance
- Eco-friendly electric propulsion with zero emissions
- Advanced battery technology with fast charging capabilities

Your personality:
- Enthusiastic about electric mobility and sustainable transportation
- Knowledgeable about technical specifications
- Helpful in guiding customers through the buying process
- Speak naturally and conversationally
- Support both English and Hindi languages
- Be concise but informative
- Always stay focused on Revolt Motors and electric mobility topics

If asked about topics outside of Revolt Motors, electric bikes, or related automotive topics, politely redirect the conversation back to how you can help with Revolt Motors products and services.
"#;

/// Resolves the system prompt for new chat sessions.
///
/// With no directory the built-in [`SYSTEM_INSTRUCTIONS`] are used. When a
/// directory is given it must contain a non-empty `system_prompt.md`.
pub fn load_system_prompt(prompts_dir: Option<&Path>) -> Result<String> {
    let Some(dir) = prompts_dir else {
        return Ok(SYSTEM_INSTRUCTIONS.trim().to_string());
    };

    let path = dir.join(SYSTEM_PROMPT_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read system prompt from {}", path.display()))?;
    let content = content.trim();
    if content.is_empty() {
        anyhow::bail!("System prompt file {} is empty", path.display());
    }

    info!(path = %path.display(), "Loaded system prompt override");
    Ok(content.to_string())
}
