use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;
use voice_relay_core::llm_client::GenerationSettings;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for the chat API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
    /// Canned replies, no network access.
    Offline,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub chat_model: String,
    pub generation: GenerationSettings,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
    pub static_dir: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address = match std::env::var("BIND_ADDRESS") {
            Ok(value) => value
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?,
            Err(_) => {
                let port = parse_var::<u16>("PORT")?.unwrap_or(3000);
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let provider_str = std::env::var("CHAT_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "openai" => Provider::OpenAI,
            "offline" => Provider::Offline,
            other => {
                return Err(ConfigError::InvalidValue(
                    "CHAT_PROVIDER".to_string(),
                    format!("'{}' is not one of gemini, openai, offline", other),
                ));
            }
        };

        let google_api_key = non_empty_var("GOOGLE_API_KEY");
        let openai_api_key = non_empty_var("OPENAI_API_KEY");
        let openai_api_base = non_empty_var("OPENAI_API_BASE");

        let chat_model = non_empty_var("CHAT_MODEL").unwrap_or_else(|| {
            match provider {
                Provider::Gemini => "gemini-1.5-flash",
                Provider::OpenAI => "gpt-4o",
                Provider::Offline => "canned",
            }
            .to_string()
        });

        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            max_output_tokens: parse_var("MAX_OUTPUT_TOKENS")?.unwrap_or(defaults.max_output_tokens),
            temperature: parse_var("TEMPERATURE")?.unwrap_or(defaults.temperature),
            top_p: parse_var("TOP_P")?.unwrap_or(defaults.top_p),
            top_k: parse_var("TOP_K")?.unwrap_or(defaults.top_k),
        };
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::InvalidValue(
                "TEMPERATURE".to_string(),
                "must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(ConfigError::InvalidValue(
                "TOP_P".to_string(),
                "must be between 0.0 and 1.0".to_string(),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = non_empty_var("PROMPTS_PATH").map(PathBuf::from);
        let static_dir = non_empty_var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./frontend"));

        match provider {
            Provider::Gemini => {
                if google_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GOOGLE_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Offline => {}
        }

        Ok(Self {
            bind_address,
            provider,
            google_api_key,
            openai_api_key,
            openai_api_base,
            chat_model,
            generation,
            log_level,
            prompts_path,
            static_dir,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty_var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            for var in [
                "BIND_ADDRESS",
                "PORT",
                "CHAT_PROVIDER",
                "GOOGLE_API_KEY",
                "OPENAI_API_KEY",
                "OPENAI_API_BASE",
                "CHAT_MODEL",
                "MAX_OUTPUT_TOKENS",
                "TEMPERATURE",
                "TOP_P",
                "TOP_K",
                "RUST_LOG",
                "PROMPTS_PATH",
                "STATIC_DIR",
            ] {
                env::remove_var(var);
            }
        }
    }

    fn set_minimal_env_gemini() {
        unsafe {
            env::set_var("GOOGLE_API_KEY", "test-google-key");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal_gemini() {
        clear_env_vars();
        set_minimal_env_gemini();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.google_api_key, Some("test-google-key".to_string()));
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.chat_model, "gemini-1.5-flash");
        assert_eq!(config.generation, GenerationSettings::default());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, None);
        assert_eq!(config.static_dir, PathBuf::from("./frontend"));
    }

    #[test]
    #[serial]
    fn test_config_port_without_bind_address() {
        clear_env_vars();
        set_minimal_env_gemini();
        unsafe {
            env::set_var("PORT", "8080");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8080");
    }

    #[test]
    #[serial]
    fn test_config_invalid_port() {
        clear_env_vars();
        set_minimal_env_gemini();
        unsafe {
            env::set_var("PORT", "70000");
        }

        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "PORT"),
            _ => panic!("Expected InvalidValue for PORT"),
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:9000");
            env::set_var("PORT", "8080");
            env::set_var("CHAT_PROVIDER", "OpenAI");
            env::set_var("OPENAI_API_KEY", "custom-openai-key");
            env::set_var("OPENAI_API_BASE", "http://localhost:11434/v1");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("MAX_OUTPUT_TOKENS", "256");
            env::set_var("TEMPERATURE", "0.25");
            env::set_var("TOP_P", "0.5");
            env::set_var("TOP_K", "20");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
            env::set_var("STATIC_DIR", "/srv/frontend");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.provider, Provider::OpenAI);
        assert_eq!(config.openai_api_key, Some("custom-openai-key".to_string()));
        assert_eq!(
            config.openai_api_base,
            Some("http://localhost:11434/v1".to_string())
        );
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(
            config.generation,
            GenerationSettings {
                max_output_tokens: 256,
                temperature: 0.25,
                top_p: 0.5,
                top_k: 20,
            }
        );
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, Some(PathBuf::from("/custom/prompts")));
        assert_eq!(config.static_dir, PathBuf::from("/srv/frontend"));
    }

    #[test]
    #[serial]
    fn test_config_offline_needs_no_key() {
        clear_env_vars();
        unsafe {
            env::set_var("CHAT_PROVIDER", "offline");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.provider, Provider::Offline);
        assert_eq!(config.chat_model, "canned");
    }

    #[test]
    #[serial]
    fn test_config_unknown_provider() {
        clear_env_vars();
        unsafe {
            env::set_var("CHAT_PROVIDER", "anthropic");
        }

        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, msg) => {
                assert_eq!(var, "CHAT_PROVIDER");
                assert!(msg.contains("anthropic"));
            }
            _ => panic!("Expected InvalidValue for CHAT_PROVIDER"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        set_minimal_env_gemini();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        set_minimal_env_gemini();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_generation_out_of_range() {
        clear_env_vars();
        set_minimal_env_gemini();
        unsafe {
            env::set_var("TOP_P", "1.5");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TOP_P"),
            _ => panic!("Expected InvalidValue for TOP_P"),
        }

        unsafe {
            env::remove_var("TOP_P");
            env::set_var("TEMPERATURE", "warm");
        }
        match Config::from_env().unwrap_err() {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "TEMPERATURE"),
            _ => panic!("Expected InvalidValue for TEMPERATURE"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_google_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("GOOGLE_API_KEY"));
            }
            _ => panic!("Expected MissingVar for GOOGLE_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_openai_key() {
        clear_env_vars();
        unsafe {
            env::set_var("CHAT_PROVIDER", "openai");
            env::set_var("GOOGLE_API_KEY", "not-the-right-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("OPENAI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }
}
