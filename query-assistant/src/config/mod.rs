use crate::services::orchestrator::DEFAULT_MAX_ATTEMPTS;
use crate::services::providers::gemini::GEMINI_API_BASE;
use crate::services::providers::GenerationParams;
use crate::services::sql_guard::ExecutionMode;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub database: DatabaseSettings,
    pub assistant: AssistantSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub top_p: f32,
    /// 0 leaves top-k to the model's default.
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl GeminiSettings {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
            top_k: (self.top_k > 0).then_some(self.top_k),
            max_output_tokens: Some(self.max_output_tokens),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSettings {
    pub execution_mode: ExecutionMode,
    /// Attempts per question, including the first.
    pub max_attempts: u32,
    /// Conversation turns kept; 0 keeps everything.
    pub history_window: usize,
}

impl AssistantConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(AssistantConfig {
            common: common_config,
            gemini: GeminiSettings {
                api_key: get_env("GEMINI_API_KEY", None, is_prod)?,
                model: get_env("GEMINI_MODEL", Some("gemini-1.5-flash"), is_prod)?,
                api_base: get_env("GEMINI_API_BASE", Some(GEMINI_API_BASE), is_prod)?,
                temperature: get_parsed("GEMINI_TEMPERATURE", "1.0", is_prod)?,
                top_p: get_parsed("GEMINI_TOP_P", "0.99", is_prod)?,
                top_k: get_parsed("GEMINI_TOP_K", "0", is_prod)?,
                max_output_tokens: get_parsed("GEMINI_MAX_OUTPUT_TOKENS", "4096", is_prod)?,
            },
            database: DatabaseSettings {
                url: get_env("DATABASE_URL", Some("sqlite://database.db"), is_prod)?,
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", "5", is_prod)?,
            },
            assistant: AssistantSettings {
                execution_mode: get_parsed("SQL_EXECUTION_MODE", "read_only", is_prod)?,
                max_attempts: get_parsed(
                    "ASSISTANT_MAX_ATTEMPTS",
                    &DEFAULT_MAX_ATTEMPTS.to_string(),
                    is_prod,
                )?,
                history_window: get_parsed("ASSISTANT_HISTORY_WINDOW", "0", is_prod)?,
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "ENVIRONMENT",
        "GEMINI_API_KEY",
        "GEMINI_MODEL",
        "GEMINI_TOP_K",
        "SQL_EXECUTION_MODE",
        "ASSISTANT_MAX_ATTEMPTS",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn missing_api_key_is_fatal() {
        clear_env();

        let err = AssistantConfig::load().unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    #[serial]
    fn defaults_fill_everything_but_the_key() {
        clear_env();
        env::set_var("GEMINI_API_KEY", "test-key");

        let config = AssistantConfig::load().unwrap();
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(config.assistant.execution_mode, ExecutionMode::ReadOnly);
        assert_eq!(config.assistant.max_attempts, 4);

        let params = config.gemini.generation_params();
        assert_eq!(params.temperature, Some(1.0));
        assert_eq!(params.top_k, None);
        assert_eq!(params.max_output_tokens, Some(4096));

        clear_env();
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        clear_env();
        env::set_var("GEMINI_API_KEY", "test-key");
        env::set_var("SQL_EXECUTION_MODE", "sometimes");

        let err = AssistantConfig::load().unwrap_err();
        assert!(err.to_string().contains("SQL_EXECUTION_MODE"));

        clear_env();
    }

    #[test]
    #[serial]
    fn production_requires_every_key() {
        clear_env();
        env::set_var("ENVIRONMENT", "prod");
        env::set_var("GEMINI_API_KEY", "test-key");

        let err = AssistantConfig::load().unwrap_err();
        assert!(err.to_string().contains("GEMINI_MODEL"));

        clear_env();
    }
}
