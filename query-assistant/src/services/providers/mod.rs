//! Generative model provider abstractions and implementations.
//!
//! The assistant talks to the model through the [`ChatProvider`] trait so the
//! Gemini backend can be swapped for the scripted mock in tests.

pub mod gemini;
pub mod mock;

use crate::models::Turn;
use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider returned no text")]
    EmptyResponse,
}

impl ProviderError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::EmptyResponse => "empty_response",
        }
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Error,
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub finish_reason: FinishReason,
}

/// Sampling configuration, fixed when the session is created.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// `None` leaves the choice to the provider.
    pub top_k: Option<i32>,
    pub max_output_tokens: Option<i32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: Some(1.0),
            top_p: Some(0.99),
            top_k: None,
            max_output_tokens: Some(4096),
        }
    }
}

/// A model that continues a multi-turn conversation.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Model identifier, used as a metrics label.
    fn model_name(&self) -> &str;

    /// Generate the next model turn.
    ///
    /// `history` holds every prior turn followed by the new user prompt as
    /// its last element.
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[Turn],
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
