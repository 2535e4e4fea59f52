//! Gemini chat provider implementation.
//!
//! Sends the whole conversation to Google's `generateContent` endpoint on
//! every call, with the schema description as the system instruction.

use super::{ChatProvider, FinishReason, GenerationParams, ProviderError, ProviderResponse};
use crate::models::Turn;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

/// Gemini chat provider.
pub struct GeminiChatProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiChatProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.model,
            method,
            self.config.api_key
        )
    }

    fn build_request(
        system_instruction: &str,
        history: &[Turn],
        params: &GenerationParams,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: history
                .iter()
                .map(|turn| Content {
                    role: Some(turn.role.as_str().to_string()),
                    parts: vec![ContentPart {
                        text: turn.content.clone(),
                    }],
                })
                .collect(),
            system_instruction: if system_instruction.is_empty() {
                None
            } else {
                Some(Content {
                    role: None,
                    parts: vec![ContentPart {
                        text: system_instruction.to_string(),
                    }],
                })
            },
            generation_config: Some(GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k.filter(|k| *k > 0),
                max_output_tokens: params.max_output_tokens,
            }),
        }
    }
}

fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("STOP") => FinishReason::Complete,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") => FinishReason::ContentFilter,
        Some("OTHER") => FinishReason::Error,
        _ => FinishReason::Complete,
    }
}

#[async_trait]
impl ChatProvider for GeminiChatProvider {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        system_instruction: &str,
        history: &[Turn],
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        let request = Self::build_request(system_instruction, history, params);
        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            turns = history.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let candidate = api_response
            .candidates
            .first()
            .ok_or(ProviderError::EmptyResponse)?;

        let finish_reason = map_finish_reason(candidate.finish_reason.as_deref());
        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::ContentFiltered);
        }

        // Replies can be split across several parts.
        let text: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let usage = api_response.usage_metadata.unwrap_or_default();

        Ok(ProviderResponse {
            text,
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            finish_reason,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        // Try to list models to verify API key works
        let url = format!(
            "{}/models?key={}",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    /// Serve a canned `generateContent` reply on a random local port.
    async fn spawn_fake_gemini(status: StatusCode, body: Value) -> String {
        let app = Router::new().route(
            "/models/:action",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{}", addr)
    }

    fn provider(api_base: String) -> GeminiChatProvider {
        GeminiChatProvider::new(GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_base,
        })
        .unwrap()
    }

    #[test]
    fn request_carries_history_system_instruction_and_sampling() {
        let history = vec![
            Turn::user("first question"),
            Turn::model("first answer"),
            Turn::user("second question"),
        ];
        let params = GenerationParams {
            top_k: Some(0),
            ..Default::default()
        };

        let request = GeminiChatProvider::build_request("schema text", &history, &params);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"].as_array().unwrap().len(), 3);
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["contents"][2]["parts"][0]["text"], "second question");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "schema text");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4096);
        assert!(value["generationConfig"].get("topK").is_none());
    }

    #[test]
    fn api_url_embeds_model_and_key() {
        let provider = provider("http://localhost:1/".to_string());
        assert_eq!(
            provider.api_url("generateContent"),
            "http://localhost:1/models/gemini-1.5-flash:generateContent?key=test-key"
        );
    }

    #[tokio::test]
    async fn generate_joins_text_parts() {
        let base = spawn_fake_gemini(
            StatusCode::OK,
            json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
            }),
        )
        .await;

        let response = provider(base)
            .generate("", &[Turn::user("hi")], &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(response.text, "Hello, world");
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.output_tokens, 3);
        assert_eq!(response.finish_reason, FinishReason::Complete);
    }

    #[tokio::test]
    async fn rate_limit_status_maps_to_rate_limited() {
        let base = spawn_fake_gemini(StatusCode::TOO_MANY_REQUESTS, json!({})).await;

        let err = provider(base)
            .generate("", &[Turn::user("hi")], &GenerationParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn safety_finish_reason_is_content_filtered() {
        let base = spawn_fake_gemini(
            StatusCode::OK,
            json!({"candidates": [{"finishReason": "SAFETY"}]}),
        )
        .await;

        let err = provider(base)
            .generate("", &[Turn::user("hi")], &GenerationParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::ContentFiltered));
    }

    #[tokio::test]
    async fn missing_api_key_is_not_configured() {
        let provider = GeminiChatProvider::new(GeminiConfig {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            api_base: GEMINI_API_BASE.to_string(),
        })
        .unwrap();

        let err = provider
            .generate("", &[Turn::user("hi")], &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
