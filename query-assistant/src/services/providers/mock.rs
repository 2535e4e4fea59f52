//! Scripted provider for testing.

use super::{ChatProvider, FinishReason, GenerationParams, ProviderError, ProviderResponse};
use crate::models::Turn;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// What the mock should do on its next call.
#[derive(Debug)]
pub enum ScriptedReply {
    Text(String),
    NetworkError(String),
    RateLimited,
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_instruction: String,
    pub history: Vec<Turn>,
}

/// Mock chat provider that replays a fixed script and records every request.
///
/// Once the script runs out every call fails with `NotConfigured`.
#[derive(Default)]
pub struct MockChatProvider {
    script: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue plain-text replies, returned in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for reply in replies {
            mock.push(ScriptedReply::Text(reply.into()));
        }
        mock
    }

    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.push(ScriptedReply::Text(text.into()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

/// Wrap a JSON payload in the fenced block the assistant expects.
pub fn fenced_json(payload: &serde_json::Value) -> String {
    format!("Here you go:\n```json\n{}\n```", payload)
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        system_instruction: &str,
        history: &[Turn],
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system_instruction: system_instruction.to_string(),
                history: history.to_vec(),
            });
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());

        match next {
            Some(ScriptedReply::Text(text)) => Ok(ProviderResponse {
                input_tokens: history.iter().map(|t| t.content.len() as i32 / 4).sum(),
                output_tokens: text.len() as i32 / 4,
                text,
                finish_reason: FinishReason::Complete,
            }),
            Some(ScriptedReply::NetworkError(msg)) => Err(ProviderError::NetworkError(msg)),
            Some(ScriptedReply::RateLimited) => Err(ProviderError::RateLimited),
            None => Err(ProviderError::NotConfigured(
                "Mock provider script exhausted".to_string(),
            )),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
