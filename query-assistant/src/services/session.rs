//! Stateful conversation with the model.

use super::metrics;
use super::providers::{ChatProvider, GenerationParams, ProviderError};
use crate::models::Turn;
use std::sync::Arc;
use std::time::Instant;

/// An append-only chat with a fixed system instruction and sampling config.
///
/// Every [`send`](Self::send) resubmits the retained history, so later prompts
/// can refer to earlier questions and results. With a non-zero
/// `history_window` the oldest turns are evicted in user/model pairs once the
/// log grows past it.
pub struct ConversationSession {
    provider: Arc<dyn ChatProvider>,
    system_instruction: String,
    params: GenerationParams,
    history_window: usize,
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        system_instruction: String,
        params: GenerationParams,
    ) -> Self {
        Self {
            provider,
            system_instruction,
            params,
            history_window: 0,
            turns: Vec::new(),
        }
    }

    /// Keep at most `turns` turns of history; 0 keeps everything.
    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    /// Send `prompt` and return the model's reply.
    ///
    /// The prompt and reply are added to the history together once the
    /// provider answers. On a provider error the history is left unchanged.
    pub async fn send(&mut self, prompt: &str) -> Result<String, ProviderError> {
        let mut request = Vec::with_capacity(self.turns.len() + 1);
        request.extend_from_slice(&self.turns);
        request.push(Turn::user(prompt));

        let model = self.provider.model_name();
        let started = Instant::now();
        let response = self
            .provider
            .generate(&self.system_instruction, &request, &self.params)
            .await
            .map_err(|e| {
                metrics::record_provider_error(model, e.kind());
                e
            })?;

        metrics::record_provider_latency(model, started.elapsed().as_secs_f64());
        metrics::record_tokens(model, response.input_tokens, response.output_tokens);

        tracing::debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            finish_reason = ?response.finish_reason,
            "Model turn completed"
        );

        if let Some(prompt_turn) = request.pop() {
            self.turns.push(prompt_turn);
        }
        self.turns.push(Turn::model(response.text.clone()));
        self.evict();

        Ok(response.text)
    }

    fn evict(&mut self) {
        if self.history_window == 0 || self.turns.len() <= self.history_window {
            return;
        }
        let excess = self.turns.len() - self.history_window;
        let drop = (excess + excess % 2).min(self.turns.len());
        self.turns.drain(..drop);
        tracing::debug!(evicted = drop, retained = self.turns.len(), "Trimmed conversation history");
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
