//! Two-phase question answering: generate SQL, run it, summarize the rows.
//!
//! ```text
//! question ──► model (SQL envelope) ──► guard ──► database ──► model (summary envelope) ──► answer
//! ```
//!
//! Any failure along the way (provider error, malformed reply, rejected or
//! failing SQL) costs one attempt. Attempts resume from the phase that failed:
//! once the SQL has run, its rows are kept and only the summary is retried, so
//! a statement is never executed twice for one question. When the attempt
//! budget is spent the caller gets [`FALLBACK_MESSAGE`] and no rows.

use super::database::AssistantDb;
use super::metrics;
use super::providers::ProviderError;
use super::response_parser::{parse_envelope, ParseError};
use super::session::ConversationSession;
use super::sql_guard::{GuardError, SqlGuard};
use crate::models::{Answer, QueryEnvelope, QueryRows, SummaryEnvelope, Turn};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

pub const FALLBACK_MESSAGE: &str = "Sorry, we couldn't fetch information.";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Why a single attempt failed. Never surfaced to the caller.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("model provider failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed model reply: {0}")]
    Parse(#[from] ParseError),

    #[error("generated SQL rejected: {0}")]
    Guard(#[from] GuardError),

    #[error("query execution failed: {0}")]
    Database(#[from] sqlx::Error),
}

impl AssistantError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AssistantError::Provider(_) => "provider",
            AssistantError::Parse(_) => "parse",
            AssistantError::Guard(_) => "guard",
            AssistantError::Database(_) => "database",
        }
    }
}

pub fn sql_generation_prompt(question: &str) -> String {
    format!(
        r#"Make an sql query for the question: {question}
Give the result in below json format, inside a ```json fenced code block
{{
    "sqlQuery": "string",
    "description": "string"
}}"#
    )
}

pub fn summary_prompt(rows_json: &str) -> String {
    format!(
        r#"The result of the query is: {rows_json}

----
Now give user a pretty message with the below json format, inside a ```json fenced code block
{{
    "message": "string"
}}"#
    )
}

pub struct QueryOrchestrator {
    session: Mutex<ConversationSession>,
    db: AssistantDb,
    guard: SqlGuard,
    max_attempts: u32,
}

impl QueryOrchestrator {
    pub fn new(session: ConversationSession, db: AssistantDb, guard: SqlGuard) -> Self {
        Self {
            session: Mutex::new(session),
            db,
            guard,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Total attempts per question, including the first. At least 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Answer `question`, falling back to [`FALLBACK_MESSAGE`] when every
    /// attempt fails.
    ///
    /// Questions are answered one at a time; concurrent callers wait for the
    /// conversation lock.
    #[tracing::instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn ask(&self, question: &str) -> Answer {
        let started = Instant::now();
        let mut session = self.session.lock().await;
        let mut executed: Option<QueryRows> = None;

        for attempt in 1..=self.max_attempts {
            match self.attempt(&mut session, question, &mut executed).await {
                Ok(answer) => {
                    metrics::record_question("answered", started.elapsed().as_secs_f64());
                    tracing::info!(
                        attempt,
                        rows = answer.data.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Question answered"
                    );
                    return answer;
                }
                Err(e) if attempt < self.max_attempts => {
                    metrics::record_attempt_failure(e.reason());
                    tracing::warn!(attempt, error = %e, "Attempt failed, retrying");
                }
                Err(e) => {
                    metrics::record_attempt_failure(e.reason());
                    tracing::error!(attempt, error = %e, "Attempt failed, no more retries");
                }
            }
        }

        metrics::record_question("fallback", started.elapsed().as_secs_f64());
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Returning fallback answer"
        );
        Answer::fallback(FALLBACK_MESSAGE)
    }

    async fn attempt(
        &self,
        session: &mut ConversationSession,
        question: &str,
        executed: &mut Option<QueryRows>,
    ) -> Result<Answer, AssistantError> {
        let data = match executed.take() {
            Some(data) => data,
            None => self.generate_and_execute(session, question).await?,
        };

        match self.summarize(session, &data).await {
            Ok(message) => Ok(Answer::new(message, data)),
            Err(e) => {
                *executed = Some(data);
                Err(e)
            }
        }
    }

    async fn generate_and_execute(
        &self,
        session: &mut ConversationSession,
        question: &str,
    ) -> Result<QueryRows, AssistantError> {
        let reply = session.send(&sql_generation_prompt(question)).await?;
        let envelope: QueryEnvelope = parse_envelope(&reply)?;

        tracing::debug!(
            sql = %envelope.sql_query,
            description = %envelope.description,
            "Model generated SQL"
        );

        let sql = self.guard.check(&envelope.sql_query)?;
        let data = self.db.execute(sql).await?;

        tracing::debug!(rows = data.len(), "Query executed");
        Ok(data)
    }

    async fn summarize(
        &self,
        session: &mut ConversationSession,
        data: &QueryRows,
    ) -> Result<String, AssistantError> {
        let reply = session.send(&summary_prompt(&data.rows_json())).await?;
        let envelope: SummaryEnvelope = parse_envelope(&reply)?;
        Ok(envelope.message)
    }

    /// Snapshot of the conversation so far.
    pub async fn history(&self) -> Vec<Turn> {
        self.session.lock().await.turns().to_vec()
    }

    /// Forget the conversation so far.
    pub async fn reset(&self) {
        self.session.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_prompt_embeds_question_and_envelope_shape() {
        let prompt = sql_generation_prompt("How many employees are there?");
        assert!(prompt.contains("question: How many employees are there?"));
        assert!(prompt.contains("\"sqlQuery\": \"string\""));
        assert!(prompt.contains("\"description\": \"string\""));
        assert!(prompt.contains("```json"));
    }

    #[test]
    fn summary_prompt_embeds_rows() {
        let prompt = summary_prompt("[[300024]]");
        assert!(prompt.starts_with("The result of the query is: [[300024]]"));
        assert!(prompt.contains("\"message\": \"string\""));
    }
}
