use crate::models::Answer;
use crate::startup::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// `POST /v1/ask`
///
/// Always answers 200 once the question is accepted; a question the assistant
/// could not handle comes back as the fallback message with no rows.
#[tracing::instrument(skip(state, request))]
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("question is required")));
    }

    let answer = state.orchestrator.ask(question).await;
    Ok(Json(answer))
}
