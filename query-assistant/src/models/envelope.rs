//! Structured payloads the model is asked to embed in its replies.

use serde::{Deserialize, Serialize};

/// Reply to the SQL generation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEnvelope {
    pub sql_query: String,

    /// Free-text explanation of the query. Only logged.
    #[serde(default)]
    pub description: String,
}

/// Reply to the summarization prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEnvelope {
    pub message: String,
}
