//! Extraction of structured envelopes from free-form model replies.
//!
//! The model is asked to answer with a JSON object inside a ```` ```json ````
//! fenced block. Only the first such block counts; text around it is ignored.

use serde::de::DeserializeOwned;
use thiserror::Error;

const OPENING_FENCE: &str = "```json";
const CLOSING_FENCE: &str = "```";

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("reply has no ```json fenced block")]
    MissingFence,

    #[error("fenced block is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("JSON does not match the expected envelope: {0}")]
    SchemaMismatch(#[source] serde_json::Error),
}

/// Return the body of the first ```` ```json ```` block, without the fences.
///
/// The opening marker is matched case-insensitively. A block with no closing
/// fence counts as missing.
pub fn extract_fenced_json(reply: &str) -> Result<&str, ParseError> {
    let start = reply
        .to_ascii_lowercase()
        .find(OPENING_FENCE)
        .ok_or(ParseError::MissingFence)?
        + OPENING_FENCE.len();

    let body = &reply[start..];
    let end = body.find(CLOSING_FENCE).ok_or(ParseError::MissingFence)?;

    Ok(body[..end].trim())
}

/// Parse the first fenced block of `reply` as `T`.
pub fn parse_envelope<T: DeserializeOwned>(reply: &str) -> Result<T, ParseError> {
    let body = extract_fenced_json(reply)?;
    let value: serde_json::Value = serde_json::from_str(body).map_err(ParseError::InvalidJson)?;
    serde_json::from_value(value).map_err(ParseError::SchemaMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QueryEnvelope, SummaryEnvelope};

    #[test]
    fn parses_query_envelope() {
        let reply = "Sure!\n```json\n{\n  \"sqlQuery\": \"SELECT COUNT(*) FROM employees\",\n  \"description\": \"Counts employees\"\n}\n```\nLet me know.";

        let envelope: QueryEnvelope = parse_envelope(reply).unwrap();
        assert_eq!(envelope.sql_query, "SELECT COUNT(*) FROM employees");
        assert_eq!(envelope.description, "Counts employees");
    }

    #[test]
    fn only_first_block_counts() {
        let reply = "```json\n{\"message\": \"first\"}\n```\n```json\n{\"message\": \"second\"}\n```";
        let envelope: SummaryEnvelope = parse_envelope(reply).unwrap();
        assert_eq!(envelope.message, "first");
    }

    #[test]
    fn opening_marker_is_case_insensitive() {
        let reply = "```JSON\n{\"message\": \"hi\"}\n```";
        let envelope: SummaryEnvelope = parse_envelope(reply).unwrap();
        assert_eq!(envelope.message, "hi");
    }

    #[test]
    fn bare_json_is_missing_fence() {
        let err = parse_envelope::<SummaryEnvelope>("{\"message\": \"hi\"}").unwrap_err();
        assert!(matches!(err, ParseError::MissingFence));
    }

    #[test]
    fn unterminated_block_is_missing_fence() {
        let err = parse_envelope::<SummaryEnvelope>("```json\n{\"message\": \"hi\"}").unwrap_err();
        assert!(matches!(err, ParseError::MissingFence));
    }

    #[test]
    fn broken_json_is_invalid_json() {
        let err = parse_envelope::<SummaryEnvelope>("```json\n{\"message\": \n```").unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn wrong_shape_is_schema_mismatch() {
        let err =
            parse_envelope::<QueryEnvelope>("```json\n{\"query\": \"SELECT 1\"}\n```").unwrap_err();
        assert!(matches!(err, ParseError::SchemaMismatch(_)));
    }
}
