//! Result of answering one question.

use serde::Serialize;
use serde_json::Value;

/// Rows returned by the database for a generated query.
///
/// Each cell is the JSON rendering of the SQLite value: integers and reals
/// as numbers, text as strings, NULL as null and blobs as base64 strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize only the row tuples, e.g. `[[300024]]`.
    pub fn rows_json(&self) -> String {
        Value::Array(self.rows.iter().cloned().map(Value::Array).collect()).to_string()
    }
}

/// The message shown to the user plus the raw rows behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub message: String,

    #[serde(flatten)]
    pub data: QueryRows,
}

impl Answer {
    pub fn new(message: String, data: QueryRows) -> Self {
        Self { message, data }
    }

    /// Answer returned once every attempt has failed. Carries no rows.
    pub fn fallback(message: &str) -> Self {
        Self {
            message: message.to_string(),
            data: QueryRows::default(),
        }
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.data.rows
    }
}
