//! Domain models for the query assistant.

pub mod answer;
pub mod envelope;
pub mod turn;

pub use answer::{Answer, QueryRows};
pub use envelope::{QueryEnvelope, SummaryEnvelope};
pub use turn::{Role, Turn};
