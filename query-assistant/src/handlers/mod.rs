//! HTTP handlers for the query assistant.

pub mod ask;
pub mod health;
pub mod metrics;
