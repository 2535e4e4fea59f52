//! service-core: Shared infrastructure for the query assistant services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
