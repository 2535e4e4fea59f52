pub mod database;
pub mod metrics;
pub mod orchestrator;
pub mod providers;
pub mod response_parser;
pub mod schema;
pub mod session;
pub mod sql_guard;

pub use database::AssistantDb;
pub use orchestrator::{QueryOrchestrator, FALLBACK_MESSAGE};
pub use session::ConversationSession;
pub use sql_guard::{ExecutionMode, SqlGuard};
