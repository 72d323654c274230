pub mod evaluate;
pub mod health;
pub mod history;
pub mod ingest;
pub mod query;
pub mod sessions;

pub use evaluate::evaluate_handler;
pub use health::{health_check, liveness_check, readiness_check};
pub use history::history_handler;
pub use ingest::ingest_handler;
pub use query::query_handler;
pub use sessions::{delete_session_handler, list_sessions_handler};
