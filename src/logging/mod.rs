//! Non-blocking activity logging: a bounded in-memory ring with background
//! drain, generalized from a Postgres-specific batch sink to an exporter-
//! agnostic one per §5's "write-only, must not block the hot path" rule.

mod logger;
pub mod types;

pub use logger::{ActivityLogger, LoggerConfig};
pub use types::{ActivityKind, ActivityRecord};
