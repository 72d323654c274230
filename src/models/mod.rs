pub mod document;
pub mod ingest;
pub mod query;
pub mod session;

pub use document::{Chunk, Document, PiiCategory};
pub use ingest::{DocStatus, IngestResponse};
pub use query::{Citation, LatencyBreakdown, QueryResult, TokenUsage};
pub use session::{Message, Role, Session, SessionMeta};
