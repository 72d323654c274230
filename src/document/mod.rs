pub mod chunker;
pub mod parser;
pub mod pii;

pub use chunker::{Chunk, ChunkerOptions, SentenceEmbedder, TextChunker};
pub use parser::{normalize_text, DocumentParser, ParsedDocument};
pub use pii::{PiiDetection, PiiRedactor, PiiSpan};
