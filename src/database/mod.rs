pub mod chunk_store_impl;
pub mod pool;
pub mod vector_index_impl;

pub use chunk_store_impl::PgChunkStore;
pub use pool::DbPool;
pub use vector_index_impl::PgVectorIndex;
