pub mod error;
pub mod limiters;
pub mod similarity;
pub mod token_estimator;

pub use error::{ApiError, Dependency};
pub use similarity::cosine_similarity;
