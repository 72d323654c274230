pub mod auth;
pub mod request_id;

pub use auth::{AuthenticatedUser, Role};
pub use request_id::{request_id_middleware, RequestId};
