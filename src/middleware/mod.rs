//! Request-pipeline middleware.

mod rate_limit;
mod request_id;

pub use rate_limit::{rate_limit_middleware, RateLimitError};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
