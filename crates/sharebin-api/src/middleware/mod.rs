pub mod client_ip;
pub mod error_details;
pub mod rate_limit;

pub use error_details::redact_error_details;
pub use rate_limit::{rate_limit_middleware, HttpRateLimiter};
