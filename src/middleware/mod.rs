mod db_ready;
mod error_handler;
mod rate_limit;

pub use db_ready::require_database;
pub use error_handler::log_errors;
pub use rate_limit::{EXEMPT_PATHS, RateLimiter, rate_limit};
