mod handler;
mod model;

pub use handler::generate_name;
pub use model::{ThreadNameRequest, ThreadNameResponse, fallback_name};
