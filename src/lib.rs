use std::sync::Arc;

use config::Config;
use database::Database;
use llm::LlmClient;

pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod sandbox;
pub mod tools;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub llm: Arc<dyn LlmClient>,
}
