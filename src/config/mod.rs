use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_FAL_QUEUE_URL: &str = "https://queue.fal.run";
pub const DEFAULT_FAL_RUN_URL: &str = "https://fal.run";
pub const DEFAULT_LLM_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Deployment flavour. Only `Local` changes behaviour: it disables rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Local,
    Staging,
    Production,
}

impl EnvMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvMode::Local => "local",
            EnvMode::Staging => "staging",
            EnvMode::Production => "production",
        }
    }
}

impl fmt::Display for EnvMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(EnvMode::Local),
            "staging" => Ok(EnvMode::Staging),
            "production" => Ok(EnvMode::Production),
            other => Err(ConfigError::Invalid {
                name: "ENV_MODE",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory,
    Redis,
}

impl FromStr for RateLimitBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(RateLimitBackend::Memory),
            "redis" => Ok(RateLimitBackend::Redis),
            other => Err(ConfigError::Invalid {
                name: "RATE_LIMIT_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env_mode: EnvMode,
    pub instance_id: String,
    pub server_host: String,
    pub server_port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_init_timeout_secs: u64,
    pub db_connect_timeout_secs: u64,
    pub db_init_attempts: u32,
    pub rate_limit_requests: usize,
    pub rate_limit_window_secs: u64,
    pub rate_limit_backend: RateLimitBackend,
    pub redis_url: Option<String>,
    pub trust_proxy_headers: bool,
    pub fal_key: Option<String>,
    pub selected_media_model: Option<String>,
    pub fal_queue_url: String,
    pub fal_run_url: String,
    pub fal_poll_interval_ms: u64,
    pub media_download_timeout_secs: u64,
    pub llm_api_base: String,
    pub llm_api_key: Option<String>,
    pub thread_name_model: String,
    pub sandbox_api_url: Option<String>,
    pub sandbox_api_key: Option<String>,
    pub sandbox_id: Option<String>,
    pub workspace_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_mode: EnvMode::Local,
            instance_id: "single".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            database_url: None,
            db_max_connections: 10,
            db_init_timeout_secs: 10,
            db_connect_timeout_secs: 30,
            db_init_attempts: 5,
            rate_limit_requests: 60,
            rate_limit_window_secs: 60,
            rate_limit_backend: RateLimitBackend::Memory,
            redis_url: None,
            trust_proxy_headers: false,
            fal_key: None,
            selected_media_model: None,
            fal_queue_url: DEFAULT_FAL_QUEUE_URL.to_string(),
            fal_run_url: DEFAULT_FAL_RUN_URL.to_string(),
            fal_poll_interval_ms: 500,
            media_download_timeout_secs: 30,
            llm_api_base: DEFAULT_LLM_API_BASE.to_string(),
            llm_api_key: None,
            thread_name_model: "gpt-4o-mini".to_string(),
            sandbox_api_url: None,
            sandbox_api_key: None,
            sandbox_id: None,
            workspace_dir: None,
        }
    }
}

/// Non-empty, trimmed value of an environment variable.
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

fn flag(name: &'static str) -> Result<bool, ConfigError> {
    match var(name).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(value) => Err(ConfigError::Invalid { name, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            env_mode: parse_or("ENV_MODE", defaults.env_mode)?,
            instance_id: var("INSTANCE_ID").unwrap_or(defaults.instance_id),
            server_host: var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or("SERVER_PORT", defaults.server_port)?,
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_init_timeout_secs: parse_or("DB_INIT_TIMEOUT_SECS", defaults.db_init_timeout_secs)?,
            db_connect_timeout_secs: parse_or(
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.db_connect_timeout_secs,
            )?,
            db_init_attempts: parse_or("DB_INIT_ATTEMPTS", defaults.db_init_attempts)?,
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", defaults.rate_limit_window_secs)?,
            rate_limit_backend: parse_or("RATE_LIMIT_BACKEND", defaults.rate_limit_backend)?,
            redis_url: var("REDIS_URL"),
            trust_proxy_headers: flag("TRUST_PROXY_HEADERS")?,
            fal_key: var("FAL_KEY"),
            selected_media_model: var("SELECTED_MEDIA_MODEL"),
            fal_queue_url: var("FAL_QUEUE_URL").unwrap_or(defaults.fal_queue_url),
            fal_run_url: var("FAL_RUN_URL").unwrap_or(defaults.fal_run_url),
            fal_poll_interval_ms: parse_or("FAL_POLL_INTERVAL_MS", defaults.fal_poll_interval_ms)?,
            media_download_timeout_secs: parse_or(
                "MEDIA_DOWNLOAD_TIMEOUT_SECS",
                defaults.media_download_timeout_secs,
            )?,
            llm_api_base: var("LLM_API_BASE").unwrap_or(defaults.llm_api_base),
            llm_api_key: var("OPENAI_API_KEY"),
            thread_name_model: var("THREAD_NAME_MODEL").unwrap_or(defaults.thread_name_model),
            sandbox_api_url: var("SANDBOX_API_URL"),
            sandbox_api_key: var("SANDBOX_API_KEY"),
            sandbox_id: var("SANDBOX_ID"),
            workspace_dir: var("WORKSPACE_DIR").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but cannot work: an empty window or budget,
    /// and zero database connect timeouts or attempts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("RATE_LIMIT_REQUESTS", self.rate_limit_requests as u64),
            ("RATE_LIMIT_WINDOW", self.rate_limit_window_secs),
            ("DB_CONNECT_TIMEOUT_SECS", self.db_connect_timeout_secs),
            ("DB_INIT_ATTEMPTS", u64::from(self.db_init_attempts)),
        ];
        match positive.into_iter().find(|(_, value)| *value == 0) {
            Some((name, value)) => Err(ConfigError::Invalid {
                name,
                value: value.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn db_init_timeout(&self) -> Duration {
        Duration::from_secs(self.db_init_timeout_secs)
    }

    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }

    pub fn media_download_timeout(&self) -> Duration {
        Duration::from_secs(self.media_download_timeout_secs)
    }

    pub fn fal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fal_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_mode_parses_case_insensitively() {
        assert_eq!("LOCAL".parse::<EnvMode>().unwrap(), EnvMode::Local);
        assert_eq!(" production ".parse::<EnvMode>().unwrap(), EnvMode::Production);
        assert!("dev".parse::<EnvMode>().is_err());
    }

    #[test]
    fn defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.rate_limit_requests, 60);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(config.instance_id, "single");
        assert_eq!(config.env_mode.to_string(), "local");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_window_or_budget_is_rejected() {
        let zero_window = Config {
            rate_limit_window_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            zero_window.validate(),
            Err(ConfigError::Invalid { name: "RATE_LIMIT_WINDOW", .. })
        ));

        let zero_requests = Config {
            rate_limit_requests: 0,
            ..Config::default()
        };
        assert!(matches!(
            zero_requests.validate(),
            Err(ConfigError::Invalid { name: "RATE_LIMIT_REQUESTS", .. })
        ));
    }
}
