pub mod operations;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlx::Executor;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database is not configured")]
    NotConfigured,
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Lazily connected Postgres pool plus the readiness flag the API reports.
///
/// Without `DATABASE_URL` the service still comes up: `initialize` marks it
/// ready and every `pool()` call reports `NotConfigured`. Once
/// `initialize_with_retry` gives up the database is marked failed for good.
pub struct Database {
    url: Option<String>,
    max_connections: u32,
    connect_timeout: Duration,
    pool: RwLock<Option<PgPool>>,
    initialized: AtomicBool,
    failed: AtomicBool,
}

impl Database {
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.database_url.clone(),
            max_connections: config.db_max_connections,
            connect_timeout: config.db_connect_timeout(),
            pool: RwLock::new(None),
            initialized: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub async fn initialize(&self) -> Result<(), DatabaseError> {
        if self.is_initialized() {
            return Ok(());
        }

        let Some(url) = self.url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; running without a database");
            self.initialized.store(true, Ordering::Release);
            return Ok(());
        };

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'media_gateway';")
                        .await?;
                    Ok(())
                })
            })
            .connect(url)
            .await?;

        *self.pool.write().await = Some(pool);
        self.initialized.store(true, Ordering::Release);
        tracing::info!("Database pool initialized");
        Ok(())
    }

    /// Up to `attempts` tries, doubling the delay between them (capped at 30s).
    /// Exhausting them marks the database failed.
    pub async fn initialize_with_retry(
        &self,
        attempts: u32,
        base_delay: Duration,
    ) -> Result<(), DatabaseError> {
        let attempts = attempts.max(1);
        let mut delay = base_delay;
        let mut attempt = 1;
        loop {
            match self.initialize().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        attempts,
                        "Database initialization failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    attempt += 1;
                }
                Err(e) => {
                    self.failed.store(true, Ordering::Release);
                    return Err(e);
                }
            }
        }
    }

    pub async fn pool(&self) -> Result<PgPool, DatabaseError> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or(DatabaseError::NotConfigured)
    }

    pub async fn disconnect(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            tracing::info!("Database pool closed");
        }
        self.initialized.store(false, Ordering::Release);
    }
}
