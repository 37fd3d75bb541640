use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use media_gateway::{
    AppState,
    config::{Config, EnvMode, RateLimitBackend},
    database::Database,
    llm::OpenAiCompatibleClient,
    middleware::RateLimiter,
    rate_limit::{MemoryStore, RateLimitStore, RedisStore, WindowPolicy},
    router::create_router,
    sandbox,
    tools::{FalMediaTool, Tool},
};
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DB_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

fn rate_limit_store(config: &Config) -> Arc<dyn RateLimitStore> {
    let policy = WindowPolicy::from_config(config);
    match (config.rate_limit_backend, config.redis_url.as_deref()) {
        (RateLimitBackend::Redis, Some(url)) => Arc::new(
            RedisStore::open(url, policy).expect("Failed to create Redis client"),
        ) as Arc<dyn RateLimitStore>,
        (backend, _) => {
            if backend == RateLimitBackend::Redis {
                tracing::warn!("RATE_LIMIT_BACKEND=redis but REDIS_URL is not set; using memory");
            }
            let store = Arc::new(MemoryStore::new(policy));
            store.spawn_sweeper(config.rate_limit_window());
            store
        }
    }
}

/// Resolves on ctrl-c, or when database initialization has given up.
async fn shutdown_signal(db_failed: oneshot::Receiver<()>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        }
        Ok(()) = db_failed => {
            tracing::error!("Shutting down: database is unavailable");
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env().expect("Failed to load configuration"));
    tracing::info!(
        environment = %config.env_mode,
        instance = %config.instance_id,
        "Starting media gateway"
    );
    if config.env_mode == EnvMode::Local {
        tracing::info!("Local environment: rate limiting disabled");
    }
    if config.fal_key.is_none() {
        tracing::warn!("FAL_KEY not set; media generation calls will fail");
    }
    let workspace = sandbox::from_config(&config).expect("Invalid sandbox configuration");
    let media_tool = FalMediaTool::from_config(&config, workspace.clone());
    tracing::info!(
        tool = media_tool.name(),
        workspace = workspace.is_some(),
        "Media generation tool configured"
    );

    // The server accepts connections immediately; requests wait on the
    // readiness gate until the pool is up.
    let db = Arc::new(Database::new(&config));
    let (db_failed_tx, db_failed_rx) = oneshot::channel();
    {
        let db = Arc::clone(&db);
        let attempts = config.db_init_attempts;
        tokio::spawn(async move {
            if let Err(e) = db.initialize_with_retry(attempts, DB_RETRY_BASE_DELAY).await {
                tracing::error!("Database initialization failed after {} attempts: {}", attempts, e);
                let _ = db_failed_tx.send(());
            }
        });
    }

    let state = AppState {
        config: Arc::clone(&config),
        db: Arc::clone(&db),
        llm: Arc::new(OpenAiCompatibleClient::from_config(&config)),
    };
    let limiter = Arc::new(RateLimiter::new(rate_limit_store(&config), &config));
    let app = create_router(state, limiter);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(db_failed_rx))
    .await
    .expect("Failed to start server");

    db.disconnect().await;
    if db.has_failed() {
        std::process::exit(1);
    }
}
