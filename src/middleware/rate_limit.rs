use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    config::{Config, EnvMode},
    error::AppError,
    rate_limit::{Decision, RateLimitStore},
    utils::unix_now,
};

/// Paths that never count against a client's budget.
pub const EXEMPT_PATHS: [&str; 4] = ["/", "/api/health", "/docs", "/openapi.json"];

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    env_mode: EnvMode,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, config: &Config) -> Self {
        Self {
            store,
            env_mode: config.env_mode,
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }

    pub fn is_exempt(path: &str) -> bool {
        EXEMPT_PATHS.contains(&path)
    }

    /// Client key for the ledger. Forwarding headers are only consulted when
    /// the service runs behind a trusted proxy. Of `x-forwarded-for`, only the
    /// rightmost entry counts: the proxy appends it, everything left of it is
    /// client-supplied.
    pub fn client_ip(&self, req: &Request<Body>) -> String {
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        let forwarded = if self.trust_proxy_headers {
            req.headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .or_else(|| {
                    req.headers()
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.rsplit(',').find(|ip| !ip.trim().is_empty()))
                })
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        } else {
            None
        };

        forwarded
            .or(remote_ip)
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, AppError> {
        if Self::is_exempt(req.uri().path()) || self.env_mode == EnvMode::Local {
            return Ok(next.run(req).await);
        }

        let ip = self.client_ip(&req);
        let decision = self.store.check(&ip, unix_now()).await.map_err(|e| {
            tracing::error!("Rate limit store failed for {}: {}", ip, e);
            AppError::Internal("Rate limiter unavailable".to_string())
        })?;

        match decision {
            Decision::Allowed => Ok(next.run(req).await),
            Decision::Limited { retry_after } => {
                tracing::warn!(
                    ip = %ip,
                    path = %req.uri().path(),
                    retry_after,
                    "rate limit exceeded"
                );
                Err(AppError::RateLimited { retry_after })
            }
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    limiter.check_rate_limit(req, next).await
}
