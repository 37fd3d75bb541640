use std::time::Instant;

use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{error, info};

const MAX_LOGGED_BODY: usize = 4096;

/// Access log for every request. Server errors also get the first
/// `MAX_LOGGED_BODY` bytes of their body logged; the client still receives
/// the whole body.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if !status.is_server_error() {
        info!(%method, %path, status = status.as_u16(), elapsed_ms, "request");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!(%method, %path, status = status.as_u16(), "unreadable error body: {}", e);
            parts.headers.remove(axum::http::header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    error!(
        %method,
        %path,
        status = status.as_u16(),
        elapsed_ms,
        body = %String::from_utf8_lossy(&bytes[..bytes.len().min(MAX_LOGGED_BODY)]),
        "server error"
    );

    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
