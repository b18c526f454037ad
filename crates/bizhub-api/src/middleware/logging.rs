//! Request/response logging middleware.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

use crate::extractors::actor::{DEVICE_HEADER, USERNAME_HEADER};

/// Logs request method, path, actor, status and duration.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let username = request
        .headers()
        .get(USERNAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let device = request
        .headers()
        .get(DEVICE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        warn!(%method, %path, %username, %device, status = status.as_u16(), duration_ms, "HTTP request failed");
    } else {
        info!(%method, %path, %username, %device, status = status.as_u16(), duration_ms, "HTTP request");
    }

    response
}
