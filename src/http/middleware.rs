//! HTTP middleware

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, info, warn};

/// Request logging middleware: method, uri, status and latency
pub async fn request_logger(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        error!(%method, %uri, status = status.as_u16(), ?latency, "request failed");
    } else if status.is_client_error() {
        warn!(%method, %uri, status = status.as_u16(), ?latency, "request rejected");
    } else {
        info!(%method, %uri, status = status.as_u16(), ?latency, "request served");
    }

    response
}
