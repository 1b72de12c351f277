//! Request logging.

use crate::error::FailureDetail;
use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{error, info, warn};

/// Log one line per API request: method, path and status, plus the failure
/// cause for 4xx/5xx responses.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    let status = response.status();
    let cause = response
        .extensions()
        .get::<FailureDetail>()
        .map(|detail| detail.0.as_str());

    if status.is_server_error() {
        error!(%method, %path, status = status.as_u16(), error = cause, "API request");
    } else if status.is_client_error() {
        warn!(%method, %path, status = status.as_u16(), error = cause, "API request");
    } else {
        info!(%method, %path, status = status.as_u16(), "API request");
    }

    response
}
