//! Admission middleware for axum routers.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/work", post(handler))
//!     .route_layer(axum::middleware::from_fn_with_state(limiter, limit_concurrency));
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::limiter::ConcurrencyLimiter;

#[derive(Debug, Serialize)]
pub struct RejectionResponse {
    pub error: String,
}

/// Run the inner service only once the limiter admits the request.
///
/// Rejected requests get the limiter's rejection status and never reach the
/// inner service. Admitted requests hold their lease until the inner service
/// returns, so the turn is given back exactly once whatever the outcome.
pub async fn limit_concurrency(
    State(limiter): State<Arc<ConcurrencyLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(lease) = limiter.enter().await else {
        return rejection(limiter.rejection_status());
    };

    let response = next.run(request).await;
    drop(lease);
    response
}

fn rejection(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or_else(|_| {
        tracing::warn!(status, "Invalid rejection status, falling back to 503");
        StatusCode::SERVICE_UNAVAILABLE
    });
    (
        status,
        Json(RejectionResponse {
            error: "Server is at capacity, try again later".to_string(),
        }),
    )
        .into_response()
}
