//! HTTP route handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    middleware,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::middleware::limit_concurrency;
use crate::limiter::{ConcurrencyLimiter, LimiterSnapshot};

/// Upper bound on simulated work per request.
const MAX_WORK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimiterHealth {
    /// Turns available
    Ready,
    /// Every turn taken; new requests wait or are rejected
    Busy,
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: LimiterHealth,
    #[serde(flatten)]
    pub snapshot: LimiterSnapshot,
}

impl HealthCheckResponse {
    pub fn from_snapshot(snapshot: LimiterSnapshot) -> Self {
        let status = if snapshot.is_busy() {
            LimiterHealth::Busy
        } else {
            LimiterHealth::Ready
        };
        Self { status, snapshot }
    }
}

#[derive(Debug, Deserialize)]
struct WorkParams {
    #[serde(default)]
    ms: u64,
}

#[derive(Debug, Serialize)]
struct WorkResponse {
    worked_ms: u64,
}

async fn health_check(State(limiter): State<Arc<ConcurrencyLimiter>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse::from_snapshot(limiter.snapshot()))
}

async fn work(Query(params): Query<WorkParams>) -> Json<WorkResponse> {
    let duration = Duration::from_millis(params.ms).min(MAX_WORK);
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
    Json(WorkResponse {
        worked_ms: duration.as_millis() as u64,
    })
}

/// Health check is never limited; `/work` sits behind the limiter.
pub fn routes(limiter: Arc<ConcurrencyLimiter>) -> Router {
    let limited = Router::new()
        .route("/work", post(work))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&limiter),
            limit_concurrency,
        ));

    Router::new()
        .route("/health-check", get(health_check))
        .merge(limited)
        .with_state(limiter)
}
