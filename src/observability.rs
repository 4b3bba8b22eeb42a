use crate::routes::AppState;
use crate::types::{HealthChecks, HealthStatus, MetricsResponse};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::info;

/// Application metrics
#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub start_time: Instant,
    pub total_requests: Arc<RwLock<u64>>,
    pub successful_requests: Arc<RwLock<u64>>,
    pub failed_requests: Arc<RwLock<u64>>,
    pub formatting_operations: Arc<RwLock<u64>>,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_requests: Arc::new(RwLock::new(0)),
            successful_requests: Arc::new(RwLock::new(0)),
            failed_requests: Arc::new(RwLock::new(0)),
            formatting_operations: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn increment_requests(&self) {
        *self.total_requests.write().await += 1;
    }

    pub async fn increment_success(&self) {
        *self.successful_requests.write().await += 1;
    }

    pub async fn increment_failure(&self) {
        *self.failed_requests.write().await += 1;
    }

    pub async fn increment_formatting(&self) {
        *self.formatting_operations.write().await += 1;
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts every request reaching an API route. Any 4xx/5xx response,
/// including extractor rejections, is a failure.
pub async fn track_requests(
    State(metrics): State<Arc<AppMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    metrics.increment_requests().await;
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        metrics.increment_failure().await;
    } else {
        metrics.increment_success().await;
    }
    response
}

/// Health check
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthStatus)),
    tag = "Health"
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.metrics.uptime_seconds();

    let health = HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        checks: HealthChecks {
            api: "ok".to_string(),
            localization: format!("ok ({})", state.localization.default_culture().name),
            docs: if state.docs_enabled { "ok" } else { "disabled" }.to_string(),
        },
    };

    info!(
        "Health check requested - status: healthy, uptime: {}s",
        uptime
    );
    (StatusCode::OK, Json(health))
}

/// Request counters
#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, description = "Current counters", body = MetricsResponse)),
    tag = "Health"
)]
pub async fn metrics_handler(State(metrics): State<Arc<AppMetrics>>) -> impl IntoResponse {
    let uptime = metrics.uptime_seconds();
    let total = *metrics.total_requests.read().await;
    let success = *metrics.successful_requests.read().await;
    let failed = *metrics.failed_requests.read().await;
    let formatting = *metrics.formatting_operations.read().await;

    let success_rate = if total > 0 {
        (success as f64 / total as f64) * 100.0
    } else {
        100.0
    };

    let response = MetricsResponse {
        uptime_seconds: uptime,
        total_requests: total,
        successful_requests: success,
        failed_requests: failed,
        formatting_operations: formatting,
        success_rate,
    };

    (StatusCode::OK, Json(response))
}

/// Initialize tracing subscriber for structured logging
pub fn init_tracing() {
    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "maps_api=info,tower_http=info".to_string());

    let filter_clone = filter.clone();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .json()
        .init();

    info!("Tracing initialized with filter: {}", filter_clone);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters() {
        let metrics = AppMetrics::new();
        metrics.increment_requests().await;
        metrics.increment_requests().await;
        metrics.increment_success().await;
        metrics.increment_failure().await;
        metrics.increment_formatting().await;

        assert_eq!(*metrics.total_requests.read().await, 2);
        assert_eq!(*metrics.successful_requests.read().await, 1);
        assert_eq!(*metrics.failed_requests.read().await, 1);
        assert_eq!(*metrics.formatting_operations.read().await, 1);
    }
}
