use crate::handlers::{format_number, list_cultures, localized_string};
use crate::localization::Localization;
use crate::observability::{health_handler, metrics_handler, track_requests, AppMetrics};
use axum::extract::FromRef;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

pub const FORMAT_NUMBER_PATH: &str = "/api/numbers/{value}/format";
pub const CULTURES_PATH: &str = "/api/localization/cultures";
pub const STRINGS_PATH: &str = "/api/localization/strings/{key}";
pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

pub const ROUTE_PATHS: [&str; 5] = [
    FORMAT_NUMBER_PATH,
    CULTURES_PATH,
    STRINGS_PATH,
    HEALTH_PATH,
    METRICS_PATH,
];

#[derive(Debug, Clone, FromRef)]
pub struct AppState {
    pub metrics: Arc<AppMetrics>,
    pub localization: Arc<Localization>,
    pub docs_enabled: bool,
}

/// API routes are counted in the metrics, extractor rejections included.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(FORMAT_NUMBER_PATH, get(format_number))
        .route(CULTURES_PATH, get(list_cultures))
        .route(STRINGS_PATH, get(localized_string))
        .route_layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_requests,
        ))
        .route(HEALTH_PATH, get(health_handler))
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(state)
}
