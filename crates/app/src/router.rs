use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;

use customer_registry_core::CustomerRegistrar;

use crate::{registration, telemetry};

pub const REGISTRATION_PATH: &str = "/api/v1/customer-registration";

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    registrar: Arc<dyn CustomerRegistrar>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, registrar: Arc<dyn CustomerRegistrar>) -> Self {
        Self { metrics, registrar }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn registrar(&self) -> &dyn CustomerRegistrar {
        self.registrar.as_ref()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route(REGISTRATION_PATH, put(registration::handle))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}
