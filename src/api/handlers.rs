use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let settings = state.settings();

    Json(RootResponse {
        message: "Lingvo Rust API".to_string(),
        version: settings.api().version.clone(),
        environment: settings.runtime().environment.as_str().to_string(),
        docs_url: format!("{}/docs", settings.api().api_v1_str),
    })
}

/// Database connectivity decides the overall status. The grader and the
/// notifier are reported as configured or disabled and never flip it.
pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut status = "healthy";
    let mut components = HashMap::new();

    match sqlx::query("SELECT 1").execute(state.db()).await {
        Ok(_) => {
            components.insert("database".to_string(), "healthy".to_string());
        }
        Err(err) => {
            components.insert("database".to_string(), format!("unhealthy: {err}"));
            status = "unhealthy";
        }
    }

    let grader = if state.settings().grader().is_configured() { "configured" } else { "disabled" };
    components.insert("grader".to_string(), grader.to_string());

    let notifier =
        if state.settings().notifier().is_configured() { "configured" } else { "disabled" };
    components.insert("notifier".to_string(), notifier.to_string());

    Json(HealthResponse {
        service: "lingvo-api".to_string(),
        status: status.to_string(),
        components,
    })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
