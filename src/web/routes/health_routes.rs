use axum::{Json, Router, extract::State, routing::get};
use std::sync::Arc;

use crate::version::VERSION;
use crate::web::{AppState, models::HealthResponse};

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/health", get(health_check_handler))
}

async fn health_check_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: app_state.model.status(),
        version: VERSION,
    })
}
