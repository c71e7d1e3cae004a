use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use super::state::AppState;
use crate::shared::constants;

#[derive(Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub reducer_loaded: bool,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: constants::APP_NAME,
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        reducer_loaded: state.pipeline.artifacts().has_reducer(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
