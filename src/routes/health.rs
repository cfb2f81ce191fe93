//! Health check endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::generation::GenerationMode;
use crate::governor::QueueStats;
use crate::state::AppState;

#[derive(Serialize)]
pub struct GenerationHealth {
    pub mode: GenerationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<&'static str>,
    /// Only present when the upstream check was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub generation: GenerationHealth,
    pub queue: QueueStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Probe the generation backend as well
    #[serde(default)]
    pub upstream: bool,
}

pub async fn health_check(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> Json<HealthResponse> {
    let generator = state.study().generator();
    let mode = if generator.is_configured() {
        GenerationMode::Model
    } else {
        GenerationMode::Fallback
    };
    let reachable = if query.upstream && generator.is_configured() {
        Some(generator.backend_available().await)
    } else {
        None
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "lectern-server",
        generation: GenerationHealth {
            mode,
            backend: generator.backend_name(),
            reachable,
        },
        queue: generator.queue_stats(),
    })
}
