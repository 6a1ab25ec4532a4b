use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use uptime_core::{EngineStatus, TimerDetail};

use crate::state::AppState;

#[derive(Serialize)]
pub struct MonitoringStatusResponse {
    pub status: EngineStatus,
    pub timers: Vec<TimerDetail>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/monitoring/status", get(monitoring_status))
}

/// GET /api/v1/monitoring/status
async fn monitoring_status(State(state): State<AppState>) -> Json<MonitoringStatusResponse> {
    Json(MonitoringStatusResponse {
        status: state.engine.status().await,
        timers: state.engine.detailed_status().await,
    })
}
