use axum::{Json, extract::State};

use parley_types::api::{HealthResponse, PresenceResponse};

use crate::state::AppState;

/// Users with a live socket right now.
pub async fn get_presence(State(state): State<AppState>) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        online: state.hub.registry().online_users().await,
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        connections: state.hub.registry().len().await,
        time: chrono::Utc::now(),
    })
}
