use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use parley_api::AppState;
use parley_api::error::ApiError;
use parley_api::middleware::verify_token;
use parley_gateway::connection;
use parley_types::models::UserId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayQuery {
    pub user_id: UserId,
    pub token: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Browsers cannot set headers on a WebSocket handshake, so the token rides
/// in the query string next to the user id it must match.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let claims = verify_token(&state.jwt_secret, &query.token)?;
    if claims.sub != query.user_id {
        warn!(
            "Gateway upgrade for {} rejected: token belongs to {}",
            query.user_id, claims.sub
        );
        return Err(ApiError::Unauthorized);
    }

    let hub = state.hub.clone();
    let user_id = query.user_id;
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, hub, user_id)))
}
