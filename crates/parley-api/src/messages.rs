use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use parley_db::models::DirectMessageRow;
use parley_db::queries::PageCursor;
use parley_types::api::{Claims, ConversationSummary, SendMessageRequest};
use parley_types::models::{DirectMessage, UserId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Longest message body accepted, in characters.
pub const MAX_CONTENT_CHARS: usize = 4000;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: pass the `created_at` and `id` of the oldest
    /// message from the previous page to fetch older messages.
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Store a direct message. Real-time delivery happens over the socket and
/// does not depend on this call succeeding.
pub async fn send_direct_message(
    State(state): State<AppState>,
    Path(peer_id): Path<UserId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    if peer_id == claims.sub {
        return Err(ApiError::BadRequest("cannot message yourself".into()));
    }
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is empty".into()));
    }
    if req.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "content is longer than {} characters",
            MAX_CONTENT_CHARS
        )));
    }

    // Run blocking DB insert off the async runtime
    let db = state.clone();
    let sender = claims.sub.clone();
    let recipient = peer_id.clone();
    let message = tokio::task::spawn_blocking(move || {
        db.db.insert_direct_message(&sender, &recipient, &req.content, req.kind)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {}", e)))??;

    debug!("{} stored message {} for {}", claims.sub, message.id, peer_id);
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(peer_id): Path<UserId>,
    Query(query): Query<ConversationQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<DirectMessage>>> {
    let db = state.clone();
    let limit = query.limit.clamp(1, MAX_LIMIT);
    let before = match (query.before, query.before_id) {
        (Some(created_at), id) => Some(PageCursor { created_at, id }),
        (None, Some(_)) => return Err(ApiError::BadRequest("before_id requires before".into())),
        (None, None) => None,
    };
    let rows = tokio::task::spawn_blocking(move || {
        db.db.get_conversation(&claims.sub, &peer_id, limit, before)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {}", e)))??;

    Ok(Json(rows.into_iter().filter_map(convert_row).collect()))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    let db = state.clone();
    let me = claims.sub.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_conversations(&me))
        .await
        .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {}", e)))??;

    let summaries = rows
        .into_iter()
        .filter_map(convert_row)
        .map(|last_message| {
            let peer_id = if last_message.sender_id == claims.sub {
                last_message.recipient_id.clone()
            } else {
                last_message.sender_id.clone()
            };
            ConversationSummary {
                peer_id,
                last_message,
            }
        })
        .collect();

    Ok(Json(summaries))
}

/// Corrupt rows are skipped rather than failing the whole page.
fn convert_row(row: DirectMessageRow) -> Option<DirectMessage> {
    let id = row.id.clone();
    DirectMessage::try_from(row)
        .map_err(|e| warn!("Skipping corrupt message '{}': {:#}", id, e))
        .ok()
}
