use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DirectMessage, MessageKind, UserId};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway upgrade.
/// Tokens are issued by the account service; the hub only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub exp: usize,
}

// -- Direct messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub peer_id: UserId,
    pub last_message: DirectMessage,
}

// -- Presence --

#[derive(Debug, Serialize, Deserialize)]
pub struct PresenceResponse {
    pub online: Vec<UserId>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
    pub time: DateTime<Utc>,
}
