use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use parley_types::models::{DirectMessage, MessageKind, UserId};

/// Fixed-width UTC timestamps so that text order is time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Row type for `direct_messages`; kept as raw SQLite text until converted.
#[derive(Debug)]
pub struct DirectMessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub kind: String,
    pub created_at: String,
}

impl TryFrom<DirectMessageRow> for DirectMessage {
    type Error = anyhow::Error;

    fn try_from(row: DirectMessageRow) -> Result<Self> {
        Ok(DirectMessage {
            id: row.id.parse().with_context(|| format!("corrupt message id '{}'", row.id))?,
            sender_id: UserId::parse(row.sender_id)?,
            recipient_id: UserId::parse(row.recipient_id)?,
            kind: MessageKind::parse(&row.kind)
                .ok_or_else(|| anyhow!("corrupt kind '{}' on message '{}'", row.kind, row.id))?,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .with_context(|| format!("corrupt created_at '{}' on message '{}'", row.created_at, row.id))?
                .with_timezone(&Utc),
            content: row.content,
        })
    }
}
