use anyhow::Result;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use rusqlite::Row;
use uuid::Uuid;

use parley_types::models::{DirectMessage, MessageKind, UserId};

use crate::Database;
use crate::models::{DirectMessageRow, format_timestamp};

/// Position in a conversation to page backwards from: the oldest message of
/// the previous page. Without `id`, every message sharing `created_at` is
/// treated as already seen.
#[derive(Debug, Clone, Copy)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Option<Uuid>,
}

impl PageCursor {
    /// Stored timestamps carry microseconds; a finer cursor is rounded up so
    /// nothing older than it is skipped.
    fn bound(&self) -> String {
        let truncated = self.created_at.trunc_subsecs(6);
        if truncated < self.created_at {
            format_timestamp(truncated + Duration::microseconds(1))
        } else {
            format_timestamp(truncated)
        }
    }
}

impl Database {
    // -- Direct messages --

    pub fn insert_direct_message(
        &self,
        sender_id: &UserId,
        recipient_id: &UserId,
        content: &str,
        kind: MessageKind,
    ) -> Result<DirectMessage> {
        let message = DirectMessage {
            id: Uuid::new_v4(),
            sender_id: sender_id.clone(),
            recipient_id: recipient_id.clone(),
            content: content.to_string(),
            kind,
            // Stored at microsecond precision; keep the returned value identical.
            created_at: Utc::now().trunc_subsecs(6),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO direct_messages (id, sender_id, recipient_id, content, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message.id.to_string(),
                    sender_id.as_str(),
                    recipient_id.as_str(),
                    content,
                    kind.as_str(),
                    format_timestamp(message.created_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(message)
    }

    /// Messages exchanged between `user` and `peer`, newest first, strictly
    /// older than `before` in `(created_at, id)` order.
    pub fn get_conversation(
        &self,
        user: &UserId,
        peer: &UserId,
        limit: u32,
        before: Option<PageCursor>,
    ) -> Result<Vec<DirectMessageRow>> {
        let before_at = before.map(|cursor| cursor.bound());
        let before_id = before.and_then(|cursor| cursor.id).map(|id| id.to_string());
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient_id, content, kind, created_at
                 FROM direct_messages
                 WHERE ((sender_id = ?1 AND recipient_id = ?2)
                     OR (sender_id = ?2 AND recipient_id = ?1))
                   AND (?3 IS NULL OR created_at < ?3 OR (created_at = ?3 AND id < ?5))
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?4",
            )?;

            let rows = stmt
                .query_map(
                    rusqlite::params![user.as_str(), peer.as_str(), before_at, limit, before_id],
                    map_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// The latest message with each peer `user` has talked to, most recent
    /// conversation first.
    pub fn list_conversations(&self, user: &UserId) -> Result<Vec<DirectMessageRow>> {
        self.with_conn(|conn| {
            // SQLite fills bare columns from the row holding MAX(created_at).
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient_id, content, kind, MAX(created_at) AS last_at,
                        CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END AS peer
                 FROM direct_messages
                 WHERE sender_id = ?1 OR recipient_id = ?1
                 GROUP BY peer
                 ORDER BY last_at DESC",
            )?;

            let rows = stmt
                .query_map([user.as_str()], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<DirectMessageRow> {
    Ok(DirectMessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        kind: row.get(4)?,
        created_at: row.get(5)?,
    })
}
