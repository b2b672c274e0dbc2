use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

/// Create the direct message store if this is a fresh database.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS direct_messages (
            id              TEXT PRIMARY KEY,
            sender_id       TEXT NOT NULL,
            recipient_id    TEXT NOT NULL,
            content         TEXT NOT NULL,
            kind            TEXT NOT NULL DEFAULT 'text',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_dm_sender
            ON direct_messages(sender_id, recipient_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_dm_recipient
            ON direct_messages(recipient_id, sender_id, created_at);
        ",
    )?;

    debug!("direct_messages table ready");
    Ok(())
}
