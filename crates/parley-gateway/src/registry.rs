use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_types::events::{PresenceStatus, ServerEvent};
use parley_types::models::UserId;

/// Close code sent to a connection displaced by a newer one for the same user.
pub const CLOSE_REPLACED: u16 = 4000;
/// Close code sent when a connection failed to answer a heartbeat ping.
pub const CLOSE_HEARTBEAT: u16 = 1001;

/// A frame the registry asks a connection's writer to put on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close { code: u16, reason: &'static str },
}

struct Connection {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
    is_alive: bool,
}

impl Connection {
    fn send(&self, frame: Outbound) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Tracks the one live connection per user and fans presence out to the rest.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    /// user_id -> the connection that currently owns that user
    connections: RwLock<HashMap<UserId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id`. Returns (conn_id, receiver).
    ///
    /// The receiver is first loaded with an `online` status for every user
    /// already connected; then every other connection is told this user came
    /// online. A previous connection for the same user is closed and evicted.
    pub async fn register(&self, user_id: UserId) -> (Uuid, mpsc::UnboundedReceiver<Outbound>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut connections = self.inner.connections.write().await;

        for existing in connections.keys().filter(|id| **id != user_id) {
            if let Some(text) = status_text(existing, PresenceStatus::Online) {
                let _ = tx.send(Outbound::Text(text));
            }
        }

        let replaced = connections.insert(
            user_id.clone(),
            Connection {
                conn_id,
                tx,
                is_alive: true,
            },
        );
        if let Some(old) = replaced {
            info!("{} reconnected, closing connection {}", user_id, old.conn_id);
            old.send(Outbound::Close {
                code: CLOSE_REPLACED,
                reason: "replaced by a newer connection",
            });
        }

        broadcast_status(&connections, &user_id, PresenceStatus::Online);
        debug!("{} registered as {} ({} online)", user_id, conn_id, connections.len());

        (conn_id, rx)
    }

    /// Remove `user_id`, but only if `conn_id` still owns the entry.
    /// Returns whether an entry was removed (and `offline` broadcast).
    pub async fn unregister(&self, user_id: &UserId, conn_id: Uuid) -> bool {
        let mut connections = self.inner.connections.write().await;

        let owned = connections
            .get(user_id)
            .is_some_and(|conn| conn.conn_id == conn_id);
        if !owned {
            return false;
        }

        connections.remove(user_id);
        broadcast_status(&connections, user_id, PresenceStatus::Offline);
        debug!("{} unregistered ({} online)", user_id, connections.len());
        true
    }

    /// Record a pong from `conn_id`.
    pub async fn mark_alive(&self, user_id: &UserId, conn_id: Uuid) {
        let mut connections = self.inner.connections.write().await;
        if let Some(conn) = connections.get_mut(user_id) {
            if conn.conn_id == conn_id {
                conn.is_alive = true;
            }
        }
    }

    /// One heartbeat round.
    ///
    /// Connections that have not answered the previous ping are closed and
    /// unregistered; every other connection is pinged and must answer before
    /// the next round. Returns the users that were dropped.
    pub async fn sweep(&self) -> Vec<UserId> {
        let mut connections = self.inner.connections.write().await;

        let dead: Vec<UserId> = connections
            .iter()
            .filter(|(_, conn)| !conn.is_alive)
            .map(|(id, _)| id.clone())
            .collect();

        for user_id in &dead {
            if let Some(conn) = connections.remove(user_id) {
                warn!("{} missed a heartbeat, dropping connection {}", user_id, conn.conn_id);
                conn.send(Outbound::Close {
                    code: CLOSE_HEARTBEAT,
                    reason: "heartbeat timeout",
                });
            }
        }

        for user_id in &dead {
            broadcast_status(&connections, user_id, PresenceStatus::Offline);
        }

        for conn in connections.values_mut() {
            conn.is_alive = false;
            conn.send(Outbound::Ping);
        }

        dead
    }

    /// Best-effort write to `user_id`'s connection. False if not registered
    /// or the connection is already shutting down.
    pub async fn send_to(&self, user_id: &UserId, frame: Outbound) -> bool {
        let connections = self.inner.connections.read().await;
        connections
            .get(user_id)
            .is_some_and(|conn| conn.send(frame))
    }

    pub async fn is_online(&self, user_id: &UserId) -> bool {
        self.inner.connections.read().await.contains_key(user_id)
    }

    /// Currently registered users, sorted.
    pub async fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.inner.connections.read().await.keys().cloned().collect();
        users.sort();
        users
    }

    pub async fn len(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

fn status_text(user_id: &UserId, status: PresenceStatus) -> Option<String> {
    let event = ServerEvent::UserStatus {
        user_id: user_id.clone(),
        status,
    };
    match serde_json::to_string(&event) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to encode presence event for {}: {}", user_id, e);
            None
        }
    }
}

/// Tell every connection except `user_id`'s about its new status.
fn broadcast_status(connections: &HashMap<UserId, Connection>, user_id: &UserId, status: PresenceStatus) {
    let Some(text) = status_text(user_id, status) else {
        return;
    };
    for (id, conn) in connections {
        if id != user_id {
            conn.send(Outbound::Text(text.clone()));
        }
    }
}
