use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use parley_types::events::{Envelope, EnvelopeError, EnvelopeKind};
use parley_types::models::UserId;

use crate::registry::ConnectionRegistry;
use crate::relay::MessageRelay;
use crate::signal::SignalForwarder;
use crate::typing::TypingTracker;

#[derive(Debug, Clone)]
pub struct HubSettings {
    pub heartbeat_interval: Duration,
    pub typing_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            typing_timeout: Duration::from_secs(3),
            max_frame_bytes: 64 * 1024,
        }
    }
}

/// The real-time hub: presence registry plus the routes an inbound envelope
/// can take out of it.
#[derive(Clone)]
pub struct Hub {
    registry: ConnectionRegistry,
    relay: MessageRelay,
    typing: TypingTracker,
    signals: SignalForwarder,
    settings: HubSettings,
}

impl Hub {
    pub fn new(settings: HubSettings) -> Self {
        let registry = ConnectionRegistry::new();
        let relay = MessageRelay::new(registry.clone());
        Self {
            typing: TypingTracker::new(relay.clone(), settings.typing_timeout),
            signals: SignalForwarder::new(registry.clone()),
            relay,
            registry,
            settings,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn typing(&self) -> &TypingTracker {
        &self.typing
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    /// Handle one text frame from `sender`. Ok(delivered) once routed;
    /// rejected frames are logged and returned as the error.
    pub async fn route(&self, sender: &UserId, text: &str) -> Result<bool, EnvelopeError> {
        let result = self.dispatch(sender, text).await;
        if let Err(e) = &result {
            warn!(
                "{} sent a bad envelope: {} -- raw: {}",
                sender,
                e,
                truncate(text, 200)
            );
        }
        result
    }

    async fn dispatch(&self, sender: &UserId, text: &str) -> Result<bool, EnvelopeError> {
        if text.len() > self.settings.max_frame_bytes {
            return Err(EnvelopeError::TooLarge(text.len()));
        }
        let envelope = Envelope::parse(text, sender)?;

        let delivered = match envelope.kind() {
            EnvelopeKind::Typing => self.typing.handle(&envelope).await,
            kind if kind.is_signal() => self.signals.forward(&envelope).await,
            _ => self.relay.relay(&envelope).await,
        };
        Ok(delivered)
    }

    /// Connection teardown. Indicators the user left behind are cleared only
    /// with the live connection; a displaced one leaves its successor alone.
    pub async fn disconnect(&self, user_id: &UserId, conn_id: Uuid) {
        if self.registry.unregister(user_id, conn_id).await {
            self.typing.clear_sender(user_id).await;
        } else {
            debug!("{} connection {} already gone from the registry", user_id, conn_id);
        }
    }

    /// One heartbeat round across every connection.
    pub async fn sweep(&self) -> Vec<UserId> {
        let dropped = self.registry.sweep().await;
        for user_id in &dropped {
            self.typing.clear_sender(user_id).await;
        }
        dropped
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Outbound;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn routes_by_type() {
        let hub = Hub::new(HubSettings::default());
        let (_, mut bob_rx) = hub.registry().register(uid("bob")).await;

        for kind in [
            "message",
            "call-initiate",
            "call-answer",
            "call-hangup",
            "file-share",
            "offer",
            "answer",
            "ice-candidate",
        ] {
            let raw = format!(r#"{{"type":"{}","from":"alice","to":"bob"}}"#, kind);
            assert!(hub.route(&uid("alice"), &raw).await.unwrap(), "{}", kind);
            assert_eq!(bob_rx.recv().await, Some(Outbound::Text(raw)));
        }

        let typing = r#"{"type":"typing","from":"alice","to":"bob"}"#;
        assert!(hub.route(&uid("alice"), typing).await.unwrap());
        assert_eq!(hub.typing().pending().await, 1);
    }

    #[tokio::test]
    async fn rejects_oversized_and_invalid_frames() {
        let hub = Hub::new(HubSettings {
            max_frame_bytes: 64,
            ..HubSettings::default()
        });
        let big = format!(r#"{{"type":"message","to":"bob","pad":"{}"}}"#, "x".repeat(64));
        assert!(matches!(
            hub.route(&uid("alice"), &big).await,
            Err(EnvelopeError::TooLarge(_))
        ));
        assert!(hub.route(&uid("alice"), "{").await.is_err());
    }

    #[tokio::test]
    async fn offline_recipient_is_not_an_error() {
        let hub = Hub::new(HubSettings::default());
        let raw = r#"{"type":"message","to":"bob"}"#;
        assert_eq!(hub.route(&uid("alice"), raw).await.unwrap(), false);
    }

    fn text_of(frame: Option<Outbound>) -> serde_json::Value {
        match frame {
            Some(Outbound::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn disconnect_stops_typing_only_for_live_connection() {
        let hub = Hub::new(HubSettings::default());
        let (_, mut bob_rx) = hub.registry().register(uid("bob")).await;
        let (old_conn, _old_rx) = hub.registry().register(uid("alice")).await;
        let (new_conn, _new_rx) = hub.registry().register(uid("alice")).await;
        text_of(bob_rx.recv().await);
        text_of(bob_rx.recv().await);

        hub.route(&uid("alice"), r#"{"type":"typing","to":"bob"}"#).await.unwrap();
        assert_eq!(text_of(bob_rx.recv().await)["type"], "typing");

        hub.disconnect(&uid("alice"), old_conn).await;
        assert_eq!(hub.typing().pending().await, 1);
        assert!(hub.registry().is_online(&uid("alice")).await);
        assert!(bob_rx.try_recv().is_err());

        hub.disconnect(&uid("alice"), new_conn).await;
        assert_eq!(hub.typing().pending().await, 0);
        assert!(!hub.registry().is_online(&uid("alice")).await);
        assert_eq!(text_of(bob_rx.try_recv().ok())["status"], "offline");
        assert_eq!(
            text_of(bob_rx.try_recv().ok()),
            serde_json::json!({"type":"typing","from":"alice","to":"bob","isTyping":false})
        );
    }

    #[tokio::test]
    async fn heartbeat_reap_stops_typing() {
        let hub = Hub::new(HubSettings::default());
        let (bob_conn, mut bob_rx) = hub.registry().register(uid("bob")).await;
        let (_, _alice_rx) = hub.registry().register(uid("alice")).await;
        text_of(bob_rx.recv().await);

        hub.route(&uid("alice"), r#"{"type":"typing","to":"bob"}"#).await.unwrap();
        text_of(bob_rx.recv().await);

        hub.sweep().await;
        assert_eq!(bob_rx.recv().await, Some(Outbound::Ping));
        hub.registry().mark_alive(&uid("bob"), bob_conn).await;

        assert_eq!(hub.sweep().await, vec![uid("alice")]);
        assert_eq!(text_of(bob_rx.recv().await)["status"], "offline");
        assert_eq!(bob_rx.recv().await, Some(Outbound::Ping));
        assert_eq!(text_of(bob_rx.recv().await)["isTyping"], false);
        assert_eq!(hub.typing().pending().await, 0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
