use tracing::debug;

use parley_types::events::Envelope;

use crate::registry::{ConnectionRegistry, Outbound};

/// Best-effort delivery of envelopes to whoever is connected right now.
///
/// Nothing is queued for offline users; durable history goes through the
/// REST message store instead.
#[derive(Clone)]
pub struct MessageRelay {
    registry: ConnectionRegistry,
}

impl MessageRelay {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Returns whether the envelope reached a live connection. Never reported
    /// back to the sender.
    pub async fn relay(&self, envelope: &Envelope) -> bool {
        let delivered = self
            .registry
            .send_to(envelope.to(), Outbound::Text(envelope.as_text().to_string()))
            .await;

        if delivered {
            debug!("{} -> {} {}", envelope.from(), envelope.to(), envelope.kind().as_str());
        } else {
            debug!(
                "{} -> {} {} dropped, recipient offline",
                envelope.from(),
                envelope.to(),
                envelope.kind().as_str()
            );
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::models::UserId;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn delivers_only_while_recipient_is_registered() {
        let registry = ConnectionRegistry::new();
        let relay = MessageRelay::new(registry.clone());
        let raw = r#"{"type":"message","from":"alice","to":"bob","content":"hey"}"#;
        let envelope = Envelope::parse(raw, &uid("alice")).unwrap();

        assert!(!relay.relay(&envelope).await);

        let (conn_id, mut bob_rx) = registry.register(uid("bob")).await;
        assert!(relay.relay(&envelope).await);
        assert_eq!(bob_rx.recv().await, Some(Outbound::Text(raw.to_string())));

        registry.unregister(&uid("bob"), conn_id).await;
        assert!(!relay.relay(&envelope).await);
        assert!(bob_rx.try_recv().is_err());
    }
}
