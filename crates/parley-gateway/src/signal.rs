use tracing::{debug, trace};

use parley_types::events::{Envelope, EnvelopeKind};

use crate::registry::{ConnectionRegistry, Outbound};

/// Passes WebRTC negotiation payloads between the two ends of a call.
///
/// SDP and candidates are opaque here: the hub neither validates nor tracks
/// call sessions.
#[derive(Clone)]
pub struct SignalForwarder {
    registry: ConnectionRegistry,
}

impl SignalForwarder {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub async fn forward(&self, envelope: &Envelope) -> bool {
        let delivered = self
            .registry
            .send_to(envelope.to(), Outbound::Text(envelope.as_text().to_string()))
            .await;

        // Candidates trickle in by the dozen per call.
        if envelope.kind() == EnvelopeKind::IceCandidate {
            trace!("{} -> {} ice-candidate (delivered={})", envelope.from(), envelope.to(), delivered);
        } else {
            debug!(
                "{} -> {} {} (delivered={})",
                envelope.from(),
                envelope.to(),
                envelope.kind().as_str(),
                delivered
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
    async fn forwards_sdp_untouched() {
        let registry = ConnectionRegistry::new();
        let signals = SignalForwarder::new(registry.clone());
        let (_, mut bob_rx) = registry.register(uid("bob")).await;

        let raw = r#"{"type":"offer","from":"alice","to":"bob","sdp":"not really sdp","callId":"c1"}"#;
        let offer = Envelope::parse(raw, &uid("alice")).unwrap();
        assert!(signals.forward(&offer).await);
        assert_eq!(bob_rx.recv().await, Some(Outbound::Text(raw.to_string())));

        let candidate = Envelope::parse(r#"{"type":"ice-candidate","to":"carol","candidate":{}}"#, &uid("alice")).unwrap();
        assert!(!signals.forward(&candidate).await);
    }
}
