use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use parley_types::events::Envelope;
use parley_types::models::UserId;

use crate::relay::MessageRelay;

/// (sender, recipient)
type Pair = (UserId, UserId);

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Relays typing indicators and clears them on the recipient's side when the
/// sender goes quiet or goes away.
///
/// Each (sender, recipient) pair has at most one pending timer. Every typing
/// event replaces it; when it fires the recipient gets `isTyping: false`.
/// The timer map stays locked while an indicator is relayed, so a firing
/// timer and a fresh event for the same pair never interleave.
#[derive(Clone)]
pub struct TypingTracker {
    inner: Arc<TypingInner>,
}

struct TypingInner {
    relay: MessageRelay,
    timeout: Duration,
    timers: Mutex<HashMap<Pair, Timer>>,
    next_generation: AtomicU64,
}

impl TypingTracker {
    pub fn new(relay: MessageRelay, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(TypingInner {
                relay,
                timeout,
                timers: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// (Re-)arm or disarm the pair's timer, then relay the `typing` envelope.
    pub async fn handle(&self, envelope: &Envelope) -> bool {
        let pair = (envelope.from().clone(), envelope.to().clone());

        let mut timers = self.inner.timers.lock().await;
        if envelope.is_typing() {
            self.arm(&mut timers, pair);
        } else if let Some(timer) = timers.remove(&pair) {
            timer.handle.abort();
        }
        self.inner.relay.relay(envelope).await
    }

    /// `sender` is gone: every recipient it was typing to is told it stopped.
    pub async fn clear_sender(&self, sender: &UserId) {
        let mut timers = self.inner.timers.lock().await;
        let pairs: Vec<Pair> = timers
            .keys()
            .filter(|(from, _)| from == sender)
            .cloned()
            .collect();

        for pair in pairs {
            if let Some(timer) = timers.remove(&pair) {
                timer.handle.abort();
            }
            let (from, to) = pair;
            debug!("{} left while typing to {}", from, to);
            self.inner.relay.relay(&Envelope::typing_stopped(&from, &to)).await;
        }
    }

    pub async fn pending(&self) -> usize {
        self.inner.timers.lock().await.len()
    }

    fn arm(&self, timers: &mut HashMap<Pair, Timer>, pair: Pair) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let tracker = self.clone();
        let key = pair.clone();
        let timeout = self.inner.timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracker.expire(key, generation).await;
        });

        if let Some(previous) = timers.insert(pair, Timer { generation, handle }) {
            previous.handle.abort();
        }
    }

    async fn expire(&self, pair: Pair, generation: u64) {
        let mut timers = self.inner.timers.lock().await;
        match timers.get(&pair) {
            Some(timer) if timer.generation == generation => {
                timers.remove(&pair);
            }
            // Re-armed, disarmed or cleared since this timer started.
            _ => return,
        }

        let (from, to) = pair;
        debug!("{} stopped typing to {}", from, to);
        self.inner.relay.relay(&Envelope::typing_stopped(&from, &to)).await;
    }
}
