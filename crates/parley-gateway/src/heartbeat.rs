use std::time::Duration;

use tracing::info;

use crate::hub::Hub;

/// Background task that pings every connection and drops the silent ones.
///
/// A connection gets one full interval to answer each ping; anything that
/// missed the previous round is closed and announced offline.
pub async fn run_heartbeat_loop(hub: Hub, interval: Duration) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        let dropped = hub.sweep().await;
        if !dropped.is_empty() {
            info!("Heartbeat: dropped {} unresponsive connections", dropped.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubSettings;
    use crate::registry::Outbound;
    use parley_types::models::UserId;

    #[tokio::test(start_paused = true)]
    async fn silent_connection_is_dropped_after_two_rounds() {
        let hub = Hub::new(HubSettings::default());
        let period = Duration::from_secs(30);
        let alice = UserId::parse("alice").unwrap();
        let (_, mut rx) = hub.registry().register(alice.clone()).await;

        tokio::spawn(run_heartbeat_loop(hub.clone(), period));

        assert_eq!(rx.recv().await, Some(Outbound::Ping));
        assert!(hub.registry().is_online(&alice).await);

        assert!(matches!(rx.recv().await, Some(Outbound::Close { .. })));
        assert!(!hub.registry().is_online(&alice).await);
    }
}
