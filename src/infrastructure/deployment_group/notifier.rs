//! Per-team broadcast of deployment group events

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::deployment_group::{DeploymentGroupEvent, DeploymentGroupNotifier};
use crate::domain::team::TeamId;
use crate::domain::DomainError;

/// Fans events out to subscribers of the event's team
///
/// Each team gets its own bounded channel. Publishing never blocks: a
/// subscriber that falls more than `capacity` events behind receives
/// `RecvError::Lagged` and continues from the oldest retained event.
#[derive(Debug)]
pub struct BroadcastNotifier {
    capacity: usize,
    channels: RwLock<HashMap<TeamId, broadcast::Sender<DeploymentGroupEvent>>>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribe to all future events of a team
    pub fn subscribe(
        &self,
        team_id: &TeamId,
    ) -> Result<broadcast::Receiver<DeploymentGroupEvent>, DomainError> {
        let mut channels = self.channels.write().map_err(|e| {
            DomainError::internal(format!("Failed to acquire notifier lock: {}", e))
        })?;

        let sender = channels
            .entry(team_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);

        debug!(team_id = %team_id, "Subscribed to deployment group events");
        Ok(sender.subscribe())
    }

    /// Drop a team's channel once nobody listens to it
    fn release_idle(&self, team_id: &TeamId) {
        let Ok(mut channels) = self.channels.write() else {
            return;
        };

        if channels
            .get(team_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(team_id);
            debug!(team_id = %team_id, "Released idle event channel");
        }
    }

    pub fn subscriber_count(&self, team_id: &TeamId) -> usize {
        self.channels
            .read()
            .ok()
            .and_then(|channels| channels.get(team_id).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }
}

impl DeploymentGroupNotifier for BroadcastNotifier {
    fn publish(&self, event: DeploymentGroupEvent) {
        let channels = match self.channels.read() {
            Ok(channels) => channels,
            Err(e) => {
                warn!(error = %e, event = event.name(), "Notifier lock poisoned, event dropped");
                return;
            }
        };

        let Some(sender) = channels.get(event.team_id()) else {
            debug!(team_id = %event.team_id(), event = event.name(), "No subscribers for team");
            return;
        };

        let name = event.name();
        let team_id = event.team_id().clone();
        let sent = sender.send(event);
        drop(channels);

        match sent {
            Ok(receivers) => debug!(team_id = %team_id, event = name, receivers, "Event published"),
            Err(_) => {
                debug!(team_id = %team_id, event = name, "All subscribers dropped");
                self.release_idle(&team_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deployment_group::DeploymentGroupId;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn team(id: &str) -> TeamId {
        TeamId::new(id).unwrap()
    }

    fn deleted(team_id: &str, id: &str) -> DeploymentGroupEvent {
        DeploymentGroupEvent::deleted(team(team_id), DeploymentGroupId::new(id))
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe(&team("team-a")).unwrap();

        notifier.publish(deleted("team-a", "1"));
        notifier.publish(deleted("team-a", "2"));

        assert_eq!(rx.recv().await.unwrap(), deleted("team-a", "1"));
        assert_eq!(rx.recv().await.unwrap(), deleted("team-a", "2"));
    }

    #[tokio::test]
    async fn test_teams_are_isolated() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx_a = notifier.subscribe(&team("team-a")).unwrap();
        let mut rx_b = notifier.subscribe(&team("team-b")).unwrap();

        notifier.publish(deleted("team-a", "1"));

        assert_eq!(rx_a.recv().await.unwrap(), deleted("team-a", "1"));
        assert!(matches!(rx_b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let notifier = BroadcastNotifier::default();
        notifier.publish(deleted("team-a", "1"));
        assert_eq!(notifier.subscriber_count(&team("team-a")), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_without_blocking() {
        let notifier = BroadcastNotifier::new(2);
        let mut rx = notifier.subscribe(&team("team-a")).unwrap();

        for i in 0..5 {
            notifier.publish(deleted("team-a", &i.to_string()));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap(), deleted("team-a", "3"));
        assert_eq!(rx.recv().await.unwrap(), deleted("team-a", "4"));
    }

    #[test]
    fn test_idle_channel_released_on_publish() {
        let notifier = BroadcastNotifier::new(8);
        let rx = notifier.subscribe(&team("team-a")).unwrap();
        let _other = notifier.subscribe(&team("team-b")).unwrap();
        drop(rx);

        notifier.publish(deleted("team-a", "1"));

        let channels = notifier.channels.read().unwrap();
        assert!(!channels.contains_key(&team("team-a")));
        assert!(channels.contains_key(&team("team-b")));
    }

    #[tokio::test]
    async fn test_resubscribe_after_release() {
        let notifier = BroadcastNotifier::new(8);
        drop(notifier.subscribe(&team("team-a")).unwrap());
        notifier.publish(deleted("team-a", "1"));

        let mut rx = notifier.subscribe(&team("team-a")).unwrap();
        notifier.publish(deleted("team-a", "2"));
        assert_eq!(rx.recv().await.unwrap(), deleted("team-a", "2"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(BroadcastNotifier::new(0).capacity(), 1);
    }
}
