use std::sync::Arc;

use crate::registry::{Subscriber, SubscriberRegistry};
use crate::Alert;

use super::Notifier;

// ---

/// Fans alerts out to every eligible subscriber.
pub struct AlertBroadcaster<N> {
    // ---
    registry: Arc<SubscriberRegistry>,
    notifier: Arc<N>,
}

impl<N> Clone for AlertBroadcaster<N> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

/// Subscribed, and either the alert is `Info` or the subscriber wants warnings.
pub fn wants(subscriber: &Subscriber, alert: &Alert) -> bool {
    subscriber.subscribed && (!alert.is_warning() || subscriber.warnings_enabled)
}

impl<N: Notifier> AlertBroadcaster<N> {
    // ---
    pub fn new(registry: Arc<SubscriberRegistry>, notifier: Arc<N>) -> Self {
        Self { registry, notifier }
    }

    /// Chat ids that should receive `alert`, in registry order.
    pub async fn recipients(&self, alert: &Alert) -> Vec<String> {
        // ---
        self.registry
            .snapshot()
            .await
            .into_iter()
            .filter(|s| wants(s, alert))
            .map(|s| s.id)
            .collect()
    }

    /// Deliver `alert` and return how many subscribers got it.
    ///
    /// A failed delivery is logged and skipped; nothing is retried.
    pub async fn broadcast(&self, alert: &Alert) -> usize {
        // ---
        let recipients = self.recipients(alert).await;
        let mut delivered = 0;

        for id in &recipients {
            match self.notifier.send(id, &alert.text).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!("Failed to deliver alert to {}: {}", id, e),
            }
        }

        tracing::info!(
            "Broadcast {:?} alert to {}/{} subscribers: {}",
            alert.category,
            delivered,
            recipients.len(),
            alert.text
        );
        delivered
    }
}
