//! Consume-once connection confirmation

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::core::{
    error::{ServiceError, ServiceResult},
    event_bus::{EventBus, SubscriberId},
    types::NetworkInfo,
};

/// Bus subscription that keeps only the first published connection
///
/// Subscribe before issuing `connect`, wait, then [`finish`](Self::finish) to
/// unsubscribe. Later publications are ignored.
pub struct ConnectionConfirmation {
    subscriber: SubscriberId,
    receiver: mpsc::UnboundedReceiver<NetworkInfo>,
}

impl ConnectionConfirmation {
    pub async fn subscribe(bus: &EventBus<NetworkInfo>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let confirmed = AtomicBool::new(false);

        let subscriber = bus
            .subscribe(move |info: &NetworkInfo| {
                if !confirmed.swap(true, Ordering::SeqCst) {
                    // The waiter may already have given up
                    let _ = sender.send(info.clone());
                }
            })
            .await;

        Self {
            subscriber,
            receiver,
        }
    }

    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    /// Wait for the first confirmed connection
    pub async fn wait(&mut self, timeout: Duration) -> ServiceResult<NetworkInfo> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(info)) => Ok(info),
            Ok(None) => Err(ServiceError::ListenerClosed),
            Err(_) => Err(ServiceError::ConfirmationTimeout(timeout)),
        }
    }

    /// Unsubscribe from the bus
    pub async fn finish(self, bus: &EventBus<NetworkInfo>) {
        bus.unsubscribe(self.subscriber).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NetworkState;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_first_publication_wins() {
        let bus = EventBus::new();
        let mut confirmation = ConnectionConfirmation::subscribe(&bus).await;

        bus.publish(&NetworkInfo::wifi(NetworkState::Connected, "\"First\""))
            .await;
        bus.publish(&NetworkInfo::wifi(NetworkState::Connected, "\"Second\""))
            .await;

        let info = assert_ok!(confirmation.wait(Duration::from_millis(50)).await);
        assert_eq!(info.extra_info.as_deref(), Some("\"First\""));

        // The second publication was never queued
        assert!(matches!(
            confirmation.wait(Duration::from_millis(20)).await,
            Err(ServiceError::ConfirmationTimeout(_))
        ));

        confirmation.finish(&bus).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_without_publication() {
        let bus = EventBus::new();
        let mut confirmation = ConnectionConfirmation::subscribe(&bus).await;

        let result = confirmation.wait(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(ServiceError::ConfirmationTimeout(_))));
    }
}
