//! Main Wi-Fi service facade

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    backend::WifiAdapter,
    core::{
        confirmation::ConnectionConfirmation,
        controller::{WifiController, build_config},
        error::{ServiceError, ServiceResult},
        event_bus::EventBus,
        listener::{CONNECTIVITY_ACTIONS, ConnectivityListener},
        types::NetworkInfo,
    },
};

/// Caller-facing Wi-Fi service
///
/// Owns the controller, the event bus and the connectivity listener wired to
/// the same adapter.
pub struct WifiService<A: WifiAdapter> {
    adapter: Arc<A>,
    pub controller: Arc<WifiController<A>>,
    pub events: Arc<EventBus<NetworkInfo>>,
    pub listener: Arc<ConnectivityListener>,
}

impl<A: WifiAdapter> WifiService<A> {
    pub async fn new(adapter: Arc<A>) -> Self {
        let controller = Arc::new(WifiController::new(adapter.clone()).await);
        let events = Arc::new(EventBus::new());
        let listener = Arc::new(ConnectivityListener::new(events.clone()));

        Self {
            adapter,
            controller,
            events,
            listener,
        }
    }

    /// Start an access point with the given credentials
    pub async fn open_access_point(&self, ssid: &str, password: &str, key_mgmt: i32) -> bool {
        let config = build_config(ssid, password, key_mgmt);
        self.controller.open_access_point(Some(&config)).await
    }

    /// Stop the access point started with the given credentials
    pub async fn close_access_point(&self, ssid: &str, password: &str, key_mgmt: i32) -> bool {
        let config = build_config(ssid, password, key_mgmt);
        self.controller.close_access_point(Some(&config)).await
    }

    pub async fn connect(&self, ssid: &str, password: &str) -> bool {
        self.controller.connect(ssid, password).await
    }

    pub async fn disconnect(&self, ssid: &str) {
        self.controller.disconnect(ssid).await
    }

    /// Connect and wait for the platform to confirm the association
    ///
    /// Subscribes before connecting, keeps the first confirmed event only and
    /// unsubscribes before returning, whatever the outcome.
    pub async fn connect_and_wait(
        &self,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> ServiceResult<NetworkInfo> {
        self.listener
            .register(self.adapter.as_ref(), &CONNECTIVITY_ACTIONS)
            .await;
        let mut confirmation = ConnectionConfirmation::subscribe(&self.events).await;

        let result = if self.controller.connect(ssid, password).await {
            confirmation.wait(timeout).await
        } else {
            Err(ServiceError::ConnectRejected(ssid.to_string()))
        };

        confirmation.finish(&self.events).await;
        self.listener.unregister().await;

        match &result {
            Ok(info) => info!(extra_info = ?info.extra_info, "Connection confirmed"),
            Err(e) => warn!(ssid, "Connection not confirmed: {}", e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AdapterCall, MockWifiAdapter};
    use crate::core::types::{AccessPointState, NONE, SystemBroadcast, WPA2_PSK};
    use pretty_assertions::assert_eq;

    async fn service() -> (Arc<MockWifiAdapter>, WifiService<MockWifiAdapter>) {
        let adapter = Arc::new(MockWifiAdapter::new());
        let service = WifiService::new(adapter.clone()).await;
        (adapter, service)
    }

    #[tokio::test]
    async fn test_service_access_point_lifecycle() {
        let (adapter, service) = service().await;

        assert!(
            service
                .open_access_point("WifiTest", "WifiTest123", WPA2_PSK)
                .await
        );
        assert!(adapter.access_point_enabled().await);
        assert_eq!(
            service.controller.access_point_state().await,
            AccessPointState::Running
        );

        assert!(
            service
                .close_access_point("WifiTest", "WifiTest123", WPA2_PSK)
                .await
        );
        assert!(!adapter.access_point_enabled().await);
    }

    #[tokio::test]
    async fn test_service_open_ap_with_unknown_key_mgmt() {
        let (adapter, service) = service().await;

        // No key management bit set is still a usable configuration
        assert!(service.open_access_point("Odd", "secret", 7).await);
        assert!(service.open_access_point("Open", "", NONE).await);
        assert!(adapter.access_point_enabled().await);
    }

    #[tokio::test]
    async fn test_connect_and_wait_consumes_once() {
        let (adapter, service) = service().await;
        adapter.set_auto_associate(true).await;

        let info = service
            .connect_and_wait("MyWifi", "123456789", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(info.extra_info.as_deref(), Some("\"MyWifi\""));
        assert!(!service.listener.is_registered().await);
        assert_eq!(service.events.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_connect_and_wait_rejected() {
        let (adapter, service) = service().await;

        let result = service
            .connect_and_wait("", "123456789", Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(ServiceError::ConnectRejected(_))));
        assert!(adapter.calls().await.iter().all(|call| matches!(
            call,
            AdapterCall::ConnectionInfo
        )));
        assert!(!service.listener.is_registered().await);
    }

    #[tokio::test]
    async fn test_connect_and_wait_times_out_on_anonymous_association() {
        let (adapter, service) = service().await;

        let waiter = service.connect_and_wait("MyWifi", "", Duration::from_millis(100));
        let emitter = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            adapter.emit(SystemBroadcast::network_state_changed(NetworkInfo::wifi(
                crate::core::types::NetworkState::Connected,
                crate::core::types::UNKNOWN_SSID,
            )));
        };
        let (result, ()) = tokio::join!(waiter, emitter);

        assert!(matches!(result, Err(ServiceError::ConfirmationTimeout(_))));
        assert_eq!(service.events.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_service_disconnect() {
        let (adapter, service) = service().await;
        assert!(service.connect("MyWifi", "123456789").await);

        service.disconnect("MyWifi").await;

        assert!(adapter.profiles().await[0].disabled);
        assert_eq!(adapter.calls().await.last(), Some(&AdapterCall::Disconnect));
    }
}
