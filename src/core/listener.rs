//! Connectivity event listener
//!
//! Turns the noisy stream of system connectivity broadcasts into a single
//! "connected to a named Wi-Fi network" event on the [`EventBus`]. Broadcasts
//! are drained on a dedicated task so the delivering thread never waits on
//! subscribers.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    backend::WifiAdapter,
    core::{
        event_bus::EventBus,
        types::{BroadcastAction, NetworkInfo, SystemBroadcast, TYPE_WIFI, UNKNOWN_SSID},
    },
};

/// Both categories a connection confirmation needs
pub const CONNECTIVITY_ACTIONS: [BroadcastAction; 2] = [
    BroadcastAction::WifiStateChanged,
    BroadcastAction::NetworkStateChanged,
];

/// Listener that republishes genuine new Wi-Fi connections
pub struct ConnectivityListener {
    bus: Arc<EventBus<NetworkInfo>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityListener {
    pub fn new(bus: Arc<EventBus<NetworkInfo>>) -> Self {
        Self {
            bus,
            worker: Mutex::new(None),
        }
    }

    /// Whether a connection info payload is a fresh association to a named
    /// Wi-Fi network
    pub fn accepts(info: &NetworkInfo) -> bool {
        info.is_connected()
            && info.is_connected_or_connecting()
            && info.type_name == TYPE_WIFI
            && info
                .extra_info
                .as_deref()
                .is_some_and(|extra| extra != UNKNOWN_SSID)
    }

    /// Start receiving the given broadcast categories
    ///
    /// The adapter subscription is taken before this returns, so broadcasts
    /// caused by a later `connect` are never missed. Registering again replaces
    /// the previous registration.
    pub async fn register<A: WifiAdapter>(&self, adapter: &A, actions: &[BroadcastAction]) {
        let receiver = adapter.subscribe_broadcasts();
        let actions: HashSet<BroadcastAction> = actions.iter().copied().collect();
        let bus = self.bus.clone();

        let task = tokio::spawn(Self::run(receiver, actions, bus));
        if let Some(previous) = self.worker.lock().await.replace(task) {
            previous.abort();
        }
        info!("Connectivity listener registered");
    }

    /// Stop receiving broadcasts; safe to call when not registered
    pub async fn unregister(&self) {
        if let Some(task) = self.worker.lock().await.take() {
            task.abort();
            info!("Connectivity listener unregistered");
        }
    }

    pub async fn is_registered(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    async fn run(
        mut receiver: broadcast::Receiver<SystemBroadcast>,
        actions: HashSet<BroadcastAction>,
        bus: Arc<EventBus<NetworkInfo>>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(broadcast) if actions.contains(&broadcast.action) => {
                    Self::on_receive(&bus, broadcast).await;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Connectivity listener lagged by {} broadcasts", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast source closed");
                    break;
                }
            }
        }
    }

    /// Handle one broadcast: publish its payload if it passes the filter
    async fn on_receive(bus: &EventBus<NetworkInfo>, broadcast: SystemBroadcast) -> bool {
        let Some(info) = broadcast.network_info else {
            return false;
        };
        if !Self::accepts(&info) {
            debug!(?info, "Dropping connectivity broadcast");
            return false;
        }

        info!(extra_info = ?info.extra_info, "Wi-Fi connection established");
        bus.publish(&info).await;
        true
    }
}

impl Drop for ConnectivityListener {
    fn drop(&mut self) {
        if let Some(task) = self.worker.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockWifiAdapter;
    use crate::core::types::NetworkState;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn connected(type_name: &str, extra_info: &str) -> NetworkInfo {
        NetworkInfo {
            type_name: type_name.to_string(),
            state: NetworkState::Connected,
            extra_info: Some(extra_info.to_string()),
        }
    }

    async fn collecting_bus() -> (Arc<EventBus<NetworkInfo>>, Arc<StdMutex<Vec<NetworkInfo>>>) {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(move |info: &NetworkInfo| sink.lock().unwrap().push(info.clone()))
            .await;
        (bus, seen)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn test_accepts_named_wifi_connection() {
        assert!(ConnectivityListener::accepts(&connected(
            "WIFI",
            "\"actual-ssid\""
        )));
    }

    #[test]
    fn test_rejects_unknown_ssid() {
        assert!(!ConnectivityListener::accepts(&connected(
            "WIFI",
            UNKNOWN_SSID
        )));
    }

    #[test]
    fn test_rejects_mobile() {
        assert!(!ConnectivityListener::accepts(&connected(
            "MOBILE",
            "\"actual-ssid\""
        )));
    }

    #[test]
    fn test_rejects_connecting_and_missing_extra_info() {
        let connecting = NetworkInfo::wifi(NetworkState::Connecting, "\"actual-ssid\"");
        assert!(!ConnectivityListener::accepts(&connecting));

        let mut anonymous = connected("WIFI", "\"actual-ssid\"");
        anonymous.extra_info = None;
        assert!(!ConnectivityListener::accepts(&anonymous));
    }

    #[tokio::test]
    async fn test_on_receive_publishes_exactly_once() {
        let (bus, seen) = collecting_bus().await;

        let accepted = ConnectivityListener::on_receive(
            &bus,
            SystemBroadcast::network_state_changed(connected("WIFI", "actual-ssid")),
        )
        .await;
        assert!(accepted);

        let dropped = [
            SystemBroadcast::network_state_changed(connected("WIFI", UNKNOWN_SSID)),
            SystemBroadcast::network_state_changed(connected("MOBILE", "actual-ssid")),
            SystemBroadcast::wifi_state_changed(),
        ];
        for broadcast in dropped {
            assert!(!ConnectivityListener::on_receive(&bus, broadcast).await);
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].extra_info.as_deref(), Some("actual-ssid"));
    }

    #[tokio::test]
    async fn test_registered_listener_filters_adapter_broadcasts() {
        let adapter = MockWifiAdapter::new();
        let (bus, seen) = collecting_bus().await;
        let listener = ConnectivityListener::new(bus);

        listener.register(&adapter, &CONNECTIVITY_ACTIONS).await;
        assert!(listener.is_registered().await);

        adapter.emit(SystemBroadcast::wifi_state_changed());
        adapter.emit(SystemBroadcast::network_state_changed(connected(
            "WIFI",
            UNKNOWN_SSID,
        )));
        adapter.emit(SystemBroadcast::network_state_changed(connected(
            "WIFI", "\"Home\"",
        )));
        settle().await;

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unregistered_listener_ignores_broadcasts() {
        let adapter = MockWifiAdapter::new();
        let (bus, seen) = collecting_bus().await;
        let listener = ConnectivityListener::new(bus);

        listener.register(&adapter, &CONNECTIVITY_ACTIONS).await;
        listener.unregister().await;
        listener.unregister().await;
        assert!(!listener.is_registered().await);

        adapter.emit(SystemBroadcast::network_state_changed(connected(
            "WIFI", "\"Home\"",
        )));
        settle().await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listener_honors_registered_actions() {
        let adapter = MockWifiAdapter::new();
        let (bus, seen) = collecting_bus().await;
        let listener = ConnectivityListener::new(bus);

        listener
            .register(&adapter, &[BroadcastAction::WifiStateChanged])
            .await;
        adapter.emit(SystemBroadcast::network_state_changed(connected(
            "WIFI", "\"Home\"",
        )));
        settle().await;

        assert!(seen.lock().unwrap().is_empty());
    }
}
