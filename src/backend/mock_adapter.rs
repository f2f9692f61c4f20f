//! Mock Wi-Fi adapter for testing

use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

use crate::backend::WifiAdapter;
use crate::core::error::{Unavailable, WifiError, WifiResult};
use crate::core::types::{
    ConnectionInfo, KeyManagement, NetworkConfiguration, NetworkId, NetworkInfo, NetworkState,
    SavedProfile, ScanResult, SystemBroadcast, UNKNOWN_SSID, quoted,
};

const BROADCAST_CAPACITY: usize = 64;

/// Platform call recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    IsWifiEnabled,
    SetWifiEnabled(bool),
    ConnectionInfo,
    StartScan,
    ScanResults,
    ConfiguredNetworks,
    AddNetwork(String, Option<KeyManagement>),
    EnableNetwork(NetworkId),
    DisableNetwork(NetworkId),
    RemoveNetwork(NetworkId),
    Disconnect,
    SetKeepAwake(String, bool),
    SetAccessPointEnabled(String, bool),
}

/// Internal state for the mock adapter
#[derive(Debug)]
struct MockState {
    wifi_enabled: bool,
    connection_info: Option<ConnectionInfo>,
    scan_results: Vec<ScanResult>,
    profiles: Vec<SavedProfile>,
    next_network_id: NetworkId,
    should_fail_add: bool,
    should_fail_enable: bool,
    access_point_failure: Option<Unavailable>,
    access_point_enabled: bool,
    auto_associate: bool,
    keep_awake_held: bool,
    calls: Vec<AdapterCall>,
}

/// Mock Wi-Fi adapter for testing
///
/// Records every platform call and lets tests inject broadcasts.
#[derive(Debug, Clone)]
pub struct MockWifiAdapter {
    inner: Arc<Mutex<MockState>>,
    broadcasts: broadcast::Sender<SystemBroadcast>,
}

impl MockWifiAdapter {
    /// Create a new mock adapter with the radio enabled and nothing saved
    pub fn new() -> Self {
        let (broadcasts, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(MockState {
                wifi_enabled: true,
                connection_info: None,
                scan_results: vec![],
                profiles: vec![],
                next_network_id: 1,
                should_fail_add: false,
                should_fail_enable: false,
                access_point_failure: None,
                access_point_enabled: false,
                auto_associate: false,
                keep_awake_held: false,
                calls: vec![],
            })),
            broadcasts,
        }
    }

    /// Configure the association reported by `connection_info`
    pub async fn set_connection_info(&self, info: Option<ConnectionInfo>) {
        self.inner.lock().await.connection_info = info;
    }

    /// Configure mock to return specific networks on scan
    pub async fn set_scan_results(&self, results: Vec<ScanResult>) {
        self.inner.lock().await.scan_results = results;
    }

    pub async fn set_wifi_enabled_state(&self, enabled: bool) {
        self.inner.lock().await.wifi_enabled = enabled;
    }

    /// Configure mock to fail `add_network`
    pub async fn set_add_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_add = should_fail;
    }

    /// Configure mock to fail `enable_network`
    pub async fn set_enable_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_enable = should_fail;
    }

    /// Make the access point operation fail with the given reason
    pub async fn set_access_point_failure(&self, reason: Option<Unavailable>) {
        self.inner.lock().await.access_point_failure = reason;
    }

    /// Emit a realistic burst of broadcasts whenever a profile is enabled
    pub async fn set_auto_associate(&self, auto_associate: bool) {
        self.inner.lock().await.auto_associate = auto_associate;
    }

    /// Choose the handle the next saved profile gets
    pub async fn set_next_network_id(&self, network_id: NetworkId) {
        self.inner.lock().await.next_network_id = network_id;
    }

    /// Insert a saved profile directly, as if saved by another tool
    pub async fn insert_profile(&self, ssid: &str) -> NetworkId {
        let mut state = self.inner.lock().await;
        let network_id = state.next_network_id;
        state.next_network_id += 1;
        state.profiles.push(SavedProfile {
            network_id,
            ssid: quoted(ssid),
            disabled: false,
        });
        network_id
    }

    /// Deliver a broadcast to every current subscriber
    pub fn emit(&self, broadcast: SystemBroadcast) {
        // No subscribers is not an error for a broadcast source
        let _ = self.broadcasts.send(broadcast);
    }

    pub async fn calls(&self) -> Vec<AdapterCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.inner.lock().await.calls.clear();
    }

    pub async fn profiles(&self) -> Vec<SavedProfile> {
        self.inner.lock().await.profiles.clone()
    }

    pub async fn access_point_enabled(&self) -> bool {
        self.inner.lock().await.access_point_enabled
    }

    pub async fn keep_awake_held(&self) -> bool {
        self.inner.lock().await.keep_awake_held
    }

    fn association_burst(ssid: &str) -> Vec<SystemBroadcast> {
        vec![
            SystemBroadcast::wifi_state_changed(),
            SystemBroadcast::network_state_changed(NetworkInfo::wifi(
                NetworkState::Connecting,
                UNKNOWN_SSID,
            )),
            SystemBroadcast::network_state_changed(NetworkInfo::wifi(
                NetworkState::Connected,
                UNKNOWN_SSID,
            )),
            SystemBroadcast::network_state_changed(NetworkInfo::wifi(
                NetworkState::Connected,
                ssid,
            )),
            SystemBroadcast::network_state_changed(NetworkInfo::wifi(
                NetworkState::Connected,
                ssid,
            )),
        ]
    }
}

impl Default for MockWifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter for MockWifiAdapter {
    async fn is_wifi_enabled(&self) -> WifiResult<bool> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::IsWifiEnabled);
        Ok(state.wifi_enabled)
    }

    async fn set_wifi_enabled(&self, enabled: bool) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::SetWifiEnabled(enabled));
        state.wifi_enabled = enabled;
        drop(state);
        self.emit(SystemBroadcast::wifi_state_changed());
        Ok(())
    }

    async fn connection_info(&self) -> WifiResult<Option<ConnectionInfo>> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::ConnectionInfo);
        Ok(state.connection_info.clone())
    }

    async fn start_scan(&self) -> WifiResult<()> {
        self.inner.lock().await.calls.push(AdapterCall::StartScan);
        Ok(())
    }

    async fn scan_results(&self) -> WifiResult<Vec<ScanResult>> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::ScanResults);
        Ok(state.scan_results.clone())
    }

    async fn configured_networks(&self) -> WifiResult<Vec<SavedProfile>> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::ConfiguredNetworks);
        Ok(state.profiles.clone())
    }

    async fn add_network(&self, config: &NetworkConfiguration) -> WifiResult<NetworkId> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::AddNetwork(
            config.ssid.clone(),
            config.key_management,
        ));
        if state.should_fail_add {
            return Err(WifiError::ProfileFailed("Mock add failure".into()));
        }
        let network_id = state.next_network_id;
        state.next_network_id += 1;
        state.profiles.push(SavedProfile {
            network_id,
            ssid: quoted(&config.ssid),
            disabled: true,
        });
        Ok(network_id)
    }

    async fn enable_network(
        &self,
        network_id: NetworkId,
        disable_others: bool,
    ) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::EnableNetwork(network_id));
        if state.should_fail_enable {
            return Err(WifiError::ConnectionFailed("Mock enable failure".into()));
        }
        let mut enabled_ssid = None;
        for profile in state.profiles.iter_mut() {
            if profile.network_id == network_id {
                profile.disabled = false;
                enabled_ssid = Some(profile.ssid.clone());
            } else if disable_others {
                profile.disabled = true;
            }
        }
        let Some(ssid) = enabled_ssid else {
            return Err(WifiError::ProfileFailed(format!(
                "Unknown network id {}",
                network_id
            )));
        };
        let auto_associate = state.auto_associate;
        drop(state);

        if auto_associate {
            for broadcast in Self::association_burst(&ssid) {
                self.emit(broadcast);
            }
        }
        Ok(())
    }

    async fn disable_network(&self, network_id: NetworkId) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::DisableNetwork(network_id));
        if let Some(profile) = state
            .profiles
            .iter_mut()
            .find(|profile| profile.network_id == network_id)
        {
            profile.disabled = true;
        }
        Ok(())
    }

    async fn remove_network(&self, network_id: NetworkId) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::RemoveNetwork(network_id));
        let before = state.profiles.len();
        state
            .profiles
            .retain(|profile| profile.network_id != network_id);
        if state.profiles.len() == before {
            return Err(WifiError::ProfileFailed(format!(
                "Unknown network id {}",
                network_id
            )));
        }
        Ok(())
    }

    async fn disconnect(&self) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(AdapterCall::Disconnect);
        state.connection_info = None;
        drop(state);
        self.emit(SystemBroadcast::network_state_changed(NetworkInfo::wifi(
            NetworkState::Disconnected,
            UNKNOWN_SSID,
        )));
        Ok(())
    }

    async fn set_keep_awake(&self, tag: &str, held: bool) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state
            .calls
            .push(AdapterCall::SetKeepAwake(tag.to_string(), held));
        state.keep_awake_held = held;
        Ok(())
    }

    async fn set_access_point_enabled(
        &self,
        config: &NetworkConfiguration,
        enabled: bool,
    ) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state
            .calls
            .push(AdapterCall::SetAccessPointEnabled(config.ssid.clone(), enabled));
        if let Some(reason) = state.access_point_failure.clone() {
            return Err(WifiError::OperationUnavailable {
                operation: "set_access_point_enabled",
                reason,
            });
        }
        state.access_point_enabled = enabled;
        Ok(())
    }

    fn subscribe_broadcasts(&self) -> broadcast::Receiver<SystemBroadcast> {
        self.broadcasts.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_config(ssid: &str) -> NetworkConfiguration {
        NetworkConfiguration {
            ssid: ssid.to_string(),
            pre_shared_key: None,
            key_management: Some(KeyManagement::None),
        }
    }

    #[tokio::test]
    async fn test_mock_adapter_profiles() {
        let adapter = MockWifiAdapter::new();

        let id = adapter.add_network(&open_config("Cafe")).await.unwrap();
        adapter.enable_network(id, true).await.unwrap();

        let profiles = adapter.configured_networks().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].ssid, "\"Cafe\"");
        assert!(!profiles[0].disabled);

        adapter.disable_network(id).await.unwrap();
        assert!(adapter.profiles().await[0].disabled);

        adapter.remove_network(id).await.unwrap();
        assert!(adapter.remove_network(id).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_adapter_access_point_failure() {
        let adapter = MockWifiAdapter::new();
        adapter
            .set_access_point_failure(Some(Unavailable::AccessDenied))
            .await;

        let result = adapter
            .set_access_point_enabled(&open_config("Hotspot"), true)
            .await;
        assert!(matches!(
            result,
            Err(WifiError::OperationUnavailable {
                reason: Unavailable::AccessDenied,
                ..
            })
        ));
        assert!(!adapter.access_point_enabled().await);
    }

    #[tokio::test]
    async fn test_mock_adapter_auto_associate_burst() {
        let adapter = MockWifiAdapter::new();
        adapter.set_auto_associate(true).await;
        let mut receiver = adapter.subscribe_broadcasts();

        let id = adapter.add_network(&open_config("Cafe")).await.unwrap();
        adapter.enable_network(id, true).await.unwrap();

        let mut received = vec![];
        while let Ok(broadcast) = receiver.try_recv() {
            received.push(broadcast);
        }
        assert_eq!(received.len(), 5);
        assert_eq!(
            received[3].network_info.as_ref().unwrap().extra_info.as_deref(),
            Some("\"Cafe\"")
        );
    }

    #[tokio::test]
    async fn test_mock_adapter_records_calls() {
        let adapter = MockWifiAdapter::new();
        adapter.start_scan().await.unwrap();
        adapter.disconnect().await.unwrap();

        assert_eq!(
            adapter.calls().await,
            vec![AdapterCall::StartScan, AdapterCall::Disconnect]
        );
    }
}
