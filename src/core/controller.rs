//! Wi-Fi controller: access point and station orchestration
//!
//! Every operation awaits the underlying platform call and absorbs its
//! failure: callers only ever see a `bool` or a neutral value.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::{
    backend::WifiAdapter,
    core::types::{
        AccessPointState, ConnectionInfo, KeyManagement, NetworkConfiguration, NetworkId,
        SavedProfile, ScanResult, WifiLock, ip_from_platform_order, is_blank, quoted,
    },
};

/// State owned by one controller instance
#[derive(Debug)]
struct ControllerState {
    /// Point-in-time association snapshot, only refreshed on request
    connection_info: Option<ConnectionInfo>,
    scan_results: Vec<ScanResult>,
    saved_profiles: Vec<SavedProfile>,
    lock: Option<WifiLock>,
    access_point: AccessPointState,
}

/// Build a network configuration
///
/// Pure construction. `key_mgmt` is one of [`NONE`](crate::core::types::NONE)
/// or [`WPA2_PSK`](crate::core::types::WPA2_PSK); any other value yields a
/// configuration with no key management set.
pub fn build_config(ssid: &str, password: &str, key_mgmt: i32) -> NetworkConfiguration {
    let key_management = KeyManagement::try_from(key_mgmt).ok();
    let pre_shared_key = match key_management {
        Some(KeyManagement::Wpa2Psk) => Some(password.to_string()),
        Some(KeyManagement::None) | None => None,
    };

    NetworkConfiguration {
        ssid: ssid.to_string(),
        pre_shared_key,
        key_management,
    }
}

/// Access point configuration if present and consistent, logging why not
fn usable_config<'a>(
    config: Option<&'a NetworkConfiguration>,
    action: &str,
) -> Option<&'a NetworkConfiguration> {
    let Some(config) = config else {
        warn!("Cannot {} access point without a configuration", action);
        return None;
    };
    if !config.is_valid() {
        warn!(
            ssid = %config.ssid,
            "Cannot {} access point: WPA2-PSK configuration has no pre-shared key",
            action
        );
        return None;
    }
    Some(config)
}

/// Wi-Fi controller
pub struct WifiController<A: WifiAdapter> {
    adapter: Arc<A>,
    state: RwLock<ControllerState>,
}

impl<A: WifiAdapter> WifiController<A> {
    /// Create a controller, taking the connection info snapshot
    pub async fn new(adapter: Arc<A>) -> Self {
        let connection_info = Self::query_connection_info(&adapter).await;
        Self {
            adapter,
            state: RwLock::new(ControllerState {
                connection_info,
                scan_results: Vec::new(),
                saved_profiles: Vec::new(),
                lock: None,
                access_point: AccessPointState::Idle,
            }),
        }
    }

    async fn query_connection_info(adapter: &A) -> Option<ConnectionInfo> {
        match adapter.connection_info().await {
            Ok(info) => info,
            Err(e) => {
                warn!("Failed to read connection info: {}", e);
                None
            }
        }
    }

    /// Re-read the connection info snapshot
    pub async fn refresh_connection_info(&self) {
        let info = Self::query_connection_info(&self.adapter).await;
        self.state.write().await.connection_info = info;
    }

    /// Enable the client radio if it is off
    pub async fn open_wifi(&self) {
        match self.adapter.is_wifi_enabled().await {
            Ok(false) => {
                if let Err(e) = self.adapter.set_wifi_enabled(true).await {
                    warn!("Failed to enable WiFi: {}", e);
                }
            }
            Ok(true) => {}
            Err(e) => warn!("Failed to read WiFi state: {}", e),
        }
    }

    /// Disable the client radio if it is on
    pub async fn close_wifi(&self) {
        match self.adapter.is_wifi_enabled().await {
            Ok(true) => {
                if let Err(e) = self.adapter.set_wifi_enabled(false).await {
                    warn!("Failed to disable WiFi: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to read WiFi state: {}", e),
        }
    }

    /// Start the access point
    ///
    /// Client mode is turned off first since both share the radio. Returns
    /// `false` for a missing or invalid configuration without touching the
    /// platform, and `false` when the privileged operation fails.
    pub async fn open_access_point(&self, config: Option<&NetworkConfiguration>) -> bool {
        let Some(config) = usable_config(config, "start") else {
            return false;
        };

        self.close_wifi().await;
        match self.adapter.set_access_point_enabled(config, true).await {
            Ok(()) => {
                self.state.write().await.access_point = AccessPointState::Running;
                info!(ssid = %config.ssid, "Access point started");
                true
            }
            Err(e) => {
                error!(ssid = %config.ssid, "Failed to start access point: {}", e);
                false
            }
        }
    }

    /// Stop the access point; client mode is left as is
    pub async fn close_access_point(&self, config: Option<&NetworkConfiguration>) -> bool {
        let Some(config) = usable_config(config, "stop") else {
            return false;
        };

        match self.adapter.set_access_point_enabled(config, false).await {
            Ok(()) => {
                self.state.write().await.access_point = AccessPointState::Idle;
                info!(ssid = %config.ssid, "Access point stopped");
                true
            }
            Err(e) => {
                error!(ssid = %config.ssid, "Failed to stop access point: {}", e);
                false
            }
        }
    }

    pub async fn access_point_state(&self) -> AccessPointState {
        self.state.read().await.access_point
    }

    /// Scan and snapshot scan results and saved profiles
    ///
    /// Both snapshots replace the previous ones.
    pub async fn start_scan(&self) {
        if let Err(e) = self.adapter.start_scan().await {
            warn!("Failed to trigger scan: {}", e);
        }

        let scan_results = self.adapter.scan_results().await.unwrap_or_else(|e| {
            warn!("Failed to read scan results: {}", e);
            Vec::new()
        });
        let saved_profiles = self.saved_profiles_now().await;

        debug!(
            networks = scan_results.len(),
            profiles = saved_profiles.len(),
            "Scan snapshot taken"
        );
        let mut state = self.state.write().await;
        state.scan_results = scan_results;
        state.saved_profiles = saved_profiles;
    }

    async fn saved_profiles_now(&self) -> Vec<SavedProfile> {
        self.adapter.configured_networks().await.unwrap_or_else(|e| {
            warn!("Failed to read saved profiles: {}", e);
            Vec::new()
        })
    }

    /// Connect to a network
    ///
    /// An empty password selects an open network, anything else WPA2-PSK.
    /// A new profile is added on every call, even when one with this SSID is
    /// already saved.
    pub async fn connect(&self, ssid: &str, password: &str) -> bool {
        if is_blank(ssid) {
            return false;
        }

        self.open_wifi().await;
        let key_mgmt = if is_blank(password) {
            KeyManagement::None
        } else {
            KeyManagement::Wpa2Psk
        };
        let config = build_config(ssid, password, key_mgmt.into());
        self.add_network(&config).await
    }

    /// Add a profile and enable it for connection
    pub async fn add_network(&self, config: &NetworkConfiguration) -> bool {
        let network_id = match self.adapter.add_network(config).await {
            Ok(network_id) => network_id,
            Err(e) => {
                warn!(ssid = %config.ssid, "Failed to add network: {}", e);
                return false;
            }
        };

        match self.adapter.enable_network(network_id, true).await {
            Ok(()) => {
                info!(ssid = %config.ssid, network_id, "Network enabled");
                true
            }
            Err(e) => {
                warn!(ssid = %config.ssid, network_id, "Failed to enable network: {}", e);
                if let Err(e) = self.adapter.remove_network(network_id).await {
                    warn!(network_id, "Failed to remove unusable network: {}", e);
                }
                false
            }
        }
    }

    /// Disable the saved profile for `ssid` and drop the active association
    ///
    /// A missing profile disables nothing, since platform handles may start at
    /// `0`. The association is dropped either way.
    pub async fn disconnect(&self, ssid: &str) {
        let profile = if is_blank(ssid) {
            None
        } else {
            self.find_profile(ssid).await
        };
        match profile {
            Some(profile) => {
                let network_id = profile.network_id;
                if let Err(e) = self.adapter.disable_network(network_id).await {
                    warn!(ssid, network_id, "Failed to disable network: {}", e);
                }
            }
            None => debug!(ssid, "No saved profile to disable"),
        }
        if let Err(e) = self.adapter.disconnect().await {
            warn!("Failed to disconnect: {}", e);
        }
    }

    /// Remove the saved profile for `ssid`
    pub async fn remove_profile(&self, ssid: &str) -> bool {
        let Some(profile) = self.find_profile(ssid).await else {
            debug!(ssid, "No saved profile to remove");
            return false;
        };

        match self.adapter.remove_network(profile.network_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(ssid, "Failed to remove network: {}", e);
                false
            }
        }
    }

    /// Handle of the saved profile for `ssid`, `0` when empty or not found
    pub async fn network_id_by_ssid(&self, ssid: &str) -> NetworkId {
        if is_blank(ssid) {
            return 0;
        }
        self.find_profile(ssid)
            .await
            .map(|profile| profile.network_id)
            .unwrap_or(0)
    }

    async fn find_profile(&self, ssid: &str) -> Option<SavedProfile> {
        let target = quoted(ssid);
        self.saved_profiles_now()
            .await
            .into_iter()
            .find(|profile| profile.ssid == target)
    }

    /// Create the named keep-awake lock, replacing any previous one
    pub async fn create_lock(&self, tag: &str) {
        self.state.write().await.lock = Some(WifiLock::new(tag));
    }

    /// Acquire the keep-awake lock; no-op without one
    pub async fn acquire_lock(&self) {
        let mut state = self.state.write().await;
        let Some(lock) = state.lock.as_mut() else {
            return;
        };

        match self.adapter.set_keep_awake(&lock.tag, true).await {
            Ok(()) => lock.held = true,
            Err(e) => warn!(tag = %lock.tag, "Failed to acquire WiFi lock: {}", e),
        }
    }

    /// Release the keep-awake lock if held; safe to repeat
    pub async fn release_lock(&self) {
        let mut state = self.state.write().await;
        let Some(lock) = state.lock.as_mut().filter(|lock| lock.held) else {
            return;
        };

        match self.adapter.set_keep_awake(&lock.tag, false).await {
            Ok(()) => lock.held = false,
            Err(e) => warn!(tag = %lock.tag, "Failed to release WiFi lock: {}", e),
        }
    }

    pub async fn is_lock_held(&self) -> bool {
        self.state
            .read()
            .await
            .lock
            .as_ref()
            .is_some_and(|lock| lock.held)
    }

    async fn with_info<T>(&self, read: impl FnOnce(&ConnectionInfo) -> T) -> Option<T> {
        self.state.read().await.connection_info.as_ref().map(read)
    }

    pub async fn bssid(&self) -> String {
        self.with_info(|info| info.bssid.clone())
            .await
            .unwrap_or_default()
    }

    pub async fn ssid(&self) -> String {
        self.with_info(|info| info.ssid.clone())
            .await
            .unwrap_or_default()
    }

    /// IPv4 address in platform byte order, `0` when unknown
    pub async fn ip_address(&self) -> u32 {
        self.with_info(|info| info.ip_address)
            .await
            .unwrap_or_default()
    }

    pub async fn ip_addr(&self) -> Ipv4Addr {
        ip_from_platform_order(self.ip_address().await)
    }

    pub async fn mac_address(&self) -> String {
        self.with_info(|info| info.mac_address.clone())
            .await
            .unwrap_or_default()
    }

    pub async fn network_id(&self) -> NetworkId {
        self.with_info(|info| info.network_id)
            .await
            .unwrap_or_default()
    }

    pub async fn connection_info(&self) -> Option<ConnectionInfo> {
        self.state.read().await.connection_info.clone()
    }

    /// Scan results from the most recent `start_scan`
    pub async fn scan_results(&self) -> Vec<ScanResult> {
        self.state.read().await.scan_results.clone()
    }

    /// Saved profiles from the most recent `start_scan`
    pub async fn saved_profiles(&self) -> Vec<SavedProfile> {
        self.state.read().await.saved_profiles.clone()
    }
}
