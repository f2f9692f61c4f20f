//! Platform Wi-Fi adapter trait definition

use tokio::sync::broadcast;
use trait_variant::make;

use crate::core::error::WifiResult;
use crate::core::types::{
    ConnectionInfo, NetworkConfiguration, NetworkId, SavedProfile, ScanResult, SystemBroadcast,
};

/// Abstraction over the OS Wi-Fi subsystem
///
/// Every call returns once the platform call has returned. Implementations
/// also act as the source of system connectivity broadcasts.
#[make(Send)]
pub trait WifiAdapter: Sync + 'static {
    /// Whether the client radio is enabled
    async fn is_wifi_enabled(&self) -> WifiResult<bool>;

    /// Enable or disable the client radio
    async fn set_wifi_enabled(&self, enabled: bool) -> WifiResult<()>;

    /// Current association, `None` when the platform reports nothing
    async fn connection_info(&self) -> WifiResult<Option<ConnectionInfo>>;

    /// Trigger a scan
    async fn start_scan(&self) -> WifiResult<()>;

    /// Results of the most recent scan
    async fn scan_results(&self) -> WifiResult<Vec<ScanResult>>;

    /// Saved network profiles
    async fn configured_networks(&self) -> WifiResult<Vec<SavedProfile>>;

    /// Add a profile, returning its handle
    async fn add_network(&self, config: &NetworkConfiguration) -> WifiResult<NetworkId>;

    /// Enable a profile for connection, optionally disabling all others
    async fn enable_network(&self, network_id: NetworkId, disable_others: bool)
    -> WifiResult<()>;

    /// Disable a profile
    async fn disable_network(&self, network_id: NetworkId) -> WifiResult<()>;

    /// Remove a profile
    async fn remove_network(&self, network_id: NetworkId) -> WifiResult<()>;

    /// Drop the active association
    async fn disconnect(&self) -> WifiResult<()>;

    /// Hold or release the named keep-radio-awake lock
    async fn set_keep_awake(&self, tag: &str, held: bool) -> WifiResult<()>;

    /// Enable or disable access point mode
    ///
    /// This capability is not part of the platform's stable surface. Each
    /// implementation resolves it at call time and reports
    /// [`WifiError::OperationUnavailable`](crate::core::error::WifiError::OperationUnavailable)
    /// when it cannot be located or invoked.
    async fn set_access_point_enabled(
        &self,
        config: &NetworkConfiguration,
        enabled: bool,
    ) -> WifiResult<()>;

    /// Subscribe to system connectivity broadcasts
    ///
    /// Broadcasts sent before this call are not delivered to the receiver.
    fn subscribe_broadcasts(&self) -> broadcast::Receiver<SystemBroadcast>;
}
