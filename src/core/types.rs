//! Domain types for Wi-Fi control

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Raw key management value for an open network
pub const NONE: i32 = 0;

/// Raw key management value for WPA2-PSK
///
/// The platform bit for WPA2-PSK is not part of its public key management set,
/// so the raw value is used directly.
pub const WPA2_PSK: i32 = 4;

/// SSID reported by the platform while association is still anonymous
pub const UNKNOWN_SSID: &str = "<unknown ssid>";

/// Network type label reported for Wi-Fi transports
pub const TYPE_WIFI: &str = "WIFI";

/// Integer handle of a saved profile
pub type NetworkId = i32;

/// Key management scheme of a network configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyManagement {
    None,
    Wpa2Psk,
}

impl TryFrom<i32> for KeyManagement {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, <Self as TryFrom<i32>>::Error> {
        match value {
            NONE => Ok(KeyManagement::None),
            WPA2_PSK => Ok(KeyManagement::Wpa2Psk),
            _ => Err(()),
        }
    }
}

impl From<KeyManagement> for i32 {
    fn from(key_mgmt: KeyManagement) -> Self {
        match key_mgmt {
            KeyManagement::None => NONE,
            KeyManagement::Wpa2Psk => WPA2_PSK,
        }
    }
}

/// Network configuration handed to the platform
///
/// Built per operation and never persisted here; persistence belongs to the
/// platform profile store.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkConfiguration {
    /// Network SSID
    pub ssid: String,
    /// Pre-shared key, only set for WPA2-PSK
    pub pre_shared_key: Option<String>,
    /// Allowed key management, `None` when no bit is set
    pub key_management: Option<KeyManagement>,
}

impl NetworkConfiguration {
    /// Returns `false` when a WPA2-PSK configuration carries no key
    pub fn is_valid(&self) -> bool {
        match self.key_management {
            Some(KeyManagement::Wpa2Psk) => self
                .pre_shared_key
                .as_deref()
                .is_some_and(|psk| !psk.is_empty()),
            Some(KeyManagement::None) | None => self.pre_shared_key.is_none(),
        }
    }
}

impl fmt::Debug for NetworkConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfiguration")
            .field("ssid", &self.ssid)
            .field("pre_shared_key", &self.pre_shared_key.as_ref().map(|_| "***"))
            .field("key_management", &self.key_management)
            .finish()
    }
}

/// Platform-held saved network profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedProfile {
    /// Profile handle
    pub network_id: NetworkId,
    /// SSID in the platform's stored (quoted) form
    pub ssid: String,
    /// Whether the platform has this profile disabled
    pub disabled: bool,
}

/// Snapshot of one scan result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    pub ssid: String,
    pub bssid: String,
    /// Frequency in MHz
    pub frequency: u32,
    pub channel: u16,
    /// Signal level in dBm
    pub level: i16,
}

/// Snapshot of the adapter's current association
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub bssid: String,
    pub ssid: String,
    /// IPv4 address in platform (little-endian) byte order
    pub ip_address: u32,
    pub mac_address: String,
    pub network_id: NetworkId,
}

/// Converts an address into the platform's integer representation
pub fn ip_to_platform_order(addr: Ipv4Addr) -> u32 {
    u32::from_le_bytes(addr.octets())
}

/// Converts the platform's integer representation back into an address
pub fn ip_from_platform_order(ip: u32) -> Ipv4Addr {
    Ipv4Addr::from(ip.to_le_bytes())
}

/// Detailed network state carried by a connectivity notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

/// Connection info payload of a connectivity notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Transport label, e.g. `WIFI` or `MOBILE`
    pub type_name: String,
    pub state: NetworkState,
    /// Access point identity, or [`UNKNOWN_SSID`]
    pub extra_info: Option<String>,
}

impl NetworkInfo {
    pub fn wifi(state: NetworkState, extra_info: impl Into<String>) -> Self {
        Self {
            type_name: TYPE_WIFI.to_string(),
            state,
            extra_info: Some(extra_info.into()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == NetworkState::Connected
    }

    pub fn is_connected_or_connecting(&self) -> bool {
        matches!(
            self.state,
            NetworkState::Connected | NetworkState::Connecting
        )
    }
}

/// System notification categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastAction {
    /// Wi-Fi radio state changed
    WifiStateChanged,
    /// Network state changed
    NetworkStateChanged,
}

/// A system-level connectivity notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemBroadcast {
    pub action: BroadcastAction,
    pub network_info: Option<NetworkInfo>,
}

impl SystemBroadcast {
    pub fn wifi_state_changed() -> Self {
        Self {
            action: BroadcastAction::WifiStateChanged,
            network_info: None,
        }
    }

    pub fn network_state_changed(info: NetworkInfo) -> Self {
        Self {
            action: BroadcastAction::NetworkStateChanged,
            network_info: Some(info),
        }
    }
}

/// Access point lifecycle as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPointState {
    Idle,
    Running,
}

/// Named keep-radio-awake lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiLock {
    pub tag: String,
    pub held: bool,
}

impl WifiLock {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            held: false,
        }
    }
}

/// Wraps an SSID in the quoted form platforms store it in
pub fn quoted(ssid: &str) -> String {
    format!("\"{}\"", ssid)
}

/// Blank check shared by SSID and password handling
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_management_from_raw() {
        assert_eq!(KeyManagement::try_from(0), Ok(KeyManagement::None));
        assert_eq!(KeyManagement::try_from(4), Ok(KeyManagement::Wpa2Psk));
        assert!(KeyManagement::try_from(1).is_err());
        assert!(KeyManagement::try_from(-1).is_err());
        assert_eq!(i32::from(KeyManagement::Wpa2Psk), 4);
    }

    #[test]
    fn test_configuration_validity() {
        let open = NetworkConfiguration {
            ssid: "Open".into(),
            pre_shared_key: None,
            key_management: Some(KeyManagement::None),
        };
        assert!(open.is_valid());

        let missing_key = NetworkConfiguration {
            ssid: "Secure".into(),
            pre_shared_key: Some(String::new()),
            key_management: Some(KeyManagement::Wpa2Psk),
        };
        assert!(!missing_key.is_valid());
    }

    #[test]
    fn test_configuration_debug_redacts_key() {
        let config = NetworkConfiguration {
            ssid: "Secure".into(),
            pre_shared_key: Some("hunter22".into()),
            key_management: Some(KeyManagement::Wpa2Psk),
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("hunter22"));
        assert!(printed.contains("Secure"));
    }

    #[test]
    fn test_ip_platform_order() {
        let addr = Ipv4Addr::new(192, 168, 1, 100);
        let raw = ip_to_platform_order(addr);
        assert_eq!(raw & 0xff, 192);
        assert_eq!(ip_from_platform_order(raw), addr);
    }

    #[test]
    fn test_network_info_states() {
        let info = NetworkInfo::wifi(NetworkState::Connecting, "\"Home\"");
        assert!(!info.is_connected());
        assert!(info.is_connected_or_connecting());

        let info = NetworkInfo::wifi(NetworkState::Disconnected, UNKNOWN_SSID);
        assert!(!info.is_connected_or_connecting());
    }

    #[test]
    fn test_blank_and_quoted() {
        assert!(is_blank(""));
        assert!(is_blank("   "));
        assert!(!is_blank(" a "));
        assert_eq!(quoted("MyWifi"), "\"MyWifi\"");
    }
}
