//! Platform Wi-Fi adapter layer

pub mod mock_adapter;
pub mod wifi_adapter;
pub mod wpa_adapter;

pub use wifi_adapter::WifiAdapter;
pub use wpa_adapter::WpaSupplicantAdapter;

#[cfg(test)]
pub use mock_adapter::{AdapterCall, MockWifiAdapter};
