//! Wi-Fi Hotspot Control
//!
//! Access point and station control over a platform Wi-Fi adapter:
//! - Starting and stopping a software access point
//! - Scanning, connecting to and disconnecting from named networks
//! - Republishing genuine new Wi-Fi connections to in-process subscribers

pub mod backend;
pub mod config;
pub mod core;

pub use core::{
    error::{ServiceError, Unavailable, WifiError},
    types::{
        AccessPointState, ConnectionInfo, KeyManagement, NetworkConfiguration, NetworkInfo,
        SavedProfile, ScanResult,
    },
};
