//! Command-line argument parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[clap(name = "wifi-hotspot-control", version, author)]
#[clap(about = "Wi-Fi access point and station control over wpa_supplicant")]
pub struct CliArgs {
    /// Wireless network interface name
    #[clap(short, long, default_value = "wlan0")]
    pub interface: String,

    /// Directory holding the wpa_supplicant control sockets
    #[clap(long, default_value = "/var/run/wpa_supplicant")]
    pub ctrl_dir: String,

    /// Tag of the keep-awake lock held while the access point runs
    #[clap(long, default_value = "wifi-hotspot-control")]
    pub lock_tag: String,

    /// Seconds to wait for a connection to be confirmed
    #[clap(long, default_value = "30")]
    pub connect_timeout: u64,

    #[clap(subcommand)]
    pub command: Command,
}

/// Key management accepted on the command line
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMgmtArg {
    None,
    Wpa2Psk,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start a software access point
    OpenAp {
        ssid: String,
        #[clap(long, default_value = "")]
        password: String,
        #[clap(long, value_enum, default_value = "wpa2-psk")]
        key_mgmt: KeyMgmtArg,
    },

    /// Stop a software access point
    CloseAp {
        ssid: String,
        #[clap(long, default_value = "")]
        password: String,
        #[clap(long, value_enum, default_value = "wpa2-psk")]
        key_mgmt: KeyMgmtArg,
    },

    /// Scan and list networks and saved profiles
    Scan,

    /// Connect to a network and wait for confirmation
    Connect {
        ssid: String,
        #[clap(long, default_value = "")]
        password: String,
        /// Return right after the request instead of waiting
        #[clap(long)]
        no_wait: bool,
    },

    /// Disable a saved network and drop the association
    Disconnect { ssid: String },

    /// Remove a saved network
    Forget { ssid: String },

    /// Show the current association
    Status,
}
