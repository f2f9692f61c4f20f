//! Runtime settings

use std::time::Duration;

use crate::config::CliArgs;
use crate::config::cli::KeyMgmtArg;
use crate::core::types::{NONE, WPA2_PSK};

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub interface: String,
    pub ctrl_socket: String,
    pub lock_tag: String,
    pub connect_timeout: Duration,
}

impl From<&CliArgs> for Settings {
    fn from(args: &CliArgs) -> Self {
        let ctrl_socket = format!("{}/{}", args.ctrl_dir.trim_end_matches('/'), args.interface);

        Settings {
            interface: args.interface.clone(),
            ctrl_socket,
            lock_tag: args.lock_tag.clone(),
            connect_timeout: Duration::from_secs(args.connect_timeout),
        }
    }
}

impl From<KeyMgmtArg> for i32 {
    fn from(arg: KeyMgmtArg) -> Self {
        match arg {
            KeyMgmtArg::None => NONE,
            KeyMgmtArg::Wpa2Psk => WPA2_PSK,
        }
    }
}
