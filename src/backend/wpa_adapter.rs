//! wpa_supplicant adapter implementation on top of wifi-ctrl

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, warn};
use trait_variant::make;
use wifi_ctrl::sta::{Broadcast, BroadcastReceiver, RequestClient, WifiSetup};

use crate::{
    backend::WifiAdapter,
    config::Settings,
    core::{
        error::{Unavailable, WifiError, WifiResult},
        types::{
            ConnectionInfo, KeyManagement, NetworkConfiguration, NetworkId, NetworkInfo,
            NetworkState, SavedProfile, ScanResult, SystemBroadcast, UNKNOWN_SSID,
            ip_to_platform_order, quoted,
        },
    },
};

const BROADCAST_CAPACITY: usize = 64;
const ACCESS_POINT_OPERATION: &str = "set_access_point_enabled";
const ACCESS_POINT_MODE: &str = "2";
const ACCESS_POINT_FREQUENCY: u32 = 2437;

/// Raw access to the supplicant control socket and the interface link
#[make(Send)]
trait ControlChannel: Sync {
    /// Send a control command and return the unparsed reply
    async fn send(&self, command: String) -> WifiResult<String>;

    /// Bring the interface link up or down
    async fn set_link(&self, up: bool) -> WifiResult<()>;
}

/// Control channel over the wifi-ctrl request client
struct SocketChannel {
    interface: String,
    client: Arc<RequestClient>,
}

impl ControlChannel for SocketChannel {
    async fn send(&self, command: String) -> WifiResult<String> {
        self.client
            .send_custom(command.clone())
            .await
            .map_err(|e| WifiError::WpaSupplicantError(format!("{}: {}", redact(&command), e)))
    }

    async fn set_link(&self, up: bool) -> WifiResult<()> {
        let state = if up { "up" } else { "down" };
        run_tool("ip", &["link", "set", "dev", &self.interface, state])
            .await
            .map(|_| ())
    }
}

/// Profile and access point handling on top of a control channel
///
/// Every multi-step profile setup removes the network again when a later
/// step fails, so a failed call leaves no saved profile behind.
struct SupplicantControl<C> {
    channel: C,
    access_point_id: Mutex<Option<NetworkId>>,
}

impl<C: ControlChannel> SupplicantControl<C> {
    fn new(channel: C) -> Self {
        Self {
            channel,
            access_point_id: Mutex::new(None),
        }
    }

    /// Send a control command, mapping `FAIL` replies to errors
    async fn request(&self, command: String) -> WifiResult<String> {
        debug!("wpa_supplicant request: {}", redact(&command));
        let reply = self.channel.send(command.clone()).await?;

        let trimmed = reply.trim();
        if trimmed.starts_with("FAIL") || trimmed == "UNKNOWN COMMAND" {
            return Err(WifiError::WpaSupplicantError(format!(
                "{} rejected: {}",
                redact(&command),
                trimmed
            )));
        }
        Ok(reply)
    }

    async fn set_network(&self, network_id: NetworkId, key: &str, value: &str) -> WifiResult<()> {
        self.request(format!("SET_NETWORK {} {} {}", network_id, key, value))
            .await
            .map(|_| ())
    }

    async fn remove_network(&self, network_id: NetworkId) -> WifiResult<()> {
        self.request(format!("REMOVE_NETWORK {}", network_id))
            .await
            .map(|_| ())
    }

    /// Remove a network left over by a failed or superseded setup
    async fn discard(&self, network_id: NetworkId) {
        if let Err(e) = self.remove_network(network_id).await {
            warn!(network_id, "Failed to remove network: {}", e);
        }
    }

    async fn configured_networks(&self) -> WifiResult<Vec<SavedProfile>> {
        let reply = self.request("LIST_NETWORKS".to_string()).await?;
        Ok(parse_network_list(&reply))
    }

    async fn network_mode(&self, network_id: NetworkId) -> WifiResult<String> {
        let reply = self
            .request(format!("GET_NETWORK {} mode", network_id))
            .await?;
        Ok(reply.trim().to_string())
    }

    /// Create a profile from a configuration without enabling it
    async fn create_network(&self, config: &NetworkConfiguration) -> WifiResult<NetworkId> {
        let reply = self.request("ADD_NETWORK".to_string()).await?;
        let network_id = reply.trim().parse::<NetworkId>().map_err(|_| {
            WifiError::ProfileFailed(format!("Unexpected ADD_NETWORK reply: {}", reply.trim()))
        })?;

        if let Err(e) = self.configure_network(network_id, config).await {
            self.discard(network_id).await;
            return Err(e);
        }
        Ok(network_id)
    }

    async fn configure_network(
        &self,
        network_id: NetworkId,
        config: &NetworkConfiguration,
    ) -> WifiResult<()> {
        self.set_network(network_id, "ssid", &quoted(&config.ssid))
            .await?;

        match (config.key_management, config.pre_shared_key.as_deref()) {
            (Some(KeyManagement::Wpa2Psk), Some(psk)) => {
                self.set_network(network_id, "key_mgmt", "WPA-PSK").await?;
                self.set_network(network_id, "proto", "RSN").await?;
                self.set_network(network_id, "psk", &quoted(psk)).await?;
            }
            (Some(KeyManagement::None), _) => {
                self.set_network(network_id, "key_mgmt", "NONE").await?;
            }
            // No key management bit set: leave the supplicant defaults untouched
            _ => {}
        }
        Ok(())
    }

    /// Resolve the hidden access point capability on this supplicant
    async fn resolve_access_point_mode(&self) -> Result<(), Unavailable> {
        let reply = self
            .channel
            .send("GET_CAPABILITY modes".to_string())
            .await
            .map_err(|e| classify_invocation_error(&e.to_string()))?;

        if reply.split_whitespace().any(|mode| mode == "AP") {
            Ok(())
        } else {
            Err(Unavailable::NotFound)
        }
    }

    async fn set_access_point_enabled(
        &self,
        config: &NetworkConfiguration,
        enabled: bool,
    ) -> WifiResult<()> {
        self.resolve_access_point_mode()
            .await
            .map_err(|reason| WifiError::OperationUnavailable {
                operation: ACCESS_POINT_OPERATION,
                reason,
            })?;

        let result = if enabled {
            self.enable_access_point(config).await
        } else {
            self.disable_access_point(config).await
        };

        result.map_err(|e| WifiError::OperationUnavailable {
            operation: ACCESS_POINT_OPERATION,
            reason: classify_invocation_error(&e.to_string()),
        })
    }

    async fn enable_access_point(&self, config: &NetworkConfiguration) -> WifiResult<()> {
        // Turning client mode off takes the link down, the AP needs it up
        self.channel.set_link(true).await?;

        let network_id = self.create_network(config).await?;
        if let Err(e) = self.start_access_point(network_id).await {
            self.discard(network_id).await;
            return Err(e);
        }

        let previous = self.access_point_id.lock().await.replace(network_id);
        if let Some(previous) = previous.filter(|previous| *previous != network_id) {
            debug!(previous, "Removing superseded access point network");
            self.discard(previous).await;
        }
        Ok(())
    }

    async fn start_access_point(&self, network_id: NetworkId) -> WifiResult<()> {
        self.set_network(network_id, "mode", ACCESS_POINT_MODE)
            .await?;
        self.set_network(network_id, "frequency", &ACCESS_POINT_FREQUENCY.to_string())
            .await?;
        self.request(format!("SELECT_NETWORK {}", network_id))
            .await
            .map(|_| ())
    }

    async fn disable_access_point(&self, config: &NetworkConfiguration) -> WifiResult<()> {
        let known = self.access_point_id.lock().await.take();
        let network_ids = match known {
            Some(network_id) => vec![network_id],
            None => self.access_point_networks(&config.ssid).await?,
        };

        if network_ids.is_empty() {
            debug!("No access point network for {}", config.ssid);
        }
        for network_id in network_ids {
            self.remove_network(network_id).await?;
        }
        Ok(())
    }

    /// Saved access point networks for `ssid`; station profiles are skipped
    async fn access_point_networks(&self, ssid: &str) -> WifiResult<Vec<NetworkId>> {
        let target = quoted(ssid);
        let mut network_ids = Vec::new();
        for profile in self.configured_networks().await? {
            if profile.ssid == target
                && self.network_mode(profile.network_id).await? == ACCESS_POINT_MODE
            {
                network_ids.push(profile.network_id);
            }
        }
        Ok(network_ids)
    }
}

pub struct WpaSupplicantAdapter {
    interface: String,
    client: Arc<RequestClient>,
    control: SupplicantControl<SocketChannel>,
    broadcasts: broadcast::Sender<SystemBroadcast>,
}

impl WpaSupplicantAdapter {
    pub async fn new(settings: &Settings) -> WifiResult<Self> {
        let mut setup =
            WifiSetup::new().map_err(|e| WifiError::WpaSupplicantError(e.to_string()))?;
        setup.set_socket_path(settings.ctrl_socket.clone());

        let client = Arc::new(setup.get_request_client());
        let events = setup.get_broadcast_receiver();
        let station = setup.complete();

        // Spawn the station runtime
        tokio::spawn(async move {
            if let Err(e) = station.run().await {
                error!("WifiStation runtime error: {}", e);
            }
        });

        let (broadcasts, _) = broadcast::channel(BROADCAST_CAPACITY);
        tokio::spawn(Self::forward_events(
            events,
            client.clone(),
            broadcasts.clone(),
        ));

        Ok(Self {
            interface: settings.interface.clone(),
            control: SupplicantControl::new(SocketChannel {
                interface: settings.interface.clone(),
                client: client.clone(),
            }),
            client,
            broadcasts,
        })
    }

    /// Translate station events into connectivity broadcasts
    async fn forward_events(
        mut events: BroadcastReceiver,
        client: Arc<RequestClient>,
        broadcasts: broadcast::Sender<SystemBroadcast>,
    ) {
        loop {
            let info = match events.recv().await {
                Ok(Broadcast::Connected) => {
                    let ssid = match client.get_status().await {
                        Ok(status) => status.get("ssid").map(String::as_str).map(quoted),
                        Err(e) => {
                            warn!("Failed to query status after connect: {}", e);
                            None
                        }
                    };
                    NetworkInfo::wifi(
                        NetworkState::Connected,
                        ssid.unwrap_or_else(|| UNKNOWN_SSID.to_string()),
                    )
                }
                Ok(Broadcast::Disconnected) => {
                    NetworkInfo::wifi(NetworkState::Disconnected, UNKNOWN_SSID)
                }
                Ok(event) => {
                    debug!("Ignoring station event: {:?}", event);
                    continue;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Station event receiver lagged by {}", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Station event channel closed");
                    break;
                }
            };
            // No subscribers is not an error for a broadcast source
            let _ = broadcasts.send(SystemBroadcast::network_state_changed(info));
        }
    }
}

impl WifiAdapter for WpaSupplicantAdapter {
    async fn is_wifi_enabled(&self) -> WifiResult<bool> {
        let output = run_tool("ip", &["link", "show", "dev", &self.interface]).await?;
        Ok(parse_link_up(&output))
    }

    async fn set_wifi_enabled(&self, enabled: bool) -> WifiResult<()> {
        debug!("Setting {} radio enabled={}", self.interface, enabled);
        self.control.channel.set_link(enabled).await?;
        let _ = self.broadcasts.send(SystemBroadcast::wifi_state_changed());
        Ok(())
    }

    async fn connection_info(&self) -> WifiResult<Option<ConnectionInfo>> {
        let status =
            self.client.get_status().await.map_err(|e| {
                WifiError::WpaSupplicantError(format!("Failed to get status: {}", e))
            })?;
        Ok(connection_info_from_status(&status))
    }

    async fn start_scan(&self) -> WifiResult<()> {
        debug!("Starting WiFi scan on interface: {}", self.interface);
        self.control
            .request("SCAN".to_string())
            .await
            .map(|_| ())
            .map_err(|e| WifiError::ScanFailed(e.to_string()))
    }

    async fn scan_results(&self) -> WifiResult<Vec<ScanResult>> {
        let results = self
            .client
            .get_scan()
            .await
            .map_err(|e| WifiError::ScanFailed(format!("Scan failed: {}", e)))?;

        let mut networks = Vec::new();
        for res in results.iter() {
            networks.push(ScanResult {
                ssid: res.name.clone(),
                bssid: res.mac.clone(),
                frequency: res.frequency.parse().unwrap_or(0),
                channel: frequency_to_channel(&res.frequency),
                level: res.signal as i16,
            });
        }

        debug!("Scan snapshot holds {} networks", networks.len());
        Ok(networks)
    }

    async fn configured_networks(&self) -> WifiResult<Vec<SavedProfile>> {
        self.control.configured_networks().await
    }

    async fn add_network(&self, config: &NetworkConfiguration) -> WifiResult<NetworkId> {
        debug!("Adding network: {}", config.ssid);
        self.control.create_network(config).await
    }

    async fn enable_network(
        &self,
        network_id: NetworkId,
        disable_others: bool,
    ) -> WifiResult<()> {
        // SELECT_NETWORK enables the profile and disables every other one
        let command = if disable_others {
            "SELECT_NETWORK"
        } else {
            "ENABLE_NETWORK"
        };
        self.control
            .request(format!("{} {}", command, network_id))
            .await
            .map(|_| ())
            .map_err(|e| WifiError::ConnectionFailed(e.to_string()))
    }

    async fn disable_network(&self, network_id: NetworkId) -> WifiResult<()> {
        self.control
            .request(format!("DISABLE_NETWORK {}", network_id))
            .await
            .map(|_| ())
    }

    async fn remove_network(&self, network_id: NetworkId) -> WifiResult<()> {
        self.control.remove_network(network_id).await
    }

    async fn disconnect(&self) -> WifiResult<()> {
        debug!("Disconnecting");
        self.control
            .request("DISCONNECT".to_string())
            .await
            .map(|_| ())
    }

    async fn set_keep_awake(&self, tag: &str, held: bool) -> WifiResult<()> {
        debug!("Keep-awake lock {} held={}", tag, held);
        // Holding the lock means power save is off
        let power_save = if held { "off" } else { "on" };
        run_tool(
            "iw",
            &["dev", &self.interface, "set", "power_save", power_save],
        )
        .await
        .map(|_| ())
    }

    async fn set_access_point_enabled(
        &self,
        config: &NetworkConfiguration,
        enabled: bool,
    ) -> WifiResult<()> {
        self.control.set_access_point_enabled(config, enabled).await
    }

    fn subscribe_broadcasts(&self) -> broadcast::Receiver<SystemBroadcast> {
        self.broadcasts.subscribe()
    }
}

/// Run an `ip`/`iw` style helper
async fn run_tool(program: &str, args: &[&str]) -> WifiResult<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| WifiError::InterfaceError(format!("{}: {}", program, e)))?;

    if !output.status.success() {
        return Err(WifiError::InterfaceError(format!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Association from a `STATUS` reply, `None` unless fully associated
fn connection_info_from_status(status: &HashMap<String, String>) -> Option<ConnectionInfo> {
    let wpa_state = status
        .get("wpa_state")
        .map(String::as_str)
        .unwrap_or("UNKNOWN");
    if wpa_state != "COMPLETED" {
        return None;
    }

    let ip_address = status
        .get("ip_address")
        .and_then(|ip| ip.parse::<Ipv4Addr>().ok())
        .map(ip_to_platform_order)
        .unwrap_or(0);

    Some(ConnectionInfo {
        bssid: status.get("bssid").cloned().unwrap_or_default(),
        ssid: status
            .get("ssid")
            .map(String::as_str)
            .map(quoted)
            .unwrap_or_default(),
        ip_address,
        mac_address: status.get("address").cloned().unwrap_or_default(),
        network_id: status
            .get("id")
            .and_then(|id| id.parse().ok())
            .unwrap_or(0),
    })
}

/// Hide passphrases from logged commands
fn redact(command: &str) -> String {
    match command.split_whitespace().nth(2) {
        Some("psk") => {
            let prefix: Vec<&str> = command.split_whitespace().take(3).collect();
            format!("{} ***", prefix.join(" "))
        }
        _ => command.to_string(),
    }
}

fn classify_invocation_error(message: &str) -> Unavailable {
    if message.to_ascii_lowercase().contains("permission denied") {
        Unavailable::AccessDenied
    } else {
        Unavailable::InvocationFault(message.to_string())
    }
}

/// Whether `ip link show` reports the interface as administratively up
fn parse_link_up(output: &str) -> bool {
    output
        .lines()
        .next()
        .and_then(|line| {
            let start = line.find('<')?;
            let end = line[start..].find('>')? + start;
            Some(line[start + 1..end].split(',').any(|flag| flag == "UP"))
        })
        .unwrap_or(false)
}

/// Parse `LIST_NETWORKS` output into saved profiles
fn parse_network_list(output: &str) -> Vec<SavedProfile> {
    let mut profiles = Vec::new();

    for line in output.lines().skip(1) {
        // Skip header line
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            continue;
        }
        let Ok(network_id) = parts[0].parse::<NetworkId>() else {
            continue;
        };
        let flags = parts.get(3).copied().unwrap_or_default();
        profiles.push(SavedProfile {
            network_id,
            ssid: quoted(parts[1]),
            disabled: flags.contains("[DISABLED]"),
        });
    }

    profiles
}

/// Convert frequency (MHz) to channel number
fn frequency_to_channel(freq_str: &str) -> u16 {
    let freq = freq_str.parse::<u16>().unwrap_or(0);
    match freq {
        2484 => 14,
        2412..=2472 if (freq - 2407) % 5 == 0 => (freq - 2407) / 5,
        5180..=5885 if (freq - 5000) % 5 == 0 => (freq - 5000) / 5,
        _ => 0,
    }
}
