//! Wi-Fi Hotspot Control - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wifi_hotspot_control::{
    backend::WpaSupplicantAdapter,
    config::{CliArgs, Command, Settings},
    core::service::WifiService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wifi_hotspot_control=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    let settings = Settings::from(&args);
    info!(?settings, "Starting Wi-Fi control");

    let adapter = Arc::new(WpaSupplicantAdapter::new(&settings).await?);
    info!("Wi-Fi adapter initialized for interface: {}", settings.interface);

    let service = WifiService::new(adapter).await;

    match args.command {
        Command::OpenAp {
            ssid,
            password,
            key_mgmt,
        } => {
            let key_mgmt = key_mgmt.into();
            if !service.open_access_point(&ssid, &password, key_mgmt).await {
                error!("Failed to start access point {}", ssid);
                return Err("Access point not started".into());
            }
            service.controller.create_lock(&settings.lock_tag).await;
            service.controller.acquire_lock().await;
            println!("Access point {} started", ssid);

            // Hold the access point until asked to stop
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT (Ctrl+C), stopping access point");
                }
                result = shutdown_signal() => {
                    result?;
                    info!("Received SIGTERM, stopping access point");
                }
            }

            service.controller.release_lock().await;
            if !service.close_access_point(&ssid, &password, key_mgmt).await {
                return Err("Access point not stopped".into());
            }
        }
        Command::CloseAp {
            ssid,
            password,
            key_mgmt,
        } => {
            if !service
                .close_access_point(&ssid, &password, key_mgmt.into())
                .await
            {
                error!("Failed to stop access point {}", ssid);
                return Err("Access point not stopped".into());
            }
            println!("Access point {} stopped", ssid);
        }
        Command::Scan => {
            service.controller.start_scan().await;
            let report = serde_json::json!({
                "networks": service.controller.scan_results().await,
                "saved": service.controller.saved_profiles().await,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Connect {
            ssid,
            password,
            no_wait,
        } => {
            if no_wait {
                if !service.connect(&ssid, &password).await {
                    return Err(format!("Connection to {} rejected", ssid).into());
                }
                println!("Connection to {} requested", ssid);
            } else {
                let info = service
                    .connect_and_wait(&ssid, &password, settings.connect_timeout)
                    .await?;
                println!(
                    "Connected to {}",
                    info.extra_info.as_deref().unwrap_or(ssid.as_str())
                );
            }
        }
        Command::Disconnect { ssid } => {
            service.disconnect(&ssid).await;
            println!("Disconnected from {}", ssid);
        }
        Command::Forget { ssid } => {
            if !service.controller.remove_profile(&ssid).await {
                return Err(format!("No saved network {}", ssid).into());
            }
            println!("Removed {}", ssid);
        }
        Command::Status => {
            let report = serde_json::json!({
                "bssid": service.controller.bssid().await,
                "ssid": service.controller.ssid().await,
                "ip_address": service.controller.ip_addr().await.to_string(),
                "mac_address": service.controller.mac_address().await,
                "network_id": service.controller.network_id().await,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await;
    Ok(())
}
