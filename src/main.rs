use crate::app_config::AppConfig;
use crate::discovery::{AddressRange, DiscoveryEngine, Prober};
use crate::dispatch::{ConnectionManager, Dispatcher};
use crate::domain::commands::CommandRequest;
use crate::domain::events::DiscoveryEvent;
use crate::registry::BrandRegistry;
use crate::store::DeviceStore;
use chrono::Utc;
use std::env;
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod discovery;
mod dispatch;
mod domain;
mod registry;
mod store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load();
    info!("✅  Loaded configuration");

    let client = reqwest::Client::new();
    let registry = Arc::new(BrandRegistry::default());
    let connections = Arc::new(ConnectionManager::new(config.dispatch().connect_timeout()));
    let dispatcher = Dispatcher::new(client.clone(), registry.clone(), connections.clone(), config.dispatch().send_timeout());
    let prober = Arc::new(Prober::new(client, registry, config.discovery().fingerprint_timeout()));
    let engine = DiscoveryEngine::new(prober, config.discovery().max_in_flight());
    let store = DeviceStore::new();
    info!("✅  Initialized discovery engine and dispatcher");

    let token = CancellationToken::new();
    let signal_token = token.clone();
    task::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Cancellation requested");
            signal_token.cancel();
        }
    });

    let range = AddressRange::new(config.discovery().range_start(), config.discovery().range_end());
    let mut events = engine.discover(range, config.discovery().per_host_timeout(), token)?;

    while let Some(event) = events.recv().await {
        match event {
            DiscoveryEvent::Found { progress, device } => {
                info!("🟢 [{}/{}] Found '{}' at {}:{}", progress.completed, progress.total, device.name, device.address, device.port);
                store.upsert(device).await;
            }
            DiscoveryEvent::Progress(progress) => {
                debug!("📡 [{}/{}] Probed {}", progress.completed, progress.total, progress.address);
            }
        }
    }

    let devices = store.list().await;
    info!("✅  Discovery finished, {} device(s) registered", devices.len());

    for mut device in devices {
        device.online = dispatcher.ping(&device).await;
        if device.online {
            device.last_seen = Some(Utc::now());
        }
        debug!(device_id = device.id, "Reachability for '{}': {}", device.name, device.online);
        store.upsert(device).await;
    }

    // Optional one-shot dispatch: `tvhub <device-id> <command>...` sends the
    // given commands to a discovered device before exiting.
    let args = env::args().skip(1).collect::<Vec<_>>();
    if let Some((device_id, commands)) = args.split_first() {
        match store.get(device_id).await {
            Some(mut device) => {
                let requests = commands.iter().map(|command| CommandRequest::new(command)).collect::<Vec<_>>();
                let result = dispatcher.send_sequence(&device, &requests, config.dispatch().inter_command_delay()).await;
                info!("✅  Dispatched {}/{} command(s) to '{}': {:?}", result.completed, requests.len(), device.name, result.outcome);
                if result.completed > 0 {
                    device.last_command = Some(Utc::now());
                    store.upsert(device).await;
                }
            }
            None => warn!("⚠️ No device with id '{}' was discovered", device_id),
        }
    }

    connections.release_all().await;
    info!("🔥 {} is done", env!("CARGO_PKG_NAME"));

    Ok(())
}
