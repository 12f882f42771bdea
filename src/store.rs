use crate::domain::device::Device;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Caller-side registry of known devices, fed from discovery passes and user
/// edits. The core itself never touches it; `main` registers discovered
/// devices here after each pass.
#[derive(Clone, Default, Debug)]
pub struct DeviceStore {
    devices: Arc<RwLock<HashMap<String, Device>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        DeviceStore::default()
    }

    pub async fn list(&self) -> Vec<Device> {
        let mut devices = self.devices.read().await.values().cloned().collect::<Vec<_>>();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub async fn get(&self, id: &str) -> Option<Device> {
        self.devices.read().await.get(id).cloned()
    }

    pub async fn upsert(&self, device: Device) {
        let mut write_guard = self.devices.write().await;
        if write_guard.insert(device.id.clone(), device.clone()).is_none() {
            info!(device_id = device.id, "🔵 Registered device '{}'", device.name);
        }
    }

    pub async fn remove(&self, id: &str) -> Option<Device> {
        let removed = self.devices.write().await.remove(id);
        if let Some(device) = &removed {
            info!(device_id = device.id, "🔵 Removed device '{}'", device.name);
        }
        removed
    }
}
