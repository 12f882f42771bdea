use crate::dispatch::connection_manager::ConnectionManager;
use crate::dispatch::payload;
use crate::domain::commands::{CommandRequest, RejectReason, SendOutcome, SequenceOutcome};
use crate::domain::device::{Device, Protocol};
use crate::registry::{BrandRegistry, PayloadShape};
use reqwest::Client;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Translates logical commands into brand-specific payloads and sends them
/// over whichever transport the device's protocol calls for. Failures become
/// outcome values; a failed command never corrupts connection state for
/// other devices.
#[derive(Debug)]
pub struct Dispatcher {
    client: Client,
    registry: Arc<BrandRegistry>,
    connections: Arc<ConnectionManager>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(client: Client, registry: Arc<BrandRegistry>, connections: Arc<ConnectionManager>, send_timeout: Duration) -> Self {
        Dispatcher {
            client,
            registry,
            connections,
            send_timeout,
        }
    }

    #[instrument(skip_all, fields(device_id = device.id, command = request.command))]
    pub async fn send(&self, device: &Device, request: &CommandRequest) -> SendOutcome {
        if device.protocol == Protocol::Unknown {
            warn!("⚠️ Device '{}' has an unknown protocol, rejecting '{}'", device.name, request.command);
            return SendOutcome::Rejected(RejectReason::UnsupportedProtocol);
        }

        let Some(spec) = self.registry.spec_for(device.brand) else {
            // Unclassified brand: best-effort generic envelope over HTTP; the
            // socket and ECP shapes need a vendor table to mean anything.
            if device.protocol != Protocol::Http {
                warn!("⚠️ No brand table for '{}' over {:?}, rejecting '{}'", device.name, device.protocol, request.command);
                return SendOutcome::Rejected(RejectReason::UnsupportedProtocol);
            }
            debug!("No brand table for '{}', sending the generic command envelope", device.name);
            let url = format!("http://{}:{}/command", device.address, device.port);
            return self.post_json(&url, payload::generic_fallback(&request.command, request.payload.as_ref())).await;
        };

        let Some(code) = spec.translate(&request.command) else {
            warn!("⚠️ Command '{}' is not mapped for brand {}", request.command, device.brand);
            return SendOutcome::Rejected(RejectReason::UnsupportedCommand {
                brand: device.brand,
                command: request.command.clone(),
            });
        };

        match spec.payload {
            PayloadShape::KeyField { path } => {
                let url = format!("http://{}:{}{}", device.address, device.port, path);
                self.post_json(&url, payload::key_field(code)).await
            }
            PayloadShape::PathSegment { prefix } => {
                let url = format!("http://{}:{}{}", device.address, device.port, payload::ecp_path(prefix, code));
                self.post_empty(&url).await
            }
            PayloadShape::SocketEnvelope { method } => self.send_socket(device, method, code).await,
        }
    }

    /// Sends commands one at a time with `delay` between them, aborting on
    /// the first outcome that is not `Delivered`.
    #[instrument(skip_all, fields(device_id = device.id, commands = requests.len()))]
    pub async fn send_sequence(&self, device: &Device, requests: &[CommandRequest], delay: Duration) -> SequenceOutcome {
        let mut completed = 0;
        for (index, request) in requests.iter().enumerate() {
            if index > 0 {
                sleep(delay).await;
            }
            let outcome = self.send(device, request).await;
            completed += 1;
            if outcome != SendOutcome::Delivered {
                warn!("⚠️ Sequence aborted at command {}/{} ('{}')", index + 1, requests.len(), request.command);
                return SequenceOutcome { completed, outcome };
            }
        }
        info!("🟢 Delivered {} command(s) to '{}'", requests.len(), device.name);
        SequenceOutcome {
            completed,
            outcome: SendOutcome::Delivered,
        }
    }

    /// Best-effort reachability check against the brand's identification
    /// endpoint. Unclassified brands ping the device root.
    #[instrument(skip_all, fields(device_id = device.id))]
    pub async fn ping(&self, device: &Device) -> bool {
        let path = self.registry.spec_for(device.brand).map_or_else(|| "/".to_string(), |spec| spec.fingerprint_path.clone());
        let url = format!("http://{}:{}{}", device.address, device.port, path);
        match self.client.get(&url).timeout(self.send_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn post_json(&self, url: &str, body: Value) -> SendOutcome {
        let result = self.client.post(url).json(&body).timeout(self.send_timeout).send().await;
        self.http_outcome(url, result)
    }

    async fn post_empty(&self, url: &str) -> SendOutcome {
        let result = self.client.post(url).timeout(self.send_timeout).send().await;
        self.http_outcome(url, result)
    }

    fn http_outcome(&self, url: &str, result: Result<reqwest::Response, reqwest::Error>) -> SendOutcome {
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("🟢 Delivered to {}", url);
                SendOutcome::Delivered
            }
            Ok(response) => {
                warn!(status_code = %response.status(), "⚠️ Device answered {} with {}", url, response.status());
                SendOutcome::Transport(format!("device answered {}", response.status()))
            }
            Err(error) => {
                warn!("⚠️ Could not reach device at {}: {}", url, error);
                SendOutcome::Transport(format!("could not reach device: {}", error))
            }
        }
    }

    async fn send_socket(&self, device: &Device, method: &str, code: &str) -> SendOutcome {
        let addr = SocketAddr::new(IpAddr::V4(device.address), device.port);
        let mut handle = match self.connections.acquire(&device.id, addr).await {
            Ok(handle) => handle,
            Err(error) => {
                warn!("⚠️ Could not reach device at {}: {}", addr, error);
                return SendOutcome::Transport(format!("could not reach device: {}", error));
            }
        };

        let envelope = payload::socket_envelope(method, code).to_string();
        if let Err(error) = handle.send_line(envelope.as_bytes(), self.send_timeout).await {
            drop(handle);
            // Drop the broken connection so the next attempt starts fresh.
            self.connections.release(&device.id).await;
            warn!("⚠️ Could not write to device at {}: {}", addr, error);
            return SendOutcome::Transport(format!("could not reach device: {}", error));
        }

        debug!("🟢 Delivered '{}' over the persistent connection", code);
        SendOutcome::Delivered
    }
}
