use crate::domain::device::{Brand, Protocol};
use crate::domain::events::ProbeResult;
use crate::registry::{BrandRegistry, BrandSpec};
use reqwest::Client;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, trace};

/// Probes a single host: a bounded-time connection sweep over the registry's
/// well-known ports followed by an application-level fingerprint request to
/// classify the responding brand. All failures are converted to a negative
/// `ProbeResult`; probing never raises.
#[derive(Debug)]
pub struct Prober {
    client: Client,
    registry: Arc<BrandRegistry>,
    fingerprint_timeout: Duration,
}

impl Prober {
    pub fn new(client: Client, registry: Arc<BrandRegistry>, fingerprint_timeout: Duration) -> Self {
        Prober {
            client,
            registry,
            fingerprint_timeout,
        }
    }

    #[instrument(skip(self, per_host_timeout))]
    pub async fn probe(&self, address: Ipv4Addr, per_host_timeout: Duration) -> ProbeResult {
        let Some(port) = self.first_open_port(address, per_host_timeout).await else {
            trace!("No candidate port reachable");
            return ProbeResult::unreachable(address);
        };

        for spec in self.registry.candidates_for_port(port) {
            if self.fingerprint(address, port, spec).await {
                debug!("🔍 {} identified as {} on port {}", address, spec.brand, port);
                return ProbeResult {
                    address,
                    port: Some(port),
                    brand: spec.brand,
                    protocol: spec.protocol,
                    success: true,
                };
            }
        }

        debug!("🔍 {} reachable on port {} but no known brand answered", address, port);
        ProbeResult {
            address,
            port: Some(port),
            brand: Brand::Unknown,
            protocol: Protocol::Unknown,
            success: false,
        }
    }

    /// Tries the registry's candidate ports in their fixed order and returns
    /// the first one that accepts a connection within the timeout. A failed
    /// port is not retried within the same pass.
    async fn first_open_port(&self, address: Ipv4Addr, per_host_timeout: Duration) -> Option<u16> {
        for port in self.registry.probe_ports() {
            if let Ok(Ok(_stream)) = timeout(per_host_timeout, TcpStream::connect((IpAddr::V4(address), port))).await {
                return Some(port);
            }
        }
        None
    }

    async fn fingerprint(&self, address: Ipv4Addr, port: u16, spec: &BrandSpec) -> bool {
        let url = format!("http://{}:{}{}", address, port, spec.fingerprint_path);
        match self.client.get(&url).timeout(self.fingerprint_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                trace!("Fingerprint request for {} failed: {}", spec.brand, error);
                false
            }
        }
    }
}
