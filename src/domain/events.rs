use crate::domain::device::{Brand, Device, Protocol};
use std::net::Ipv4Addr;

/// Snapshot of a running discovery pass, emitted once per probed address.
#[derive(Clone, PartialEq, Debug)]
pub struct DiscoveryProgress {
    pub completed: usize,
    pub total: usize,
    pub address: Ipv4Addr,
    pub found: usize,
}

/// One event per probed address, in ascending address order.
#[derive(PartialEq, Debug)]
pub enum DiscoveryEvent {
    Progress(DiscoveryProgress),
    Found { progress: DiscoveryProgress, device: Device },
}

impl DiscoveryEvent {
    pub fn progress(&self) -> &DiscoveryProgress {
        match self {
            DiscoveryEvent::Progress(progress) => progress,
            DiscoveryEvent::Found { progress, .. } => progress,
        }
    }
}

/// Classification of a single host. Ephemeral, produced and consumed within
/// one discovery pass. `success` is true only when a known brand answered the
/// fingerprint request; a reachable host with no classification keeps its
/// open port but stays `Brand::Unknown`.
#[derive(Clone, PartialEq, Debug)]
pub struct ProbeResult {
    pub address: Ipv4Addr,
    pub port: Option<u16>,
    pub brand: Brand,
    pub protocol: Protocol,
    pub success: bool,
}

impl ProbeResult {
    pub fn unreachable(address: Ipv4Addr) -> Self {
        ProbeResult {
            address,
            port: None,
            brand: Brand::Unknown,
            protocol: Protocol::Unknown,
            success: false,
        }
    }
}
