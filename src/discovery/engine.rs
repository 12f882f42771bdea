use crate::discovery::probe::Prober;
use crate::domain::device::Device;
use crate::domain::events::{DiscoveryEvent, DiscoveryProgress, ProbeResult};
use chrono::Utc;
use futures::StreamExt;
use futures::stream;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const EVENT_BUFFER: usize = 32;

/// Inclusive IPv4 address range. Empty when the end precedes the start.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct AddressRange {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl AddressRange {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        AddressRange { start, end }
    }

    pub fn len(&self) -> usize {
        let (start, end) = (u32::from(self.start), u32::from(self.end));
        // The +1 happens in usize so the full address space does not
        // overflow u32.
        if end < start { 0 } else { (end - start) as usize + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }
}

#[derive(PartialEq, Debug, Error)]
pub enum DiscoveryError {
    #[error("a discovery pass is already running")]
    PassInProgress,
}

/// Drives one discovery pass over an address range. Per-host probes run
/// concurrently up to `max_in_flight`, but events are emitted strictly in
/// ascending address order, one per address. A second pass cannot start while
/// one is running.
#[derive(Debug)]
pub struct DiscoveryEngine {
    prober: Arc<Prober>,
    max_in_flight: usize,
    active: Arc<AtomicBool>,
}

impl DiscoveryEngine {
    pub fn new(prober: Arc<Prober>, max_in_flight: usize) -> Self {
        DiscoveryEngine {
            prober,
            max_in_flight: max_in_flight.max(1),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts a pass and returns the event stream. The sequence is finite,
    /// produced incrementally, and not restartable; cancel via the token and
    /// call again to scan anew.
    pub fn discover(&self, range: AddressRange, per_host_timeout: Duration, token: CancellationToken) -> Result<Receiver<DiscoveryEvent>, DiscoveryError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(DiscoveryError::PassInProgress);
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let prober = self.prober.clone();
        let active = self.active.clone();
        let max_in_flight = self.max_in_flight;

        task::spawn(async move {
            run_pass(prober, range, per_host_timeout, token, max_in_flight, tx).await;
            active.store(false, Ordering::SeqCst);
        });

        Ok(rx)
    }
}

#[instrument(skip_all, fields(total = range.len()))]
async fn run_pass(prober: Arc<Prober>, range: AddressRange, per_host_timeout: Duration, token: CancellationToken, max_in_flight: usize, tx: Sender<DiscoveryEvent>) {
    let total = range.len();
    info!("📡 Scanning {} address(es)...", total);

    // `buffered` keeps results in input order while probing up to
    // `max_in_flight` hosts at once. The token is polled at the start of each
    // address; a cancelled address yields `None` without probing.
    let mut results = stream::iter(range.iter())
        .map(|address| {
            let prober = prober.clone();
            let token = token.clone();
            async move {
                if token.is_cancelled() {
                    return None;
                }
                Some(prober.probe(address, per_host_timeout).await)
            }
        })
        .buffered(max_in_flight);

    let mut completed = 0;
    let mut found = 0;
    let mut cancelled = false;

    while let Some(item) = results.next().await {
        let Some(result) = item else {
            cancelled = true;
            break;
        };

        completed += 1;
        if result.success {
            found += 1;
        }
        let progress = DiscoveryProgress {
            completed,
            total,
            address: result.address,
            found,
        };

        let event = if result.success {
            DiscoveryEvent::Found {
                progress,
                device: device_from(&result),
            }
        } else {
            DiscoveryEvent::Progress(progress)
        };

        if tx.send(event).await.is_err() {
            debug!("Event receiver dropped, ending the pass");
            return;
        }
    }

    if cancelled {
        // No further events once cancellation is observed, but in-flight
        // probes are drained so no address is left half-probed.
        while results.next().await.is_some() {}
        info!("📡 Scanning cancelled after {}/{} address(es), {} device(s) found", completed, total, found);
    } else {
        info!("📡 Scanning {} address(es)... OK, {} device(s) found", total, found);
    }
}

fn device_from(result: &ProbeResult) -> Device {
    let octets = result.address.octets();
    Device {
        id: format!("{}-{}-{}-{}-{}", result.brand, octets[0], octets[1], octets[2], octets[3]),
        name: format!("{} TV ({})", result.brand.label(), result.address),
        address: result.address,
        port: result.port.unwrap_or_default(),
        brand: result.brand,
        protocol: result.protocol,
        online: true,
        paired: false,
        last_seen: Some(Utc::now()),
        last_command: None,
        auth_token: None,
    }
}
