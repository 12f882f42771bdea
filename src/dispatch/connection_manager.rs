use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("timed out connecting to {0}")]
    ConnectTimeout(SocketAddr),
    #[error("could not connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: std::io::Error },
    #[error("timed out writing to {0}")]
    WriteTimeout(SocketAddr),
    #[error("could not write to {addr}: {source}")]
    Write { addr: SocketAddr, source: std::io::Error },
    #[error("connection is closed")]
    Closed,
}

#[derive(Debug)]
struct PersistentConnection {
    stream: TcpStream,
    addr: SocketAddr,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

type Slot = Arc<Mutex<Option<PersistentConnection>>>;

/// Owns the persistent connections of socket-protocol devices, keyed by
/// device id. Per id the lifecycle is absent → connecting → established, and
/// back to absent on failure or release; at most one live connection per id.
///
/// The table lock is held only to fetch or insert a key's slot; opening,
/// writing and teardown happen under the per-key lock so unrelated devices
/// never contend. A key's slot is never removed once created: absent means
/// an empty slot, which keeps checked-out slot clones authoritative.
#[derive(Debug)]
pub struct ConnectionManager {
    entries: Mutex<HashMap<String, Slot>>,
    connect_timeout: Duration,
}

/// Exclusive access to one device's established connection. Holding the
/// handle is what serialises commands to the same device.
#[derive(Debug)]
pub struct ConnectionHandle {
    guard: OwnedMutexGuard<Option<PersistentConnection>>,
}

impl ConnectionManager {
    pub fn new(connect_timeout: Duration) -> Self {
        ConnectionManager {
            entries: Mutex::new(HashMap::new()),
            connect_timeout,
        }
    }

    /// Returns the device's established connection, opening one if the slot
    /// is empty. Concurrent callers for the same id serialise on the per-key
    /// lock, so the second caller reuses the connection the first one opened.
    /// A failed connect leaves the slot empty, which is the absent state.
    #[instrument(skip(self, addr))]
    pub async fn acquire(&self, device_id: &str, addr: SocketAddr) -> Result<ConnectionHandle, ConnectionError> {
        let slot = {
            let mut entries = self.entries.lock().await;
            entries.entry(device_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(None))).clone()
        };

        let mut guard = slot.lock_owned().await;
        if guard.is_none() {
            debug!("Opening persistent connection to {}...", addr);
            let stream = match timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => return Err(ConnectionError::Connect { addr, source }),
                Err(_) => return Err(ConnectionError::ConnectTimeout(addr)),
            };
            let now = Utc::now();
            *guard = Some(PersistentConnection {
                stream,
                addr,
                created_at: now,
                last_activity: now,
            });
            info!("🔌 Opened persistent connection to {}", addr);
        }

        Ok(ConnectionHandle { guard })
    }

    /// Tears the device's connection down and returns its state to absent.
    /// Teardown happens under the per-key lock: acquirers already queued on
    /// the slot keep their place, and the slot itself stays valid so no
    /// second connection can be opened behind their back. Waits for an
    /// outstanding handle to be dropped first.
    pub async fn release(&self, device_id: &str) {
        let slot = self.entries.lock().await.get(device_id).cloned();
        if let Some(slot) = slot {
            if slot.lock().await.take().is_some() {
                info!(device_id = device_id, "🔌 Released connection for '{}'", device_id);
            }
        }
    }

    /// Tears down every live connection. Called once on application shutdown.
    pub async fn release_all(&self) {
        let slots = self.entries.lock().await.values().cloned().collect::<Vec<_>>();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.take().is_some() {
                count += 1;
            }
        }
        if count > 0 {
            info!("🔌 Released {} connection(s)", count);
        }
    }

    /// Number of currently established connections. Entries whose per-key
    /// lock is held elsewhere are counted as established.
    pub async fn established_count(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|slot| slot.try_lock().map(|guard| guard.is_some()).unwrap_or(true)).count()
    }
}

impl ConnectionHandle {
    /// Writes one newline-terminated payload. On failure the connection is
    /// dropped so the slot returns to absent.
    pub async fn send_line(&mut self, payload: &[u8], write_timeout: Duration) -> Result<(), ConnectionError> {
        let Some(connection) = self.guard.as_mut() else {
            return Err(ConnectionError::Closed);
        };
        let addr = connection.addr;

        let mut line = payload.to_vec();
        line.push(b'\n');

        let write = async {
            connection.stream.write_all(&line).await?;
            connection.stream.flush().await
        };
        match timeout(write_timeout, write).await {
            Ok(Ok(())) => {
                connection.last_activity = Utc::now();
                Ok(())
            }
            Ok(Err(source)) => {
                *self.guard = None;
                Err(ConnectionError::Write { addr, source })
            }
            Err(_) => {
                *self.guard = None;
                Err(ConnectionError::WriteTimeout(addr))
            }
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.guard.as_ref().map(|connection| connection.created_at)
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.guard.as_ref().map(|connection| connection.last_activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use tokio::task;

    /// Accepts connections, counts them and keeps the sockets alive so writes
    /// from the manager side succeed.
    async fn spawn_listener() -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();
        task::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                sockets.push(stream);
            }
        });
        (addr, accepts)
    }

    #[tokio::test]
    async fn acquire_reuses_an_established_connection() {
        let (addr, accepts) = spawn_listener().await;
        let manager = ConnectionManager::new(Duration::from_millis(500));

        let first = manager.acquire("tv-1", addr).await.unwrap();
        let created_at = first.created_at();
        drop(first);

        let second = manager.acquire("tv-1", addr).await.unwrap();
        // Let the listener task observe the accept before reading its counter.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(second.created_at(), created_at);
        assert_eq!(accepts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.established_count().await, 1);
    }

    #[tokio::test]
    async fn concurrent_acquires_open_exactly_one_connection() {
        let (addr, accepts) = spawn_listener().await;
        let manager = Arc::new(ConnectionManager::new(Duration::from_millis(500)));

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let manager = manager.clone();
            tasks.push(task::spawn(async move {
                let mut handle = manager.acquire("tv-1", addr).await.unwrap();
                handle.send_line(b"{}", Duration::from_millis(500)).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(accepts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_during_queued_acquires_never_duplicates_the_connection() {
        let (addr, accepts) = spawn_listener().await;
        let manager = Arc::new(ConnectionManager::new(Duration::from_millis(500)));

        let first = manager.acquire("tv-1", addr).await.unwrap();
        // Let the listener task observe the accept before reading its counter.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1);

        // Queue a second acquirer, then a release, then a third acquirer on
        // the same id while the first handle is still checked out.
        let queued = {
            let manager = manager.clone();
            task::spawn(async move {
                let handle = manager.acquire("tv-1", addr).await.unwrap();
                drop(handle);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let releasing = {
            let manager = manager.clone();
            task::spawn(async move { manager.release("tv-1").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let late = {
            let manager = manager.clone();
            task::spawn(async move {
                let handle = manager.acquire("tv-1", addr).await.unwrap();
                drop(handle);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Nothing may open a second socket while the first is checked out.
        assert_eq!(accepts.load(Ordering::SeqCst), 1);

        drop(first);
        queued.await.unwrap();
        releasing.await.unwrap();
        late.await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The queued acquirer reused the connection, the release tore it
        // down, the late acquirer opened a fresh one.
        assert_eq!(accepts.load(Ordering::SeqCst), 2);
        assert_eq!(manager.established_count().await, 1);
    }

    #[tokio::test]
    async fn failed_connect_leaves_the_entry_absent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let manager = ConnectionManager::new(Duration::from_millis(500));
        let result = manager.acquire("tv-1", addr).await;

        assert!(matches!(result, Err(ConnectionError::Connect { .. })));
        assert_eq!(manager.established_count().await, 0);
    }

    #[tokio::test]
    async fn release_returns_the_device_to_absent() {
        let (addr, accepts) = spawn_listener().await;
        let manager = ConnectionManager::new(Duration::from_millis(500));

        drop(manager.acquire("tv-1", addr).await.unwrap());
        manager.release("tv-1").await;
        assert_eq!(manager.established_count().await, 0);

        drop(manager.acquire("tv-1", addr).await.unwrap());
        assert_eq!(accepts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn release_all_clears_every_device() {
        let (addr, _accepts) = spawn_listener().await;
        let manager = ConnectionManager::new(Duration::from_millis(500));

        drop(manager.acquire("tv-1", addr).await.unwrap());
        drop(manager.acquire("tv-2", addr).await.unwrap());
        assert_eq!(manager.established_count().await, 2);

        manager.release_all().await;
        assert_eq!(manager.established_count().await, 0);
    }

    #[tokio::test]
    async fn send_line_stamps_last_activity() {
        let (addr, _accepts) = spawn_listener().await;
        let manager = ConnectionManager::new(Duration::from_millis(500));

        let mut handle = manager.acquire("tv-1", addr).await.unwrap();
        let before = handle.last_activity().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        handle.send_line(b"{\"method\":\"ms.remote.control\"}", Duration::from_millis(500)).await.unwrap();

        assert!(handle.last_activity().unwrap() > before);
        assert_eq!(handle.created_at().unwrap(), before);
    }
}
