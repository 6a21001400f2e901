//! Round-robin network pool and its accept loop.

use super::error::{NetworkError, NetworkResult};
use super::proxy::ReverseNetworkProxy;
use crate::shutdown::{ListenerHandle, StopHandle};
use crate::targets::{join_host_port, transports, Target, Transport};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, warn};

/// Maximum distinct targets tried per connection.
pub const TARGET_MAX_ATTEMPTS: u32 = 3;
/// Maximum same-target retries per connection.
pub const TARGET_MAX_RETRIES: u32 = 3;
/// Delay before a same-target retry.
pub const TARGET_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Timeout for passive health probes.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-connection dispatch bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
struct DispatchCounters {
    attempts: u32,
    retries: u32,
}

/// A network-level target: its model plus the reverse proxy bound to it.
#[derive(Debug)]
pub struct NetworkTarget {
    /// The target model.
    pub target: Arc<Target>,
    proxy: ReverseNetworkProxy,
}

/// A pool of network targets balanced with round-robin selection.
#[derive(Debug)]
pub struct NetworkPool {
    index: AtomicU64,
    targets: RwLock<Vec<Arc<NetworkTarget>>>,
}

impl Default for NetworkPool {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: AtomicU64::new(0),
            targets: RwLock::new(Vec::new()),
        }
    }

    /// Number of targets in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.read().expect("targets lock poisoned").len()
    }

    /// True when the pool holds no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a target with the given dial timeout.
    ///
    /// The protocol must resolve to a supported transport, directly or
    /// through the application-protocol transport table (first transport
    /// wins), and the target needs both host and port.
    pub fn add_target(&self, target: Arc<Target>, timeout: Duration) -> NetworkResult<()> {
        let transport = resolve_transport(target.protocol())?;
        if target.host().is_empty() {
            return Err(NetworkError::MissingHost);
        }
        let Some(port) = target.port() else {
            return Err(NetworkError::MissingPort);
        };
        let addr = join_host_port(target.host(), port);
        let proxy = ReverseNetworkProxy::new(transport, addr, timeout);
        debug!(target = %target.summary(), transport = transport.as_str(), "network target added");
        self.targets
            .write()
            .expect("targets lock poisoned")
            .push(Arc::new(NetworkTarget { target, proxy }));
        Ok(())
    }

    /// Lock-free index advance for a known pool size.
    fn advance_index(&self, n: usize) -> usize {
        ((self.index.fetch_add(1, Ordering::SeqCst) + 1) % n as u64) as usize
    }

    /// The target at the current index.
    #[must_use]
    pub fn current_target(&self) -> Option<Arc<NetworkTarget>> {
        let targets = self.targets.read().expect("targets lock poisoned");
        if targets.is_empty() {
            return None;
        }
        let idx = (self.index.load(Ordering::SeqCst) as usize) % targets.len();
        Some(Arc::clone(&targets[idx]))
    }

    /// The next alive target, scanning at most one full cycle from the
    /// next index. Returns `None` when every target is dead.
    #[must_use]
    pub fn next_target(&self) -> Option<Arc<NetworkTarget>> {
        let targets = self.targets.read().expect("targets lock poisoned");
        if targets.is_empty() {
            return None;
        }
        let n = targets.len();
        let next = self.advance_index(n);
        for i in next..(next + n) {
            let idx = i % n;
            if targets[idx].target.is_alive() {
                if i != next {
                    self.index.store(idx as u64, Ordering::SeqCst);
                }
                return Some(Arc::clone(&targets[idx]));
            }
        }
        None
    }

    /// Listen on `laddr` and splice each accepted connection to a backend.
    /// The listener transport is TCP regardless of target protocols.
    pub async fn load_balancer(self: &Arc<Self>, laddr: &str) -> io::Result<ListenerHandle> {
        let listener = TcpListener::bind(laddr).await?;
        let local_addr = listener.local_addr()?;
        let pool = Arc::clone(self);
        let (tx, mut rx) = StopHandle::channel();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((conn, peer)) => {
                            let pool = Arc::clone(&pool);
                            tokio::spawn(async move {
                                pool.handle_connection(conn, peer).await;
                            });
                        },
                        Err(e) => {
                            error!(error = %e, "accept failed");
                        },
                    },
                }
            }
        });
        Ok(ListenerHandle::new(local_addr, StopHandle::new(tx, task)))
    }

    /// Drive one accepted connection through the dispatch ladder. The
    /// connection is dropped, and thereby closed, once the targets are
    /// exhausted.
    pub async fn handle_connection(self: Arc<Self>, conn: TcpStream, peer: SocketAddr) {
        let mut counters = DispatchCounters::default();
        let picked = loop {
            if counters.attempts >= TARGET_MAX_ATTEMPTS {
                break None;
            }
            let Some(target) = self.next_target() else {
                break None;
            };
            counters.attempts += 1;
            match self.dial_with_retries(&target, &mut counters).await {
                Some(remote) => break Some((target, remote)),
                None => continue,
            }
        };

        match picked {
            Some((target, remote)) => target.proxy.splice(conn, remote).await,
            None => {
                error!(peer = %peer, "network targets exhausted");
            },
        }
    }

    /// Dial one target, retrying it in place while the connection's retry
    /// budget lasts. A target that keeps failing is marked dead.
    async fn dial_with_retries(
        &self,
        target: &NetworkTarget,
        counters: &mut DispatchCounters,
    ) -> Option<TcpStream> {
        loop {
            match target.proxy.dial().await {
                Ok(remote) => return Some(remote),
                Err(e) => {
                    warn!(
                        target = %target.target.summary(),
                        error = %e,
                        attempts = counters.attempts,
                        retries = counters.retries,
                        "backend dial failed"
                    );
                    if counters.retries < TARGET_MAX_RETRIES {
                        counters.retries += 1;
                        tokio::time::sleep(TARGET_RETRY_INTERVAL).await;
                        continue;
                    }
                    target.target.set_alive(false);
                    return None;
                },
            }
        }
    }

    /// Start the passive health checker for the pool's targets.
    #[must_use]
    pub fn health_check(self: &Arc<Self>, interval: Duration) -> StopHandle {
        let pool = Arc::clone(self);
        let (tx, mut rx) = StopHandle::channel();
        let period = if interval.is_zero() {
            Duration::from_secs(1)
        } else {
            interval
        };
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = ticker.tick() => {
                        let targets: Vec<Arc<NetworkTarget>> = pool
                            .targets
                            .read()
                            .expect("targets lock poisoned")
                            .clone();
                        for entry in targets {
                            let alive = entry.target.is_available(HEALTH_PROBE_TIMEOUT).await;
                            entry.target.set_alive(alive);
                            debug!(target = %entry.target.summary(), "health checked");
                        }
                    },
                }
            }
        });
        StopHandle::new(tx, task)
    }
}

/// Resolve a target protocol to its transport: `tcp` and `udp` directly,
/// anything else through the transport table's first entry.
fn resolve_transport(protocol: &str) -> NetworkResult<Transport> {
    if protocol.eq_ignore_ascii_case("tcp") {
        return Ok(Transport::Tcp);
    }
    if protocol.eq_ignore_ascii_case("udp") {
        return Ok(Transport::Udp);
    }
    transports(protocol)
        .first()
        .copied()
        .ok_or(NetworkError::UnsupportedProtocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn target(port: u16, protocol: &str) -> Arc<Target> {
        Target::new("127.0.0.1", Some(port), protocol)
    }

    #[test]
    fn test_resolve_transport() {
        assert_eq!(resolve_transport("tcp").unwrap(), Transport::Tcp);
        assert_eq!(resolve_transport("UDP").unwrap(), Transport::Udp);
        assert_eq!(resolve_transport("http").unwrap(), Transport::Tcp);
        assert_eq!(resolve_transport("dns").unwrap(), Transport::Udp);
        assert!(matches!(
            resolve_transport("gopher"),
            Err(NetworkError::UnsupportedProtocol)
        ));
    }

    #[tokio::test]
    async fn test_add_target_validation() {
        let pool = NetworkPool::new();

        assert!(matches!(
            pool.add_target(target(80, "gopher"), Duration::ZERO),
            Err(NetworkError::UnsupportedProtocol)
        ));
        assert!(matches!(
            pool.add_target(Target::new("", Some(80), "tcp"), Duration::ZERO),
            Err(NetworkError::MissingHost)
        ));
        assert!(matches!(
            pool.add_target(Target::new("127.0.0.1", None, "tcp"), Duration::ZERO),
            Err(NetworkError::MissingPort)
        ));

        pool.add_target(target(8080, "tcp"), Duration::ZERO).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_round_robin_skips_dead() {
        let pool = NetworkPool::new();
        pool.add_target(target(8080, "tcp"), Duration::ZERO).unwrap();
        pool.add_target(target(8081, "tcp"), Duration::ZERO).unwrap();
        pool.add_target(target(8082, "tcp"), Duration::ZERO).unwrap();

        let b = {
            let targets = pool.targets.read().unwrap();
            Arc::clone(&targets[1])
        };
        b.target.set_alive(false);

        let picks: Vec<u16> = (0..4)
            .map(|_| pool.next_target().unwrap().target.port().unwrap())
            .collect();
        assert_eq!(picks, vec![8082, 8080, 8082, 8080]);
    }

    #[tokio::test]
    async fn test_next_target_all_dead() {
        let pool = NetworkPool::new();
        pool.add_target(target(8080, "tcp"), Duration::ZERO).unwrap();
        pool.current_target().unwrap().target.set_alive(false);
        assert!(pool.next_target().is_none());
    }

    #[tokio::test]
    async fn test_load_balancer_relays_to_backend() {
        // Backend writes a fixed banner and closes.
        let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut conn, _)) = backend.accept().await else {
                    break;
                };
                let _ = conn.write_all(b"hello from backend").await;
            }
        });

        let pool = Arc::new(NetworkPool::new());
        pool.add_target(
            target(backend_addr.port(), "tcp"),
            Duration::from_secs(1),
        )
        .unwrap();

        let listener = pool.load_balancer("127.0.0.1:0").await.unwrap();
        let mut conn = TcpStream::connect(listener.local_addr()).await.unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"hello from backend");

        listener.stop().await;
    }

    #[tokio::test]
    async fn test_exhausted_targets_close_connection() {
        // A target that refuses connections: bind then drop to free the port.
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = unused.local_addr().unwrap().port();
        drop(unused);

        let pool = Arc::new(NetworkPool::new());
        pool.add_target(target(dead_port, "tcp"), Duration::from_millis(200))
            .unwrap();

        let listener = pool.load_balancer("127.0.0.1:0").await.unwrap();
        let mut conn = TcpStream::connect(listener.local_addr()).await.unwrap();
        let mut buf = Vec::new();
        // The pool gives up after its retry budget and drops our connection.
        let n = conn.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
        assert!(!pool.current_target().unwrap().target.is_alive());

        listener.stop().await;
    }
}
