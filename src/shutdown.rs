//! Stop handles for background workers and the OS signal waiter.
//!
//! Workers run in spawned tasks and watch a quit channel; a [`StopHandle`]
//! signals the channel and joins the task so shutdown is deterministic.
//! Dropping a handle without calling [`StopHandle::stop`] also ends the
//! worker: the sender side of the channel closes and the worker observes it.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to a single background worker.
#[derive(Debug)]
pub struct StopHandle {
    tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl StopHandle {
    /// Pair a quit-channel sender with the worker's join handle.
    #[must_use]
    pub fn new(tx: mpsc::Sender<()>, task: JoinHandle<()>) -> Self {
        Self { tx, task }
    }

    /// Create the quit channel for a new worker.
    #[must_use]
    pub fn channel() -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
        mpsc::channel(1)
    }

    /// Signal the worker to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.tx.send(()).await;
        let _ = self.task.await;
    }
}

/// An ordered collection of stop handles, stopped front to back.
#[derive(Debug, Default)]
pub struct StopSet {
    handles: Vec<StopHandle>,
}

impl StopSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle to the set.
    pub fn push(&mut self, handle: StopHandle) {
        self.handles.push(handle);
    }

    /// Number of handles in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when the set holds no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every worker in insertion order.
    pub async fn stop(self) {
        for handle in self.handles {
            handle.stop().await;
        }
    }
}

impl From<Vec<StopHandle>> for StopSet {
    fn from(handles: Vec<StopHandle>) -> Self {
        Self { handles }
    }
}

/// Handle to a running listener: the bound address plus its stop handle.
#[derive(Debug)]
pub struct ListenerHandle {
    addr: std::net::SocketAddr,
    stop: StopHandle,
}

impl ListenerHandle {
    /// Pair a bound address with the accept loop's stop handle.
    #[must_use]
    pub fn new(addr: std::net::SocketAddr, stop: StopHandle) -> Self {
        Self { addr, stop }
    }

    /// The address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the accept loop to exit.
    pub async fn stop(self) {
        self.stop.stop().await;
    }
}

/// Wait for SIGINT or SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received SIGINT, shutting down");
        },
        () = terminate => {
            info!("received SIGTERM, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_handle_joins_worker() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let (tx, mut rx) = StopHandle::channel();
        let task = tokio::spawn(async move {
            let _ = rx.recv().await;
            flag.store(true, Ordering::SeqCst);
        });

        let handle = StopHandle::new(tx, task);
        handle.stop().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_worker_exits_when_handle_dropped() {
        let (tx, mut rx) = StopHandle::channel();
        let task = tokio::spawn(async move {
            // recv yields None once every sender is gone
            assert!(rx.recv().await.is_none());
        });
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("worker did not observe closed channel")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_set_stops_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut set = StopSet::new();
        for i in 0..3 {
            let order = Arc::clone(&order);
            let (tx, mut rx) = StopHandle::channel();
            let task = tokio::spawn(async move {
                let _ = rx.recv().await;
                order.lock().unwrap().push(i);
            });
            set.push(StopHandle::new(tx, task));
        }
        assert_eq!(set.len(), 3);
        set.stop().await;
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
