//! Round-robin service pool with retry, failover and per-IP rate limiting.

use super::error::PoolResult;
use super::proxy::{build_client, HttpReverseProxy, ProxyClient};
use crate::ratelimit::{IpRegistry, LeakyBucketLimiter};
use crate::shutdown::StopHandle;
use crate::targets::{
    empty_body, join_host_port, service_unavailable, too_many_requests, BoxedBody, ResponseFormat,
    Target,
};
use bytes::Bytes;
use http::request::Parts;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Maximum distinct services tried per request.
pub const SERVICE_MAX_ATTEMPTS: u32 = 3;
/// Maximum same-service retries per request.
pub const SERVICE_MAX_RETRIES: u32 = 3;
/// Delay before a same-service retry.
pub const SERVICE_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Timeout for passive health probes.
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-request dispatch bookkeeping. Retries are shared across the request,
/// attempts count distinct services.
#[derive(Debug, Clone, Copy, Default)]
struct DispatchCounters {
    attempts: u32,
    retries: u32,
}

/// A backend service: its target plus the reverse proxy bound to it.
#[derive(Debug)]
pub struct Service {
    /// The service's target.
    pub target: Arc<Target>,
    proxy: HttpReverseProxy,
}

/// A pool of HTTP services balanced with round-robin selection.
pub struct ServicePool {
    index: AtomicU64,
    services: RwLock<Vec<Arc<Service>>>,
    registry: Arc<IpRegistry>,
    /// Request rate, one admitted request per this interval per client.
    rate: Duration,
    /// Steps of burst a client may queue.
    capacity: i64,
    resp_format: RwLock<ResponseFormat>,
    client: ProxyClient,
}

impl std::fmt::Debug for ServicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePool")
            .field("services", &self.len())
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl ServicePool {
    /// Create a pool admitting one request per `rate` per client with
    /// `capacity` steps of burst.
    #[must_use]
    pub fn new(rate: Duration, capacity: i64) -> Self {
        Self {
            index: AtomicU64::new(0),
            services: RwLock::new(Vec::new()),
            registry: Arc::new(IpRegistry::new(rate)),
            rate,
            capacity,
            resp_format: RwLock::new(ResponseFormat::default()),
            client: build_client(),
        }
    }

    /// Number of services in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.read().expect("services lock poisoned").len()
    }

    /// True when the pool holds no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pool's error response format.
    #[must_use]
    pub fn response_format(&self) -> ResponseFormat {
        *self
            .resp_format
            .read()
            .expect("response format lock poisoned")
    }

    /// Set the error response format; unknown formats are ignored.
    pub fn set_response_format(&self, format: ResponseFormat) {
        if format != ResponseFormat::Unknown {
            *self
                .resp_format
                .write()
                .expect("response format lock poisoned") = format;
        }
    }

    /// Add a service for the given target. The reverse proxy is bound to
    /// `protocol://host[:port]`.
    pub fn add_service(&self, target: Arc<Target>) -> PoolResult<()> {
        let host = match target.port() {
            Some(port) => join_host_port(target.host(), port),
            None => target.host().to_owned(),
        };
        let origin = format!("{}://{}", target.protocol(), host);
        let proxy = HttpReverseProxy::new(&origin, self.client.clone())?;
        debug!(origin = %origin, "service added");
        self.services
            .write()
            .expect("services lock poisoned")
            .push(Arc::new(Service { target, proxy }));
        Ok(())
    }

    /// Advance the pool index and return the effective slot.
    fn next_index(&self) -> usize {
        let n = self.len();
        if n == 0 {
            return 0;
        }
        self.advance_index(n)
    }

    /// Lock-free index advance for a known pool size.
    fn advance_index(&self, n: usize) -> usize {
        ((self.index.fetch_add(1, Ordering::SeqCst) + 1) % n as u64) as usize
    }

    /// The service at the current index.
    #[must_use]
    pub fn current_service(&self) -> Option<Arc<Service>> {
        let services = self.services.read().expect("services lock poisoned");
        if services.is_empty() {
            return None;
        }
        let idx = (self.index.load(Ordering::SeqCst) as usize) % services.len();
        Some(Arc::clone(&services[idx]))
    }

    /// The next alive service, scanning at most one full cycle from the
    /// next index. Skipped slots move the stored index forward so later
    /// requests start from the winner. Returns `None` when every service is
    /// dead.
    #[must_use]
    pub fn next_service(&self) -> Option<Arc<Service>> {
        let services = self.services.read().expect("services lock poisoned");
        if services.is_empty() {
            return None;
        }
        let n = services.len();
        let next = self.advance_index(n);
        for i in next..(next + n) {
            let idx = i % n;
            if services[idx].target.is_alive() {
                if i != next {
                    self.index.store(idx as u64, Ordering::SeqCst);
                }
                return Some(Arc::clone(&services[idx]));
            }
        }
        None
    }

    /// The rate limiter for a client IP, created on first sighting.
    #[must_use]
    pub fn get_or_create_limiter(&self, ip: IpAddr) -> Arc<LeakyBucketLimiter> {
        if let Some(limiter) = self.registry.get(ip) {
            return limiter;
        }
        let limiter = Arc::new(LeakyBucketLimiter::new(self.capacity, self.rate));
        self.registry.set(ip, Arc::clone(&limiter));
        limiter
    }

    /// Handle one request: rate limit by client IP, then dispatch across
    /// the pool with retry and failover.
    pub async fn handle<B>(
        self: &Arc<Self>,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<BoxedBody>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let started = Instant::now();
        let uri = req.uri().to_string();
        let response = self.handle_inner(req, remote_addr).await;
        debug!(
            %uri,
            status = %response.status(),
            elapsed = ?started.elapsed(),
            "request completed"
        );
        response
    }

    async fn handle_inner<B>(
        self: &Arc<Self>,
        req: Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response<BoxedBody>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let format = self.response_format();

        let Some(ip) = crate::rules::client_ip(req.headers(), remote_addr) else {
            // No way to attribute the request to a client; drop it quietly.
            info!("failed to parse client IP address");
            return Response::builder()
                .status(StatusCode::OK)
                .body(empty_body())
                .expect("static response construction");
        };

        let limiter = self.get_or_create_limiter(ip);
        let decision = limiter.next();
        if !decision.admitted {
            debug!(client = %ip, wait = ?decision.wait, "request over capacity");
            return too_many_requests(format, decision.wait);
        }

        // Buffer the body once so failed dispatches can be replayed.
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "failed to read request body");
                return service_unavailable(format);
            },
        };

        match self.attempt_next_service(&parts, &body).await {
            Some(response) => response,
            None => service_unavailable(format),
        }
    }

    /// Dispatch to successive services until one produces a response or the
    /// attempt budget runs out.
    async fn attempt_next_service(
        &self,
        parts: &Parts,
        body: &Bytes,
    ) -> Option<Response<BoxedBody>> {
        let mut counters = DispatchCounters::default();
        while counters.attempts < SERVICE_MAX_ATTEMPTS {
            let service = self.next_service()?;
            counters.attempts += 1;
            if let Some(response) = self.dispatch(&service, parts, body, &mut counters).await {
                return Some(response);
            }
        }
        None
    }

    /// Dispatch to one service, retrying it in place while the request's
    /// retry budget lasts. A service that keeps failing is marked dead.
    async fn dispatch(
        &self,
        service: &Service,
        parts: &Parts,
        body: &Bytes,
        counters: &mut DispatchCounters,
    ) -> Option<Response<BoxedBody>> {
        loop {
            match service.proxy.forward(parts, body.clone()).await {
                Ok(response) => return Some(response.map(BodyExt::boxed)),
                Err(e) => {
                    warn!(
                        target = %service.target.summary(),
                        error = %e,
                        attempts = counters.attempts,
                        retries = counters.retries,
                        "service dispatch failed"
                    );
                    if counters.retries < SERVICE_MAX_RETRIES {
                        counters.retries += 1;
                        tokio::time::sleep(SERVICE_RETRY_INTERVAL).await;
                        continue;
                    }
                    service.target.set_alive(false);
                    return None;
                },
            }
        }
    }

    /// Start the passive health checker. Every tick each target is probed
    /// and its liveness flag updated. Stopping waits for the worker to
    /// acknowledge.
    #[must_use]
    pub fn health_check(self: &Arc<Self>, interval: Duration) -> StopHandle {
        let pool = Arc::clone(self);
        let (tx, mut rx) = StopHandle::channel();
        // A zero interval would make the ticker spin.
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
                        let services: Vec<Arc<Service>> = pool
                            .services
                            .read()
                            .expect("services lock poisoned")
                            .clone();
                        for service in services {
                            let alive = service.target.is_available(HEALTH_PROBE_TIMEOUT).await;
                            service.target.set_alive(alive);
                            debug!(target = %service.target.summary(), "health checked");
                        }
                    },
                }
            }
        });
        StopHandle::new(tx, task)
    }

    /// Start the IP registry garbage collector.
    #[must_use]
    pub fn gc(&self) -> StopHandle {
        self.registry.gc()
    }
}
