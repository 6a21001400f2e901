//! Application-mode facade.

use super::error::{BalancerError, BalancerResult};
use crate::rules::{RequestInfo, Rule, RuleAction};
use crate::services::ServicePool;
use crate::shutdown::{ListenerHandle, StopHandle, StopSet};
use crate::targets::{empty_body, forbidden, BoxedBody, ResponseFormat, TargetGroup};
use http::header::LOCATION;
use http::{Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// TLS listener settings.
#[derive(Debug, Clone)]
struct TlsSettings {
    cert_file: String,
    key_file: String,
}

/// What a matched entry does with the request.
#[derive(Debug, Clone)]
enum EntryAction {
    /// Balance across the group's service pool.
    Forward(Arc<ServicePool>),
    /// Redirect to the group's first target.
    Redirect(String),
}

/// One target group's routing entry, scanned in registration order.
#[derive(Debug, Clone)]
pub struct AppEntry {
    name: String,
    rule: Rule,
    action: EntryAction,
}

/// The application-mode load balancer.
#[derive(Debug)]
pub struct ApplicationBalancer {
    rate: Duration,
    capacity: i64,
    entries: Vec<AppEntry>,
    tls: Option<TlsSettings>,
    resp_format: ResponseFormat,
}

impl ApplicationBalancer {
    /// Create a balancer admitting one request per `rate` per client with
    /// `capacity` steps of burst.
    #[must_use]
    pub fn new(rate: Duration, capacity: i64) -> Self {
        Self {
            rate,
            capacity,
            entries: Vec::new(),
            tls: None,
            resp_format: ResponseFormat::default(),
        }
    }

    /// The registered routing entries.
    #[must_use]
    pub fn entries(&self) -> &[AppEntry] {
        &self.entries
    }

    /// The configured error response format.
    #[must_use]
    pub fn err_response_format(&self) -> ResponseFormat {
        self.resp_format
    }

    /// Set the error response format; unknown formats are ignored.
    pub fn set_err_response_format(&mut self, format: &str) {
        let parsed = ResponseFormat::parse(format);
        if parsed != ResponseFormat::Unknown {
            self.resp_format = parsed;
        }
    }

    /// Enable TLS with the given certificate and key files.
    pub fn set_tls(&mut self, cert_file: &str, key_file: &str) {
        self.tls = Some(TlsSettings {
            cert_file: cert_file.to_owned(),
            key_file: key_file.to_owned(),
        });
    }

    /// Register a target group.
    ///
    /// Redirect groups route to their first target's URL; forward groups
    /// get a service pool holding every target. The rule must be valid and
    /// the group non-empty.
    pub fn add_target_group(&mut self, group: &TargetGroup) -> BalancerResult<()> {
        group.rule().valid()?;
        if group.targets().is_empty() {
            return Err(BalancerError::NoTargetsInGroup);
        }

        let action = match group.rule().action {
            RuleAction::Redirect => EntryAction::Redirect(group.targets()[0].url()),
            _ => {
                let pool = ServicePool::new(self.rate, self.capacity);
                pool.set_response_format(self.resp_format);
                for target in group.targets() {
                    target.set_err_response_format(self.resp_format);
                    pool.add_service(Arc::clone(target))?;
                }
                EntryAction::Forward(Arc::new(pool))
            },
        };
        self.entries.push(AppEntry {
            name: group.name().to_owned(),
            rule: group.rule().clone(),
            action,
        });
        Ok(())
    }

    /// Start passive health checking for every forward pool.
    #[must_use]
    pub fn health_check(&self, interval: Duration) -> StopSet {
        let mut stops = StopSet::new();
        for entry in &self.entries {
            if let EntryAction::Forward(pool) = &entry.action {
                stops.push(pool.health_check(interval));
            }
        }
        stops
    }

    /// Start the limiter garbage collector for every forward pool.
    #[must_use]
    pub fn gc(&self) -> StopSet {
        let mut stops = StopSet::new();
        for entry in &self.entries {
            if let EntryAction::Forward(pool) = &entry.action {
                stops.push(pool.gc());
            }
        }
        stops
    }

    /// Start the HTTP(S) listener.
    pub async fn start(&self, laddr: &str) -> BalancerResult<ListenerHandle> {
        let listener = TcpListener::bind(laddr).await?;
        let local_addr = listener.local_addr()?;
        let acceptor = match &self.tls {
            Some(settings) => Some(build_tls_acceptor(settings)?),
            None => None,
        };
        let router = Arc::new(AppRouter {
            entries: self.entries.clone(),
            resp_format: self.resp_format,
        });

        let (tx, mut rx) = StopHandle::channel();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let router = Arc::clone(&router);
                            let acceptor = acceptor.clone();
                            tokio::spawn(async move {
                                match acceptor {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(tls_stream) => {
                                            serve_connection(tls_stream, router, peer).await;
                                        },
                                        Err(e) => {
                                            debug!(peer = %peer, error = %e, "TLS handshake failed");
                                        },
                                    },
                                    None => serve_connection(stream, router, peer).await,
                                }
                            });
                        },
                        Err(e) => {
                            error!(error = %e, "accept failed");
                        },
                    },
                }
            }
        });
        info!(addr = %local_addr, tls = self.tls.is_some(), "application listener started");
        Ok(ListenerHandle::new(local_addr, StopHandle::new(tx, task)))
    }
}

/// The per-request routing state shared with the accept loop.
struct AppRouter {
    entries: Vec<AppEntry>,
    resp_format: ResponseFormat,
}

impl AppRouter {
    /// Scan entries in order and dispatch the first whose rule matches; no
    /// match renders a 403.
    async fn handle(
        self: Arc<Self>,
        req: Request<Incoming>,
        peer: SocketAddr,
    ) -> Response<BoxedBody> {
        let info = RequestInfo::from_request(&req, Some(peer));
        for entry in &self.entries {
            if !entry.rule.matches(&info) {
                continue;
            }
            debug!(group = %entry.name, path = %info.path, "rule matched");
            return match &entry.action {
                EntryAction::Forward(pool) => pool.handle(req, Some(peer)).await,
                EntryAction::Redirect(url) => redirect(url, req.uri()),
            };
        }
        forbidden(self.resp_format)
    }
}

/// A 301 redirect to `url` preserving the request path and query.
fn redirect(url: &str, uri: &Uri) -> Response<BoxedBody> {
    let mut location = format!("{}{}", url, uri.path());
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .body(empty_body())
        .expect("static response construction")
}

async fn serve_connection<S>(io: S, router: Arc<AppRouter>, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req| {
        let router = Arc::clone(&router);
        async move { Ok::<_, Infallible>(router.handle(req, peer).await) }
    });
    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(io), service)
        .await
    {
        debug!(peer = %peer, error = %e, "connection ended with error");
    }
}

/// Build the TLS acceptor from PEM certificate and key files.
fn build_tls_acceptor(settings: &TlsSettings) -> BalancerResult<TlsAcceptor> {
    let mut cert_reader = BufReader::new(File::open(&settings.cert_file)?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BalancerError::TlsConfig(format!("bad certificate file: {e}")))?;

    let mut key_reader = BufReader::new(File::open(&settings.key_file)?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| BalancerError::TlsConfig(format!("bad private key file: {e}")))?
        .ok_or_else(|| BalancerError::TlsConfig("no private key found".to_owned()))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| BalancerError::TlsConfig(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Condition;

    fn forward_group(name: &str) -> TargetGroup {
        let rule = Rule::new(
            RuleAction::Forward,
            vec![vec![Condition::new("always;")]],
        );
        let mut group = TargetGroup::new(name, "http", rule);
        group.add_target("10.0.0.1", Some(8080));
        group
    }

    #[test]
    fn test_add_target_group_forward() {
        let mut balancer = ApplicationBalancer::new(Duration::from_secs(1), 10);
        balancer.add_target_group(&forward_group("web")).unwrap();
        assert_eq!(balancer.entries().len(), 1);
        assert!(matches!(
            balancer.entries()[0].action,
            EntryAction::Forward(_)
        ));
    }

    #[test]
    fn test_add_target_group_redirect() {
        let rule = Rule::new(
            RuleAction::Redirect,
            vec![vec![Condition::new("always;")]],
        );
        let mut group = TargetGroup::new("old-site", "https", rule);
        group.add_target("example.com", Some(443));

        let mut balancer = ApplicationBalancer::new(Duration::from_secs(1), 10);
        balancer.add_target_group(&group).unwrap();
        let EntryAction::Redirect(url) = &balancer.entries()[0].action else {
            panic!("expected redirect entry");
        };
        assert_eq!(url, "https://example.com:443");
    }

    #[test]
    fn test_add_target_group_empty() {
        let rule = Rule::new(RuleAction::Forward, vec![]);
        let group = TargetGroup::new("empty", "http", rule);
        let mut balancer = ApplicationBalancer::new(Duration::from_secs(1), 10);
        assert!(matches!(
            balancer.add_target_group(&group),
            Err(BalancerError::NoTargetsInGroup)
        ));
    }

    #[test]
    fn test_add_target_group_invalid_rule() {
        let rule = Rule::new(
            RuleAction::Forward,
            vec![vec![Condition::new("bogus-key = x")]],
        );
        let mut group = TargetGroup::new("bad", "http", rule);
        group.add_target("10.0.0.1", Some(8080));
        let mut balancer = ApplicationBalancer::new(Duration::from_secs(1), 10);
        assert!(matches!(
            balancer.add_target_group(&group),
            Err(BalancerError::Rule(_))
        ));
    }

    #[test]
    fn test_set_err_response_format() {
        let mut balancer = ApplicationBalancer::new(Duration::from_secs(1), 10);
        balancer.set_err_response_format("json");
        assert_eq!(balancer.err_response_format(), ResponseFormat::Json);
        balancer.set_err_response_format("bogus");
        assert_eq!(balancer.err_response_format(), ResponseFormat::Json);
    }

    #[test]
    fn test_redirect_preserves_path_and_query() {
        let uri: Uri = "/users/login?next=%2Fhome".parse().unwrap();
        let response = redirect("https://example.com", &uri);
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "https://example.com/users/login?next=%2Fhome"
        );
    }

    #[tokio::test]
    async fn test_health_check_and_gc_cover_forward_pools() {
        let mut balancer = ApplicationBalancer::new(Duration::from_secs(1), 10);
        balancer.add_target_group(&forward_group("a")).unwrap();
        balancer.add_target_group(&forward_group("b")).unwrap();

        let health = balancer.health_check(Duration::from_secs(60));
        assert_eq!(health.len(), 2);
        health.stop().await;

        let gc = balancer.gc();
        assert_eq!(gc.len(), 2);
        gc.stop().await;
    }
}
