//! Single-origin HTTP reverse proxy.

use super::error::{PoolError, PoolResult};
use bytes::Bytes;
use http::request::Parts;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{Request, Response, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::{Client, Error as ClientError};
use hyper_util::rt::TokioExecutor;

/// The HTTP client shared by a pool's reverse proxies.
pub type ProxyClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Build the pool-wide client. Supports plain and TLS origins over HTTP/1.
#[must_use]
pub fn build_client() -> ProxyClient {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new()).build(connector)
}

/// A reverse proxy bound to exactly one origin.
///
/// Forwarded requests keep their method, path, query, headers and body; only
/// the scheme and authority are rewritten to the origin's.
pub struct HttpReverseProxy {
    scheme: Scheme,
    authority: Authority,
    client: ProxyClient,
}

impl std::fmt::Debug for HttpReverseProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReverseProxy")
            .field("origin", &self.origin())
            .finish()
    }
}

impl HttpReverseProxy {
    /// Create a proxy for an origin of the form `scheme://host[:port]`.
    pub fn new(origin: &str, client: ProxyClient) -> PoolResult<Self> {
        let uri: Uri = origin.parse().map_err(|e: http::uri::InvalidUri| {
            PoolError::InvalidOrigin {
                origin: origin.to_owned(),
                message: e.to_string(),
            }
        })?;
        let scheme = uri.scheme().cloned().ok_or_else(|| PoolError::InvalidOrigin {
            origin: origin.to_owned(),
            message: "missing scheme".to_owned(),
        })?;
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| PoolError::InvalidOrigin {
                origin: origin.to_owned(),
                message: "missing authority".to_owned(),
            })?;
        Ok(Self {
            scheme,
            authority,
            client,
        })
    }

    /// The origin the proxy forwards to.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Forward one request to the origin.
    pub async fn forward(
        &self,
        parts: &Parts,
        body: Bytes,
    ) -> Result<Response<Incoming>, ClientError> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .expect("uri from origin parts");
        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(Full::new(body))
            .expect("request from origin parts");
        *outbound.headers_mut() = parts.headers.clone();
        self.client.request(outbound).await
    }
}
