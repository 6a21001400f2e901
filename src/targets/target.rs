//! The backend target model and its availability probe.

use super::error::{TargetError, TargetResult};
use super::response::ResponseFormat;
use http::Uri;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::TlsConnector;

/// A transport protocol a backend can be dialed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Stream transport.
    Tcp,
    /// Datagram transport.
    Udp,
}

impl Transport {
    /// The transport's name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// The well-known port for an application protocol.
#[must_use]
pub fn default_port(protocol: &str) -> Option<u16> {
    match protocol.to_ascii_lowercase().as_str() {
        "http" => Some(80),
        "ssh" => Some(22),
        "telnet" => Some(23),
        "smtp" => Some(25),
        "dns" => Some(53),
        "ntp" => Some(123),
        "ldap" => Some(389),
        "https" => Some(443),
        "ldaps" => Some(636),
        _ => None,
    }
}

/// The application protocol commonly served on a port.
#[must_use]
pub fn protocol_for_port(port: u16) -> Option<&'static str> {
    match port {
        80 => Some("http"),
        22 => Some("ssh"),
        23 => Some("telnet"),
        25 => Some("smtp"),
        53 => Some("dns"),
        123 => Some("ntp"),
        389 => Some("ldap"),
        443 => Some("https"),
        636 => Some("ldaps"),
        _ => None,
    }
}

/// The transports a protocol can be dialed over, in probe order. Unknown
/// protocols yield an empty list and therefore always probe dead.
#[must_use]
pub fn transports(protocol: &str) -> &'static [Transport] {
    match protocol.to_ascii_lowercase().as_str() {
        "tcp" | "http" | "ssh" | "telnet" | "smtp" | "ldap" | "https" | "ldaps" => {
            &[Transport::Tcp]
        },
        "udp" | "ntp" => &[Transport::Udp],
        "dns" => &[Transport::Udp, Transport::Tcp],
        _ => &[],
    }
}

/// True if the protocol wraps its transport in TLS.
#[must_use]
pub fn is_tls(protocol: &str) -> bool {
    matches!(protocol.to_ascii_lowercase().as_str(), "https" | "ldaps")
}

/// Join a host and port, bracketing IPv6 literals.
#[must_use]
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Whether a target addresses an IP literal or a domain name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// The host is an IP literal.
    Ip,
    /// The host is a domain name.
    Domain,
}

impl TargetKind {
    /// The kind's name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Domain => "domain",
        }
    }
}

/// An addressable backend endpoint.
#[derive(Debug)]
pub struct Target {
    host: String,
    port: Option<u16>,
    protocol: String,
    kind: TargetKind,
    alive: RwLock<bool>,
    err_resp_format: RwLock<ResponseFormat>,
}

impl Target {
    /// Create a target. The kind is derived from whether the host parses as
    /// an IP literal. Targets start out alive.
    #[must_use]
    pub fn new(host: impl Into<String>, port: Option<u16>, protocol: impl Into<String>) -> Arc<Self> {
        let host = host.into();
        let kind = if host.parse::<IpAddr>().is_ok() {
            TargetKind::Ip
        } else {
            TargetKind::Domain
        };
        Arc::new(Self {
            host,
            port,
            protocol: protocol.into(),
            kind,
            alive: RwLock::new(true),
            err_resp_format: RwLock::new(ResponseFormat::default()),
        })
    }

    /// Create a target from a service URL such as `http://10.0.0.1:8080`.
    /// A URL without an explicit port inherits the scheme's default port.
    pub fn from_url(url: &str) -> TargetResult<Arc<Self>> {
        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
            TargetError::InvalidUrl {
                url: url.to_owned(),
                message: e.to_string(),
            }
        })?;
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| TargetError::InvalidUrl {
                url: url.to_owned(),
                message: "missing scheme".to_owned(),
            })?
            .to_owned();
        let host = uri
            .host()
            .ok_or_else(|| TargetError::InvalidUrl {
                url: url.to_owned(),
                message: "missing host".to_owned(),
            })?
            .to_owned();
        let port = uri.port_u16().or_else(|| default_port(&scheme));
        Ok(Self::new(host, port, scheme))
    }

    /// The target's host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The target's port, if one is set.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The target's application protocol.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Whether the host is an IP literal or a domain.
    #[must_use]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Whether the target is currently considered alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        *self.alive.read().expect("alive lock poisoned")
    }

    /// Update the target's liveness flag.
    pub fn set_alive(&self, alive: bool) {
        *self.alive.write().expect("alive lock poisoned") = alive;
    }

    /// The target's error response format.
    #[must_use]
    pub fn err_response_format(&self) -> ResponseFormat {
        *self
            .err_resp_format
            .read()
            .expect("response format lock poisoned")
    }

    /// Set the error response format; unknown formats are ignored.
    pub fn set_err_response_format(&self, format: ResponseFormat) {
        if format != ResponseFormat::Unknown {
            *self
                .err_resp_format
                .write()
                .expect("response format lock poisoned") = format;
        }
    }

    /// The target formatted as a URL: `<protocol>://<host>[:<port>]`.
    #[must_use]
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol, self.host, port),
            None => format!("{}://{}", self.protocol, self.host),
        }
    }

    /// A comma-separated `key=value` dump of the target's attributes.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("alive={}", self.is_alive()),
            format!("host={}", self.host),
        ];
        if let Some(port) = self.port {
            parts.push(format!("port={port}"));
        }
        if !self.protocol.is_empty() {
            parts.push(format!("protocol={}", self.protocol));
        }
        parts.push(format!("type={}", self.kind.as_str()));
        parts.join(",")
    }

    /// Probe the target: dial each of the protocol's transports with the
    /// given timeout and report whether any connection succeeded. TLS
    /// protocols complete a handshake with certificate verification
    /// disabled.
    pub async fn is_available(&self, timeout: Duration) -> bool {
        let Some(port) = self.port else {
            return false;
        };
        let addr = join_host_port(&self.host, port);
        let use_tls = is_tls(&self.protocol);
        for transport in transports(&self.protocol) {
            if dial(*transport, &self.host, &addr, timeout, use_tls).await {
                return true;
            }
        }
        false
    }
}

async fn dial(transport: Transport, host: &str, addr: &str, timeout: Duration, use_tls: bool) -> bool {
    match transport {
        Transport::Tcp => {
            let connect = TcpStream::connect(addr);
            match tokio::time::timeout(timeout, connect).await {
                Ok(Ok(stream)) => {
                    if use_tls {
                        tls_handshake(stream, host, timeout).await
                    } else {
                        true
                    }
                },
                _ => false,
            }
        },
        // Datagram sockets have no handshake; a successful connect is the
        // closest equivalent to the dialer's check.
        Transport::Udp => match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket.connect(addr).await.is_ok(),
            Err(_) => false,
        },
    }
}

async fn tls_handshake(stream: TcpStream, host: &str, timeout: Duration) -> bool {
    let connector = TlsConnector::from(Arc::clone(probe_tls_config()));
    let Ok(server_name) = ServerName::try_from(host.to_owned()) else {
        return false;
    };
    matches!(
        tokio::time::timeout(timeout, connector.connect(server_name, stream)).await,
        Ok(Ok(_))
    )
}

/// Shared client config for probe handshakes. The probe only checks
/// reachability, so certificate validity is not enforced.
fn probe_tls_config() -> &'static Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG.get_or_init(|| {
        let config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth();
        Arc::new(config)
    })
}

/// Certificate verifier that accepts any server certificate.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_protocol_tables() {
        assert_eq!(default_port("http"), Some(80));
        assert_eq!(default_port("HTTPS"), Some(443));
        assert_eq!(default_port("gopher"), None);

        assert_eq!(protocol_for_port(443), Some("https"));
        assert_eq!(protocol_for_port(9999), None);

        assert_eq!(transports("http"), &[Transport::Tcp]);
        assert_eq!(transports("dns"), &[Transport::Udp, Transport::Tcp]);
        assert_eq!(transports("ntp"), &[Transport::Udp]);
        assert!(transports("gopher").is_empty());
    }

    #[test]
    fn test_is_tls() {
        assert!(is_tls("https"));
        assert!(is_tls("LDAPS"));
        assert!(!is_tls("http"));
        assert!(!is_tls("tcp"));
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("10.0.0.1", 80), "10.0.0.1:80");
        assert_eq!(join_host_port("::1", 80), "[::1]:80");
    }

    #[test]
    fn test_target_kind_derivation() {
        assert_eq!(Target::new("10.0.0.1", Some(80), "http").kind(), TargetKind::Ip);
        assert_eq!(Target::new("::1", Some(80), "http").kind(), TargetKind::Ip);
        assert_eq!(
            Target::new("example.com", Some(80), "http").kind(),
            TargetKind::Domain
        );
    }

    #[test]
    fn test_target_liveness() {
        let target = Target::new("10.0.0.1", Some(80), "http");
        assert!(target.is_alive());
        target.set_alive(false);
        assert!(!target.is_alive());
        target.set_alive(true);
        assert!(target.is_alive());
    }

    #[test]
    fn test_target_url() {
        let target = Target::new("example.com", Some(8443), "https");
        assert_eq!(target.url(), "https://example.com:8443");

        let target = Target::new("example.com", None, "https");
        assert_eq!(target.url(), "https://example.com");
    }

    #[test]
    fn test_target_summary() {
        let target = Target::new("10.0.0.1", Some(8080), "http");
        assert_eq!(
            target.summary(),
            "alive=true,host=10.0.0.1,port=8080,protocol=http,type=ip"
        );
    }

    #[test]
    fn test_target_from_url() {
        let target = Target::from_url("http://10.0.0.1:8080").unwrap();
        assert_eq!(target.host(), "10.0.0.1");
        assert_eq!(target.port(), Some(8080));
        assert_eq!(target.protocol(), "http");
        assert_eq!(target.kind(), TargetKind::Ip);
    }

    #[test]
    fn test_target_from_url_default_port() {
        let target = Target::from_url("https://example.com").unwrap();
        assert_eq!(target.port(), Some(443));
        assert_eq!(target.kind(), TargetKind::Domain);
    }

    #[test]
    fn test_target_from_url_invalid() {
        assert!(Target::from_url("not a url at all").is_err());
        assert!(Target::from_url("/just/a/path").is_err());
    }

    #[test]
    fn test_target_response_format() {
        let target = Target::new("10.0.0.1", Some(80), "http");
        assert_eq!(target.err_response_format(), ResponseFormat::Plain);
        target.set_err_response_format(ResponseFormat::Json);
        assert_eq!(target.err_response_format(), ResponseFormat::Json);
        target.set_err_response_format(ResponseFormat::Unknown);
        assert_eq!(target.err_response_format(), ResponseFormat::Json);
    }

    #[tokio::test]
    async fn test_is_available_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let target = Target::new("127.0.0.1", Some(addr.port()), "http");
        assert!(target.is_available(Duration::from_secs(1)).await);
        accept.abort();
    }

    #[tokio::test]
    async fn test_is_available_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = Target::new("127.0.0.1", Some(addr.port()), "http");
        assert!(!target.is_available(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_is_available_unknown_protocol() {
        // No transports to try, so the probe reports dead.
        let target = Target::new("127.0.0.1", Some(80), "gopher");
        assert!(!target.is_available(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_is_available_missing_port() {
        let target = Target::new("127.0.0.1", None, "http");
        assert!(!target.is_available(Duration::from_millis(100)).await);
    }
}
