//! Client IP extraction.

use http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Extract the client IP for a request.
///
/// Tries the `X-REAL-IP` header first, then each comma-separated element of
/// `X-FORWARD-FOR`, and finally the host part of the remote address. Returns
/// `None` when nothing parses; callers treat that as an unidentifiable
/// client.
#[must_use]
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> Option<IpAddr> {
    if let Some(v) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = v.parse::<IpAddr>() {
            return Some(ip);
        }
    }
    if let Some(v) = headers.get("x-forward-for").and_then(|v| v.to_str().ok()) {
        for part in v.split(',') {
            if let Ok(ip) = part.parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    remote_addr.map(|addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_real_ip_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("127.0.0.1"));
        let ip = client_ip(&headers, None).unwrap();
        assert_eq!(ip.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_forward_for_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forward-for", HeaderValue::from_static("10.0.0.7"));
        let ip = client_ip(&headers, None).unwrap();
        assert_eq!(ip.to_string(), "10.0.0.7");
    }

    #[test]
    fn test_forward_for_first_parseable() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forward-for",
            HeaderValue::from_static("unknown,10.0.0.7"),
        );
        let ip = client_ip(&headers, None).unwrap();
        assert_eq!(ip.to_string(), "10.0.0.7");
    }

    #[test]
    fn test_remote_addr_fallback() {
        let headers = HeaderMap::new();
        let remote: SocketAddr = "192.168.0.9:8080".parse().unwrap();
        let ip = client_ip(&headers, Some(remote)).unwrap();
        assert_eq!(ip.to_string(), "192.168.0.9");
    }

    #[test]
    fn test_header_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("1.1.1.1"));
        headers.insert("x-forward-for", HeaderValue::from_static("2.2.2.2"));
        let remote: SocketAddr = "3.3.3.3:80".parse().unwrap();
        let ip = client_ip(&headers, Some(remote)).unwrap();
        assert_eq!(ip.to_string(), "1.1.1.1");
    }

    #[test]
    fn test_nothing_parses() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        assert!(client_ip(&headers, None).is_none());
    }
}
