//! CIDR membership tests.
//!
//! Addresses are represented as big-endian 32-bit limbs: one limb for IPv4,
//! four for IPv6. Membership is a per-limb `(addr & mask) == network` check;
//! mismatched limb counts never match.

use std::net::IpAddr;

/// Encode an IP address as big-endian 32-bit limbs.
#[must_use]
pub fn ip_limbs(ip: IpAddr) -> Vec<u32> {
    match ip {
        IpAddr::V4(v4) => vec![u32::from_be_bytes(v4.octets())],
        IpAddr::V6(v6) => {
            let octets = v6.octets();
            (0..4)
                .map(|i| {
                    let idx = i * 4;
                    u32::from_be_bytes([
                        octets[idx],
                        octets[idx + 1],
                        octets[idx + 2],
                        octets[idx + 3],
                    ])
                })
                .collect()
        },
    }
}

/// An IP network in CIDR notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Network address limbs, already masked.
    addr: Vec<u32>,
    /// Network mask limbs.
    mask: Vec<u32>,
}

impl Network {
    /// Parse a network from CIDR notation (`a.b.c.d/len` or `h:h::h/len`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (ip_part, len_part) = s.split_once('/')?;
        let ip: IpAddr = ip_part.parse().ok()?;
        let prefix: u32 = len_part.parse().ok()?;
        let max_prefix = match ip {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max_prefix {
            return None;
        }

        let limbs = ip_limbs(ip);
        let mask: Vec<u32> = (0..limbs.len())
            .map(|i| {
                let bits = prefix.saturating_sub(32 * i as u32).min(32);
                if bits == 0 {
                    0
                } else {
                    u32::MAX << (32 - bits)
                }
            })
            .collect();
        let addr = limbs.iter().zip(&mask).map(|(l, m)| l & m).collect();
        Some(Self { addr, mask })
    }

    /// Return true if the network contains the given address.
    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        let limbs = ip_limbs(ip);
        if limbs.len() != self.mask.len() {
            return false;
        }
        limbs
            .iter()
            .zip(self.mask.iter())
            .zip(self.addr.iter())
            .all(|((limb, mask), addr)| limb & mask == *addr)
    }
}

/// Return true if the string is shaped like CIDR notation.
#[must_use]
pub fn is_cidr(s: &str) -> bool {
    s.contains('/') && Network::parse(s).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_limbs() {
        let limbs = ip_limbs("127.0.0.1".parse().unwrap());
        assert_eq!(limbs, vec![0x7f00_0001]);

        let limbs = ip_limbs("192.168.0.10".parse().unwrap());
        assert_eq!(limbs, vec![0xc0a8_000a]);
    }

    #[test]
    fn test_ipv6_limbs() {
        let limbs = ip_limbs("2001:db8::1".parse().unwrap());
        assert_eq!(limbs, vec![0x2001_0db8, 0, 0, 1]);
        assert_eq!(limbs.len(), 4);
    }

    #[test]
    fn test_network_contains_v4() {
        let net = Network::parse("192.168.0.0/24").unwrap();
        assert!(net.contains("192.168.0.10".parse().unwrap()));
        assert!(!net.contains("127.0.0.1".parse().unwrap()));
        assert!(!net.contains("192.168.1.10".parse().unwrap()));

        let net = Network::parse("127.0.0.0/24").unwrap();
        assert!(net.contains("127.0.0.10".parse().unwrap()));
        assert!(!net.contains("127.0.2.10".parse().unwrap()));
    }

    #[test]
    fn test_network_contains_v6() {
        let net = Network::parse("2001:db8::/32").unwrap();
        assert!(net.contains("2001:db8::1".parse().unwrap()));
        assert!(!net.contains("2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn test_network_limb_count_mismatch() {
        let net = Network::parse("192.168.0.0/24").unwrap();
        assert!(!net.contains("2001:db8::1".parse().unwrap()));

        let net = Network::parse("2001:db8::/32").unwrap();
        assert!(!net.contains("192.168.0.1".parse().unwrap()));
    }

    #[test]
    fn test_is_cidr() {
        assert!(is_cidr("10.0.0.0/8"));
        assert!(is_cidr("2001:db8::/32"));
        assert!(!is_cidr("10.0.0.1"));
        assert!(!is_cidr("10.0.0.0/33"));
        assert!(!is_cidr("not-an-ip/8"));
    }
}
