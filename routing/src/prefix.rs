// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type to represent IP-version neutral network prefixes.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::fmt::Display;
pub use std::net::IpAddr;
pub use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrefixError {
    #[error("Invalid prefix: {0}")]
    Invalid(String),
    #[error("Mask length {0} is invalid")]
    InvalidLength(u8),
}

/// The address family of a prefix
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}
impl Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// An IPv4 or IPv6 network prefix. Prefixes are always normalized: host bits are zero,
/// so that two prefixes are equal iff their network address and length are.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Prefix {
    IPV4(Ipv4Net),
    IPV6(Ipv6Net),
}

impl Prefix {
    pub const MAX_LEN_IPV4: u8 = 32;
    pub const MAX_LEN_IPV6: u8 = 128;

    /// Build a prefix from an address and a mask length, clearing the host bits
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, PrefixError> {
        let net = IpNet::new(addr, len).map_err(|_| PrefixError::InvalidLength(len))?;
        Ok(Self::from(net))
    }
    /// Build a host prefix (/32 or /128)
    #[must_use]
    pub fn host(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(a) => Prefix::IPV4(Ipv4Net::from(a)),
            IpAddr::V6(a) => Prefix::IPV6(Ipv6Net::from(a)),
        }
    }
    /// Build 0.0.0.0/0
    #[must_use]
    pub fn root_v4() -> Prefix {
        Prefix::IPV4(Ipv4Net::default())
    }
    /// Build `::/0`.
    #[must_use]
    pub fn root_v6() -> Prefix {
        Prefix::IPV6(Ipv6Net::default())
    }
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.length() == 0
    }
    #[must_use]
    pub fn is_ipv4(&self) -> bool {
        matches!(self, Prefix::IPV4(_))
    }
    #[must_use]
    pub fn is_ipv6(&self) -> bool {
        matches!(self, Prefix::IPV6(_))
    }
    #[must_use]
    pub fn afi(&self) -> AddressFamily {
        match self {
            Prefix::IPV4(_) => AddressFamily::Ipv4,
            Prefix::IPV6(_) => AddressFamily::Ipv6,
        }
    }
    /// The network address of the prefix
    #[must_use]
    pub fn as_address(&self) -> IpAddr {
        match self {
            Prefix::IPV4(p) => IpAddr::V4(p.network()),
            Prefix::IPV6(p) => IpAddr::V6(p.network()),
        }
    }
    #[must_use]
    pub fn length(&self) -> u8 {
        match self {
            Prefix::IPV4(p) => p.prefix_len(),
            Prefix::IPV6(p) => p.prefix_len(),
        }
    }
    /// Tell if this prefix represents a single host
    #[must_use]
    pub fn is_host(&self) -> bool {
        match self {
            Prefix::IPV4(p) => p.prefix_len() == Self::MAX_LEN_IPV4,
            Prefix::IPV6(p) => p.prefix_len() == Self::MAX_LEN_IPV6,
        }
    }
    /// Check whether prefix covers a given address
    #[must_use]
    pub fn covers_addr(&self, addr: &IpAddr) -> bool {
        match (self, addr) {
            (Prefix::IPV4(p), IpAddr::V4(a)) => p.contains(a),
            (Prefix::IPV6(p), IpAddr::V6(a)) => p.contains(a),
            _ => false,
        }
    }
    #[must_use]
    pub fn as_ipnet(&self) -> IpNet {
        match self {
            Prefix::IPV4(p) => IpNet::V4(*p),
            Prefix::IPV6(p) => IpNet::V6(*p),
        }
    }
}

impl From<IpNet> for Prefix {
    fn from(net: IpNet) -> Self {
        match net.trunc() {
            IpNet::V4(p) => Prefix::IPV4(p),
            IpNet::V6(p) => Prefix::IPV6(p),
        }
    }
}
impl From<Ipv4Net> for Prefix {
    fn from(net: Ipv4Net) -> Self {
        Prefix::IPV4(net.trunc())
    }
}
impl From<Ipv6Net> for Prefix {
    fn from(net: Ipv6Net) -> Self {
        Prefix::IPV6(net.trunc())
    }
}

impl FromStr for Prefix {
    type Err = PrefixError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpNet>()
            .map(Prefix::from)
            .map_err(|_| PrefixError::Invalid(s.to_owned()))
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prefix::IPV4(p) => write!(f, "{p}"),
            Prefix::IPV6(p) => write!(f, "{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_normalization() {
        let p1: Prefix = "192.168.3.7/24".parse().unwrap();
        let p2: Prefix = "192.168.3.0/24".parse().unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1.to_string(), "192.168.3.0/24");
        assert_eq!(p1.afi(), AddressFamily::Ipv4);

        let p3 = Prefix::new("2002::17".parse().unwrap(), 120).unwrap();
        assert_eq!(p3.to_string(), "2002::/120");
        assert!(p3.is_ipv6());
        assert_eq!(Prefix::new("10.0.0.0".parse().unwrap(), 33), Err(PrefixError::InvalidLength(33)));
    }

    #[test]
    fn test_prefix_identity() {
        // no aggregation: a /24 and a /25 are distinct keys
        let p24: Prefix = "10.0.0.0/24".parse().unwrap();
        let p25: Prefix = "10.0.0.0/25".parse().unwrap();
        assert_ne!(p24, p25);
        assert!(p24.covers_addr(&"10.0.0.200".parse().unwrap()));
        assert!(!p25.covers_addr(&"10.0.0.200".parse().unwrap()));
        assert!(!p24.covers_addr(&"2001::1".parse().unwrap()));

        let host = Prefix::host("123.0.0.1".parse().unwrap());
        assert!(host.is_host());
        assert_eq!(host.to_string(), "123.0.0.1/32");
        assert!(Prefix::root_v6().is_root());
        assert!(!Prefix::root_v4().is_host());
    }
}
