// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Classification of reserved addresses.
//!
//! Static routes may not point to, nor be reached through, addresses that can never be
//! unicast-forwarded: broadcast, multicast, loopback or unspecified addresses.

use crate::errors::ConfigError;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn v4_class(addr: Ipv4Addr) -> Option<&'static str> {
    if addr.is_broadcast() {
        Some("broadcast")
    } else if addr.is_multicast() {
        Some("multicast")
    } else if addr.is_loopback() {
        Some("loopback")
    } else if addr.is_unspecified() {
        Some("unspecified")
    } else {
        None
    }
}

fn v6_class(addr: Ipv6Addr) -> Option<&'static str> {
    if addr.is_multicast() {
        Some("multicast")
    } else if addr.is_loopback() {
        Some("loopback")
    } else if addr.is_unspecified() {
        Some("unspecified")
    } else {
        None
    }
}

/// True for fe80::/10
#[must_use]
pub fn is_link_local_v6(addr: &Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}

fn check_prefix_v4(net: &Ipv4Net) -> Result<(), ConfigError> {
    match v4_class(net.network()) {
        // 0.0.0.0/0 is the default route
        Some("unspecified") if net.prefix_len() == 0 => Ok(()),
        Some(class) => Err(ConfigError::ReservedPrefix(IpNet::V4(*net), class)),
        None => Ok(()),
    }
}

fn check_prefix_v6(net: &Ipv6Net) -> Result<(), ConfigError> {
    let network = net.network();
    if network.is_unspecified() && net.prefix_len() == 0 {
        return Ok(());
    }
    if is_link_local_v6(&network) {
        return Err(ConfigError::ReservedPrefix(IpNet::V6(*net), "link-local"));
    }
    match v6_class(network) {
        Some(class) => Err(ConfigError::ReservedPrefix(IpNet::V6(*net), class)),
        None => Ok(()),
    }
}

/// Check that a prefix may be used as a route destination
pub fn check_prefix(prefix: &IpNet) -> Result<(), ConfigError> {
    match prefix {
        IpNet::V4(net) => check_prefix_v4(net),
        IpNet::V6(net) => check_prefix_v6(net),
    }
}

/// Check that an address may be used as a gateway. Link-local IPv6 gateways are
/// only valid if bound to an interface.
pub fn check_gateway(address: &IpAddr, has_interface: bool) -> Result<(), ConfigError> {
    let class = match address {
        IpAddr::V4(a) => v4_class(*a).or_else(|| (a.octets()[0] >= 240).then_some("reserved")),
        IpAddr::V6(a) => {
            if is_link_local_v6(a) && !has_interface {
                return Err(ConfigError::LinkLocalWithoutInterface(*address));
            }
            v6_class(*a)
        }
    };
    match class {
        Some(class) => Err(ConfigError::ReservedNextHop(*address, class)),
        None => Ok(()),
    }
}

/// Parse a prefix, requiring an explicit mask length
pub fn parse_prefix(input: &str) -> Result<IpNet, ConfigError> {
    let input = input.trim();
    if !input.contains('/') {
        return Err(ConfigError::MissingMask(input.to_owned()));
    }
    input
        .parse::<IpNet>()
        .map_err(|_| ConfigError::BadPrefix(input.to_owned()))
}
