// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Static route configuration

use crate::addr::{check_gateway, check_prefix, parse_prefix};
use crate::errors::{ConfigError, ConfigResult};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::debug;

/// Default administrative distance of static routes
pub const STATIC_DEFAULT_DISTANCE: u8 = 1;

/// The next-hop of a static route
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaticNextHop {
    /// A gateway address, optionally reached over a given interface
    Gateway {
        address: IpAddr,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interface: Option<String>,
    },
    /// A directly attached interface
    Interface(String),
}

impl StaticNextHop {
    #[must_use]
    pub fn gateway(address: IpAddr) -> Self {
        StaticNextHop::Gateway {
            address,
            interface: None,
        }
    }
    #[must_use]
    pub fn interface(name: &str) -> Self {
        StaticNextHop::Interface(name.to_owned())
    }
}

/// A static route: a prefix reachable through a next-hop at some distance.
/// Several configs for the same prefix produce ECMP routes when their distances are equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRouteConfig {
    pub prefix: IpNet,
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub nexthop: StaticNextHop,
    #[serde(default = "default_distance")]
    pub distance: u8,
}

fn default_distance() -> u8 {
    STATIC_DEFAULT_DISTANCE
}

impl StaticRouteConfig {
    #[must_use]
    pub fn new(prefix: IpNet, nexthop: StaticNextHop) -> Self {
        Self {
            prefix,
            nexthop,
            distance: STATIC_DEFAULT_DISTANCE,
        }
    }
    #[must_use]
    pub fn with_distance(mut self, distance: u8) -> Self {
        self.distance = distance;
        self
    }

    /// Validate a static route given the addresses configured locally in the same VRF
    pub fn validate(&self, local_addresses: &[IpAddr]) -> ConfigResult {
        debug!("Validating static route {self}");
        check_prefix(&self.prefix)?;
        if self.distance == 0 {
            return Err(ConfigError::BadDistance(0));
        }
        if let StaticNextHop::Gateway { address, interface } = &self.nexthop {
            if address.is_ipv4() != self.prefix.addr().is_ipv4() {
                return Err(ConfigError::FamilyMismatch(*address, self.prefix));
            }
            check_gateway(address, interface.is_some())?;
            if local_addresses.contains(address) {
                return Err(ConfigError::LocalNextHop(*address));
            }
        }
        Ok(())
    }
}

/// Parse `<prefix> <nexthop> [distance]`, where next-hop is an IP address or an interface name.
impl FromStr for StaticRouteConfig {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let prefix = parse_prefix(tokens.next().unwrap_or_default())?;
        let nexthop = match tokens.next() {
            None => return Err(ConfigError::BadNextHop(String::new())),
            Some(nh) => match nh.parse::<IpAddr>() {
                Ok(address) => StaticNextHop::gateway(address),
                Err(_) if nh.contains(['.', ':']) => {
                    return Err(ConfigError::BadNextHop(nh.to_owned()));
                }
                Err(_) => StaticNextHop::interface(nh),
            },
        };
        let distance = match tokens.next() {
            None => STATIC_DEFAULT_DISTANCE,
            Some(d) => {
                let value = d
                    .parse::<u16>()
                    .map_err(|_| ConfigError::Parse(format!("bad distance '{d}'")))?;
                u8::try_from(value)
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or(ConfigError::BadDistance(value))?
            }
        };
        if let Some(extra) = tokens.next() {
            return Err(ConfigError::Parse(format!("unexpected '{extra}'")));
        }
        Ok(Self {
            prefix,
            nexthop,
            distance,
        })
    }
}

impl Display for StaticNextHop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaticNextHop::Gateway {
                address,
                interface: None,
            } => write!(f, "{address}"),
            StaticNextHop::Gateway {
                address,
                interface: Some(ifname),
            } => write!(f, "{address} {ifname}"),
            StaticNextHop::Interface(ifname) => write!(f, "{ifname}"),
        }
    }
}
impl Display for StaticRouteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cmd = if self.prefix.addr().is_ipv4() { "ip" } else { "ipv6" };
        write!(f, "{cmd} route {} {}", self.prefix, self.nexthop)?;
        if self.distance != STATIC_DEFAULT_DISTANCE {
            write!(f, " {}", self.distance)?;
        }
        Ok(())
    }
}
