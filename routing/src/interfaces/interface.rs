// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Network interface model

use crate::rib::vrf::VrfId;
use config::{InterfaceConfig, InterfaceKind};
use ipnet::IpNet;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};

/// Index of an interface
pub type IfIndex = u32;

/// The kind of an interface
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum IfKind {
    #[default]
    Ethernet,
    Loopback,
    Lag,
    Subinterface,
}
impl From<InterfaceKind> for IfKind {
    fn from(kind: InterfaceKind) -> Self {
        match kind {
            InterfaceKind::Ethernet => IfKind::Ethernet,
            InterfaceKind::Loopback => IfKind::Loopback,
            InterfaceKind::Lag => IfKind::Lag,
            InterfaceKind::Subinterface => IfKind::Subinterface,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum IfState {
    #[default]
    Unknown = 0,
    Down = 1,
    Up = 2,
}
impl From<bool> for IfState {
    fn from(up: bool) -> Self {
        if up { IfState::Up } else { IfState::Down }
    }
}

/// Whether an interface does L3 routing or is bridged ("no routing")
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum IfMode {
    #[default]
    Routing,
    Bridging,
}
impl From<bool> for IfMode {
    fn from(routing: bool) -> Self {
        if routing {
            IfMode::Routing
        } else {
            IfMode::Bridging
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Interface {
    pub name: String,
    pub ifindex: IfIndex,
    pub kind: IfKind,
    /// The LAG this interface is a member of, if any
    pub lag: Option<String>,
    pub admin_state: IfState,
    pub oper_state: IfState,
    pub mode: IfMode,
    pub addresses: BTreeSet<IpNet>,
    pub vrfid: VrfId,
}

impl Interface {
    #[must_use]
    pub fn new(name: &str, ifindex: IfIndex, kind: IfKind) -> Self {
        Self {
            name: name.to_owned(),
            ifindex,
            kind,
            lag: None,
            admin_state: IfState::Up,
            oper_state: if kind == IfKind::Lag {
                IfState::Down
            } else {
                IfState::Up
            },
            mode: IfMode::Routing,
            addresses: BTreeSet::new(),
            vrfid: 0,
        }
    }

    /// Build an interface from its configuration. Loopbacks are always operationally up.
    /// The oper state of LAGs depends on their members and starts down.
    #[must_use]
    pub fn from_config(config: &InterfaceConfig, vrfid: VrfId) -> Self {
        let kind = IfKind::from(config.kind);
        let oper_state = match kind {
            IfKind::Loopback => IfState::Up,
            IfKind::Lag => IfState::Down,
            _ => IfState::from(config.admin_up),
        };
        Self {
            name: config.name.clone(),
            ifindex: config.ifindex,
            kind,
            lag: config.lag.clone(),
            admin_state: IfState::from(config.admin_up),
            oper_state,
            mode: IfMode::from(config.routing),
            addresses: config.addresses.iter().copied().collect(),
            vrfid,
        }
    }

    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.kind == IfKind::Loopback
    }

    /// Tell if both admin and oper states are up
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.admin_state == IfState::Up && self.oper_state == IfState::Up
    }

    /// An interface may resolve next-hops if it is up and in routing mode
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.is_up() && self.mode == IfMode::Routing
    }

    #[must_use]
    pub fn has_address(&self, address: &IpAddr) -> bool {
        self.addresses.iter().any(|a| a.addr() == *address)
    }

    /// Get the length of the longest connected subnet containing an address
    #[must_use]
    pub fn subnet_match(&self, address: &IpAddr) -> Option<u8> {
        self.addresses
            .iter()
            .filter(|net| net.contains(address))
            .map(IpNet::prefix_len)
            .max()
    }

    pub fn ipv4_addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.addresses.iter().filter_map(|net| match net {
            IpNet::V4(n) => Some(n.addr()),
            IpNet::V6(_) => None,
        })
    }
}

impl Display for IfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IfState::Unknown => write!(f, "unknown"),
            IfState::Down => write!(f, "down"),
            IfState::Up => write!(f, "up"),
        }
    }
}
impl Display for IfMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IfMode::Routing => write!(f, "routing"),
            IfMode::Bridging => write!(f, "bridging"),
        }
    }
}
impl Display for IfKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IfKind::Ethernet => write!(f, "ethernet"),
            IfKind::Loopback => write!(f, "loopback"),
            IfKind::Lag => write!(f, "lag"),
            IfKind::Subinterface => write!(f, "subinterface"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::InterfaceConfigBuilder;

    #[test]
    fn test_interface_usability() {
        let cfg = InterfaceConfigBuilder::default()
            .name("1")
            .ifindex(1)
            .address("1.1.1.1/24".parse::<IpNet>().unwrap())
            .address("1.1.0.1/16".parse::<IpNet>().unwrap())
            .build()
            .unwrap();
        let mut iface = Interface::from_config(&cfg, 0);
        assert!(iface.is_usable());
        assert_eq!(iface.subnet_match(&"1.1.1.2".parse().unwrap()), Some(24));
        assert_eq!(iface.subnet_match(&"1.1.7.2".parse().unwrap()), Some(16));
        assert_eq!(iface.subnet_match(&"1.2.7.2".parse().unwrap()), None);
        assert!(iface.has_address(&"1.1.1.1".parse().unwrap()));
        assert_eq!(iface.ipv4_addresses().count(), 2);

        iface.mode = IfMode::Bridging;
        assert!(iface.is_up());
        assert!(!iface.is_usable());

        let lag = Interface::new("lag1", 20, IfKind::Lag);
        assert!(!lag.is_usable());
        assert!(Interface::new("lo", 10, IfKind::Loopback).is_usable());
    }
}
