// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Next-hops of candidate routes

pub use crate::interfaces::interface::IfIndex;
use config::StaticNextHop;
use std::fmt::Display;
use std::net::IpAddr;

/// The interface a next-hop resolves over. This refers to an interface by name and index
/// and does not own it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Egress {
    pub ifindex: IfIndex,
    pub ifname: String,
}
impl Egress {
    #[must_use]
    pub fn new(ifname: &str, ifindex: IfIndex) -> Self {
        Self {
            ifindex,
            ifname: ifname.to_owned(),
        }
    }
}

/// What a next-hop points to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NhKind {
    /// A gateway address, optionally constrained to be reached over some interface
    Gateway {
        address: IpAddr,
        interface: Option<String>,
    },
    /// A directly attached interface
    Interface(String),
}

impl NhKind {
    /// Tell if this next-hop explicitly names the given interface
    #[must_use]
    pub fn names_interface(&self, ifname: &str) -> bool {
        match self {
            NhKind::Gateway {
                interface: Some(name),
                ..
            }
            | NhKind::Interface(name) => name == ifname,
            NhKind::Gateway { interface: None, .. } => false,
        }
    }
    #[must_use]
    pub fn gateway(&self) -> Option<IpAddr> {
        match self {
            NhKind::Gateway { address, .. } => Some(*address),
            NhKind::Interface(_) => None,
        }
    }
}

impl From<&StaticNextHop> for NhKind {
    fn from(nh: &StaticNextHop) -> Self {
        match nh {
            StaticNextHop::Gateway { address, interface } => NhKind::Gateway {
                address: *address,
                interface: interface.clone(),
            },
            StaticNextHop::Interface(name) => NhKind::Interface(name.clone()),
        }
    }
}

/// Anything able to tell over which interface, if any, a next-hop can currently be reached.
pub trait NhResolver {
    /// Resolve a next-hop bound to an interface
    fn resolve_interface(&self, ifname: &str) -> Option<Egress>;
    /// Resolve a gateway, optionally over a given interface
    fn resolve_gateway(&self, address: &IpAddr, ifname: Option<&str>) -> Option<Egress>;
}

/// A next-hop of a [`crate::rib::route::RouteEntry`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NextHop {
    pub kind: NhKind,
    /// The next-hop is resolvable and may be installed
    pub selected: bool,
    /// The interface resolving this next-hop, if any
    pub resolved: Option<Egress>,
}

impl NextHop {
    #[must_use]
    pub fn new(kind: NhKind) -> Self {
        Self {
            kind,
            selected: false,
            resolved: None,
        }
    }
    #[must_use]
    pub fn gateway(address: IpAddr) -> Self {
        Self::new(NhKind::Gateway {
            address,
            interface: None,
        })
    }
    #[must_use]
    pub fn gateway_via(address: IpAddr, ifname: &str) -> Self {
        Self::new(NhKind::Gateway {
            address,
            interface: Some(ifname.to_owned()),
        })
    }
    #[must_use]
    pub fn interface(ifname: &str) -> Self {
        Self::new(NhKind::Interface(ifname.to_owned()))
    }

    /// Tell over which interface this next-hop may be reached, according to some resolver
    #[must_use]
    pub fn resolvable_via<R: NhResolver + ?Sized>(&self, resolver: &R) -> Option<Egress> {
        match &self.kind {
            NhKind::Gateway { address, interface } => {
                resolver.resolve_gateway(address, interface.as_deref())
            }
            NhKind::Interface(ifname) => resolver.resolve_interface(ifname),
        }
    }

    /// Re-evaluate resolvability. Returns true if anything changed.
    pub fn refresh<R: NhResolver + ?Sized>(&mut self, resolver: &R) -> bool {
        let resolved = self.resolvable_via(resolver);
        let selected = resolved.is_some();
        let changed = self.selected != selected || self.resolved != resolved;
        self.selected = selected;
        self.resolved = resolved;
        changed
    }

    /// Tell if this next-hop depends on the given interface, either because it names it
    /// or because it is currently resolved over it
    #[must_use]
    pub fn is_bound_to(&self, ifname: &str) -> bool {
        self.kind.names_interface(ifname)
            || self.resolved.as_ref().is_some_and(|e| e.ifname == ifname)
    }
}

impl Display for NhKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NhKind::Gateway {
                address,
                interface: None,
            } => write!(f, "{address}"),
            NhKind::Gateway {
                address,
                interface: Some(ifname),
            } => write!(f, "{address} ({ifname})"),
            NhKind::Interface(ifname) => write!(f, "{ifname}"),
        }
    }
}
