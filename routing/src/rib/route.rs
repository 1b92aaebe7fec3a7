// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Candidate routes, the routes selected for forwarding and the deltas between them

use crate::prefix::Prefix;
use crate::rib::nexthop::{IfIndex, NextHop};
use crate::rib::vrf::VrfId;
use config::{EBGP_DEFAULT_DISTANCE, IBGP_DEFAULT_DISTANCE};
use std::fmt::Display;
use std::net::IpAddr;

/// The protocol a route comes from. The declaration order is the priority used
/// to break ties between protocols at the same administrative distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteOrigin {
    Connected,
    Static,
    Ospf,
    Bgp,
}

impl RouteOrigin {
    #[must_use]
    pub fn default_distance(&self) -> u8 {
        match self {
            RouteOrigin::Connected => 0,
            RouteOrigin::Static => 1,
            RouteOrigin::Ospf => 110,
            RouteOrigin::Bgp => EBGP_DEFAULT_DISTANCE,
        }
    }
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOrigin::Connected => "connected",
            RouteOrigin::Static => "static",
            RouteOrigin::Ospf => "ospf",
            RouteOrigin::Bgp => "bgp",
        }
    }
}
impl Display for RouteOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate route contributed by some protocol. The (`origin`, `instance`) pair identifies
/// an entry within the set of candidates for a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub vrf_id: VrfId,
    pub prefix: Prefix,
    pub origin: RouteOrigin,
    pub instance: u32,
    pub distance: u8,
    pub metric: u32,
    pub next_hops: Vec<NextHop>,
    pub selected: bool,
    /// BGP route learnt from an internal peer
    pub ibgp: bool,
}

impl RouteEntry {
    /// Create an entry with the default distance of its origin and no next-hops
    #[must_use]
    pub fn new(vrf_id: VrfId, prefix: Prefix, origin: RouteOrigin) -> Self {
        Self {
            vrf_id,
            prefix,
            origin,
            instance: 0,
            distance: origin.default_distance(),
            metric: 0,
            next_hops: Vec::with_capacity(1),
            selected: false,
            ibgp: false,
        }
    }
    #[must_use]
    pub fn with_distance(mut self, distance: u8) -> Self {
        self.distance = distance;
        self
    }
    #[must_use]
    pub fn with_metric(mut self, metric: u32) -> Self {
        self.metric = metric;
        self
    }
    #[must_use]
    pub fn with_instance(mut self, instance: u32) -> Self {
        self.instance = instance;
        self
    }
    /// Mark a BGP route as learnt from an internal peer. A route still at the eBGP
    /// default distance moves to the iBGP one.
    #[must_use]
    pub fn with_ibgp(mut self) -> Self {
        self.ibgp = true;
        if self.origin == RouteOrigin::Bgp && self.distance == EBGP_DEFAULT_DISTANCE {
            self.distance = IBGP_DEFAULT_DISTANCE;
        }
        self
    }
    /// Add a next-hop. Duplicates are ignored.
    #[must_use]
    pub fn with_nexthop(mut self, nhop: NextHop) -> Self {
        self.add_nexthop(nhop);
        self
    }
    pub fn add_nexthop(&mut self, nhop: NextHop) {
        if !self.next_hops.iter().any(|n| n.kind == nhop.kind) {
            self.next_hops.push(nhop);
        }
    }
    #[must_use]
    pub fn key(&self) -> (RouteOrigin, u32) {
        (self.origin, self.instance)
    }
    /// An entry may only be selected if it has at least one resolvable next-hop
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.next_hops.iter().any(|nh| nh.selected)
    }
    #[must_use]
    pub fn num_selected_nexthops(&self) -> usize {
        self.next_hops.iter().filter(|nh| nh.selected).count()
    }
}

/// A resolved next-hop of a route installed for forwarding
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FibNextHop {
    pub gateway: Option<IpAddr>,
    pub ifname: String,
    pub ifindex: IfIndex,
}

/// The route selected for forwarding for some prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibRoute {
    pub prefix: Prefix,
    pub origin: RouteOrigin,
    pub distance: u8,
    pub metric: u32,
    pub nhops: Vec<FibNextHop>,
}

impl FibRoute {
    #[must_use]
    pub fn num_nhops(&self) -> usize {
        self.nhops.len()
    }
}

/// The outcome of a selection run on a prefix, telling how the forwarding state must change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RibDelta {
    Unchanged(Prefix),
    Add(FibRoute),
    Replace { old: FibRoute, new: FibRoute },
    Remove(FibRoute),
}

impl RibDelta {
    /// Build the delta between the route installed for a prefix and the newly selected one
    #[must_use]
    pub fn transition(prefix: Prefix, old: Option<FibRoute>, new: Option<FibRoute>) -> Self {
        match (old, new) {
            (None, None) => RibDelta::Unchanged(prefix),
            (None, Some(new)) => RibDelta::Add(new),
            (Some(old), None) => RibDelta::Remove(old),
            (Some(old), Some(new)) if old == new => RibDelta::Unchanged(prefix),
            (Some(old), Some(new)) => RibDelta::Replace { old, new },
        }
    }
    #[must_use]
    pub fn prefix(&self) -> Prefix {
        match self {
            RibDelta::Unchanged(prefix) => *prefix,
            RibDelta::Add(route) | RibDelta::Remove(route) => route.prefix,
            RibDelta::Replace { new, .. } => new.prefix,
        }
    }
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, RibDelta::Unchanged(_))
    }
    /// The route that should be in the kernel after applying this delta
    #[must_use]
    pub fn desired(&self) -> Option<&FibRoute> {
        match self {
            RibDelta::Add(route) | RibDelta::Replace { new: route, .. } => Some(route),
            RibDelta::Unchanged(_) | RibDelta::Remove(_) => None,
        }
    }
}

impl Display for RibDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RibDelta::Unchanged(prefix) => write!(f, "{prefix}: unchanged"),
            RibDelta::Add(new) => write!(f, "{}: add {} nhops ({})", new.prefix, new.num_nhops(), new.origin),
            RibDelta::Replace { old, new } => write!(
                f,
                "{}: replace {} nhops ({}) with {} nhops ({})",
                new.prefix,
                old.num_nhops(),
                old.origin,
                new.num_nhops(),
                new.origin
            ),
            RibDelta::Remove(old) => write!(f, "{}: remove", old.prefix),
        }
    }
}
