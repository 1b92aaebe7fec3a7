// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The interface / link-state tracker. It owns the interface table and tells which
//! next-hops are resolvable given the state of the interfaces.

use crate::errors::RouterError;
use crate::interfaces::iftable::IfTable;
use crate::interfaces::interface::{IfIndex, IfKind, IfMode, IfState, Interface};
use crate::rib::nexthop::{Egress, NextHop, NhResolver};
use crate::rib::vrf::VrfId;
use crate::routerid::RidCandidate;
use ipnet::IpNet;
use std::cmp::Reverse;
use std::fmt::Display;
use std::net::IpAddr;
use tracing::{debug, info};

/// What changed on an interface
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IfChangeKind {
    /// The interface became usable (true) or unusable (false)
    Usable(bool),
    /// The interface was switched to bridging
    RoutingDisabled,
    AddressAdded(IpNet),
    AddressRemoved(IpNet),
    /// The interface joined a VRF
    Attached,
    /// The interface left a VRF
    Detached,
}

/// A change on an interface that may affect routing in a VRF
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfChange {
    pub ifname: String,
    pub ifindex: IfIndex,
    pub vrfid: VrfId,
    pub what: IfChangeKind,
}
impl IfChange {
    fn new(iface: &Interface, what: IfChangeKind) -> Self {
        Self {
            ifname: iface.name.clone(),
            ifindex: iface.ifindex,
            vrfid: iface.vrfid,
            what,
        }
    }
}
impl Display for IfChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "interface {} (vrf {}): ", self.ifname, self.vrfid)?;
        match &self.what {
            IfChangeKind::Usable(true) => write!(f, "usable"),
            IfChangeKind::Usable(false) => write!(f, "unusable"),
            IfChangeKind::RoutingDisabled => write!(f, "no routing"),
            IfChangeKind::AddressAdded(a) => write!(f, "address {a} added"),
            IfChangeKind::AddressRemoved(a) => write!(f, "address {a} removed"),
            IfChangeKind::Attached => write!(f, "attached"),
            IfChangeKind::Detached => write!(f, "detached"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IfTracker {
    iftable: IfTable,
}

#[allow(clippy::new_without_default)]
impl IfTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            iftable: IfTable::new(),
        }
    }
    #[must_use]
    pub fn iftable(&self) -> &IfTable {
        &self.iftable
    }
    #[must_use]
    pub fn get(&self, ifname: &str) -> Option<&Interface> {
        self.iftable.get(ifname)
    }

    /// Snapshot the usability of some interfaces
    fn usability(&self, names: &[String]) -> Vec<(String, bool)> {
        names
            .iter()
            .map(|n| (n.clone(), self.iftable.get(n).is_some_and(Interface::is_usable)))
            .collect()
    }

    /// Report the interfaces whose usability differs from a previous snapshot
    fn usability_changes(&self, before: Vec<(String, bool)>) -> Vec<IfChange> {
        before
            .into_iter()
            .filter_map(|(name, was)| {
                let iface = self.iftable.get(&name)?;
                let now = iface.is_usable();
                (now != was).then(|| {
                    debug!("Interface {name} is now {}", if now { "usable" } else { "unusable" });
                    IfChange::new(iface, IfChangeKind::Usable(now))
                })
            })
            .collect()
    }

    /// The interface and, for LAG members, the LAG
    fn affected(&self, ifname: &str) -> Vec<String> {
        let mut names = vec![ifname.to_owned()];
        if let Some(lag) = self.iftable.get(ifname).and_then(|i| i.lag.clone()) {
            names.push(lag);
        }
        names
    }

    /// Recompute the oper state of a LAG: it is up if any member is up
    fn refresh_lag(&mut self, lag: &str) {
        let up = self.iftable.lag_members(lag).any(Interface::is_up);
        if let Ok(iface) = self.iftable.get_mut(lag)
            && iface.kind == IfKind::Lag
        {
            iface.oper_state = IfState::from(up);
        }
    }

    fn refresh_lag_of(&mut self, ifname: &str) {
        let lag = self.iftable.get(ifname).and_then(|i| i.lag.clone());
        if let Some(lag) = lag {
            self.refresh_lag(&lag);
        }
    }

    /// Add an interface. The interface joins its VRF.
    pub fn add_interface(&mut self, iface: Interface) -> Result<Vec<IfChange>, RouterError> {
        let ifname = iface.name.clone();
        let lag = iface.lag.clone();
        let before = lag.iter().cloned().collect::<Vec<_>>();
        let before = self.usability(&before);
        info!("Adding interface {ifname} ({}) to vrf {}", iface.kind, iface.vrfid);
        self.iftable.add_interface(iface)?;
        if self
            .iftable
            .get(&ifname)
            .is_some_and(|i| i.kind == IfKind::Lag)
        {
            self.refresh_lag(&ifname);
        }
        self.refresh_lag_of(&ifname);
        let mut changes = vec![];
        if let Some(iface) = self.iftable.get(&ifname) {
            changes.push(IfChange::new(iface, IfChangeKind::Attached));
        }
        changes.extend(self.usability_changes(before));
        Ok(changes)
    }

    /// Remove an interface. The interface leaves its VRF.
    pub fn del_interface(&mut self, ifname: &str) -> Result<(Interface, Vec<IfChange>), RouterError> {
        let lag = self.iftable.get(ifname).and_then(|i| i.lag.clone());
        let before = self.usability(&lag.iter().cloned().collect::<Vec<_>>());
        let iface = self.iftable.del_interface(ifname)?;
        info!("Removed interface {ifname} from vrf {}", iface.vrfid);
        if let Some(lag) = &lag {
            self.refresh_lag(lag);
        }
        let mut changes = vec![IfChange::new(&iface, IfChangeKind::Detached)];
        changes.extend(self.usability_changes(before));
        Ok((iface, changes))
    }

    pub fn on_admin_state_change(&mut self, ifname: &str, up: bool) -> Result<Vec<IfChange>, RouterError> {
        let before = self.usability(&self.affected(ifname));
        let iface = self.iftable.get_mut(ifname)?;
        iface.admin_state = IfState::from(up);
        if iface.kind == IfKind::Loopback {
            iface.oper_state = IfState::from(up);
        }
        debug!("Interface {ifname} admin state is {}", iface.admin_state);
        self.refresh_lag_of(ifname);
        Ok(self.usability_changes(before))
    }

    /// Change the oper state of an interface. The oper state of LAGs is derived from
    /// their members and cannot be set.
    pub fn on_oper_state_change(&mut self, ifname: &str, up: bool) -> Result<Vec<IfChange>, RouterError> {
        let before = self.usability(&self.affected(ifname));
        let iface = self.iftable.get_mut(ifname)?;
        if iface.kind == IfKind::Lag {
            debug!("Ignoring oper state change on LAG {ifname}");
            return Ok(vec![]);
        }
        iface.oper_state = IfState::from(up);
        debug!("Interface {ifname} oper state is {}", iface.oper_state);
        self.refresh_lag_of(ifname);
        Ok(self.usability_changes(before))
    }

    /// Switch an interface between routing and bridging
    pub fn on_routing_enabled_change(
        &mut self,
        ifname: &str,
        routing: bool,
    ) -> Result<Vec<IfChange>, RouterError> {
        let before = self.usability(&[ifname.to_owned()]);
        let iface = self.iftable.get_mut(ifname)?;
        let mode = IfMode::from(routing);
        if iface.mode == mode {
            return Ok(vec![]);
        }
        iface.mode = mode;
        info!("Interface {ifname} set to {mode}");
        let mut changes = vec![];
        if mode == IfMode::Bridging {
            changes.push(IfChange::new(iface, IfChangeKind::RoutingDisabled));
        }
        changes.extend(self.usability_changes(before));
        Ok(changes)
    }

    pub fn add_address(&mut self, ifname: &str, address: IpNet) -> Result<Vec<IfChange>, RouterError> {
        let iface = self.iftable.get_mut(ifname)?;
        if !iface.addresses.insert(address) {
            return Ok(vec![]);
        }
        debug!("Added address {address} to interface {ifname}");
        Ok(vec![IfChange::new(iface, IfChangeKind::AddressAdded(address))])
    }

    pub fn del_address(&mut self, ifname: &str, address: IpNet) -> Result<Vec<IfChange>, RouterError> {
        let iface = self.iftable.get_mut(ifname)?;
        if !iface.addresses.remove(&address) {
            return Ok(vec![]);
        }
        debug!("Removed address {address} from interface {ifname}");
        Ok(vec![IfChange::new(iface, IfChangeKind::AddressRemoved(address))])
    }

    /// Move an interface to another VRF
    pub fn attach(&mut self, ifname: &str, vrfid: VrfId) -> Result<Vec<IfChange>, RouterError> {
        let iface = self.iftable.get_mut(ifname)?;
        if iface.vrfid == vrfid {
            return Ok(vec![]);
        }
        let detached = IfChange::new(iface, IfChangeKind::Detached);
        info!("Moving interface {ifname} from vrf {} to vrf {vrfid}", iface.vrfid);
        iface.vrfid = vrfid;
        Ok(vec![detached, IfChange::new(iface, IfChangeKind::Attached)])
    }

    /// The interfaces attached to a VRF
    pub fn vrf_interfaces(&self, vrfid: VrfId) -> impl Iterator<Item = &Interface> {
        self.iftable.values().filter(move |i| i.vrfid == vrfid)
    }

    /// Get a resolver for the next-hops of a VRF
    #[must_use]
    pub fn resolver(&self, vrfid: VrfId) -> VrfResolver<'_> {
        VrfResolver {
            iftable: &self.iftable,
            vrfid,
        }
    }

    /// Tell if a next-hop is resolvable in a VRF
    #[must_use]
    pub fn is_resolvable(&self, vrfid: VrfId, nhop: &NextHop) -> bool {
        nhop.resolvable_via(&self.resolver(vrfid)).is_some()
    }

    /// The IPv4 addresses of the usable interfaces of a VRF
    #[must_use]
    pub fn router_id_candidates(&self, vrfid: VrfId) -> Vec<RidCandidate> {
        self.vrf_interfaces(vrfid)
            .filter(|i| i.is_usable())
            .flat_map(|i| {
                i.ipv4_addresses().map(move |address| RidCandidate {
                    ifname: i.name.clone(),
                    address,
                    loopback: i.is_loopback(),
                })
            })
            .collect()
    }
}

/// Resolves next-hops over the usable interfaces of a VRF
pub struct VrfResolver<'a> {
    iftable: &'a IfTable,
    vrfid: VrfId,
}

impl VrfResolver<'_> {
    fn usable(&self, ifname: &str) -> Option<&Interface> {
        self.iftable
            .get(ifname)
            .filter(|i| i.vrfid == self.vrfid && i.is_usable())
    }
}

impl NhResolver for VrfResolver<'_> {
    fn resolve_interface(&self, ifname: &str) -> Option<Egress> {
        self.usable(ifname)
            .map(|i| Egress::new(&i.name, i.ifindex))
    }

    fn resolve_gateway(&self, address: &IpAddr, ifname: Option<&str>) -> Option<Egress> {
        match ifname {
            Some(ifname) => self
                .usable(ifname)
                .filter(|i| i.subnet_match(address).is_some())
                .map(|i| Egress::new(&i.name, i.ifindex)),
            None => self
                .iftable
                .values()
                .filter(|i| i.vrfid == self.vrfid && i.is_usable())
                .filter_map(|i| i.subnet_match(address).map(|len| (len, i)))
                .min_by(|(l1, i1), (l2, i2)| (Reverse(*l1), &i1.name).cmp(&(Reverse(*l2), &i2.name)))
                .map(|(_, i)| Egress::new(&i.name, i.ifindex)),
        }
    }
}
