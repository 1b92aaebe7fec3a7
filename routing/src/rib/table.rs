// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The RIB table of a VRF for one address family, and best-path selection

use crate::prefix::{AddressFamily, Prefix};
use crate::rib::nexthop::NhResolver;
use crate::rib::route::{FibNextHop, FibRoute, RibDelta, RouteEntry, RouteOrigin};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Limits on the number of next-hops installed for a prefix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// Cap on ECMP next-hops for every prefix
    pub max_paths: Option<u16>,
    /// Cap on ECMP next-hops when BGP wins
    pub bgp_max_paths: Option<u16>,
}
impl SelectionPolicy {
    fn cap(&self, origin: RouteOrigin) -> Option<usize> {
        let bgp = if origin == RouteOrigin::Bgp {
            self.bgp_max_paths
        } else {
            None
        };
        let cap = match (self.max_paths, bgp) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        cap.map(usize::from)
    }
}

/// The candidates for a prefix and the route currently selected among them
#[derive(Debug, Default, Clone)]
pub struct RouteSet {
    entries: BTreeMap<(RouteOrigin, u32), RouteEntry>,
    installed: Option<FibRoute>,
}

impl RouteSet {
    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }
    #[must_use]
    pub fn installed(&self) -> Option<&FibRoute> {
        self.installed.as_ref()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Number of next-hops across all candidates
    #[must_use]
    pub fn num_nexthops(&self) -> usize {
        self.entries.values().map(|e| e.next_hops.len()).sum()
    }

    /// Run best-path selection
    fn select<R: NhResolver + ?Sized>(
        &mut self,
        prefix: Prefix,
        resolver: &R,
        policy: &SelectionPolicy,
    ) -> RibDelta {
        for entry in self.entries.values_mut() {
            entry.selected = false;
            for nhop in &mut entry.next_hops {
                nhop.refresh(resolver);
            }
        }
        let best = self
            .entries
            .values()
            .filter(|e| e.is_eligible())
            .map(|e| (e.distance, e.origin))
            .min();

        let new = best.map(|(distance, origin)| {
            let mut candidates: Vec<(u32, FibNextHop)> = vec![];
            for entry in self
                .entries
                .values_mut()
                .filter(|e| e.is_eligible() && e.distance == distance && e.origin == origin)
            {
                entry.selected = true;
                candidates.extend(entry.next_hops.iter().filter(|nh| nh.selected).filter_map(
                    |nh| {
                        nh.resolved.as_ref().map(|egress| {
                            let fibnh = FibNextHop {
                                gateway: nh.kind.gateway(),
                                ifname: egress.ifname.clone(),
                                ifindex: egress.ifindex,
                            };
                            (entry.metric, fibnh)
                        })
                    },
                ));
            }
            candidates.sort();
            let mut seen = BTreeSet::new();
            candidates.retain(|(_, nh)| seen.insert(nh.clone()));
            if let Some(cap) = policy.cap(origin) {
                candidates.truncate(cap);
            }
            // the metric of the route is the one of the best next-hop it keeps
            let metric = candidates.first().map_or(u32::MAX, |(metric, _)| *metric);
            FibRoute {
                prefix,
                origin,
                distance,
                metric,
                nhops: candidates.into_iter().map(|(_, nh)| nh).collect(),
            }
        });
        let old = self.installed.take();
        self.installed.clone_from(&new);
        RibDelta::transition(prefix, old, new)
    }
}

/// The RIB table of one address family
#[derive(Debug, Clone)]
pub struct RibTable {
    afi: AddressFamily,
    routes: BTreeMap<Prefix, RouteSet>,
}

impl RibTable {
    #[must_use]
    pub fn new(afi: AddressFamily) -> Self {
        Self {
            afi,
            routes: BTreeMap::new(),
        }
    }
    #[must_use]
    pub fn afi(&self) -> AddressFamily {
        self.afi
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
    #[must_use]
    pub fn get(&self, prefix: &Prefix) -> Option<&RouteSet> {
        self.routes.get(prefix)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&Prefix, &RouteSet)> {
        self.routes.iter()
    }
    /// Number of candidate entries in the table
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.routes.values().map(|set| set.entries.len()).sum()
    }

    /// Add an entry or update the entry with the same origin and instance, then re-run selection
    pub fn insert_or_update<R: NhResolver + ?Sized>(
        &mut self,
        entry: RouteEntry,
        resolver: &R,
        policy: &SelectionPolicy,
    ) -> RibDelta {
        let prefix = entry.prefix;
        debug!(
            "Inserting {} route for {prefix} instance {} distance {}",
            entry.origin, entry.instance, entry.distance
        );
        let set = self.routes.entry(prefix).or_default();
        set.entries.insert(entry.key(), entry);
        set.select(prefix, resolver, policy)
    }

    fn remove_where<R, F>(
        &mut self,
        prefix: Prefix,
        resolver: &R,
        policy: &SelectionPolicy,
        mut pred: F,
    ) -> RibDelta
    where
        R: NhResolver + ?Sized,
        F: FnMut(&(RouteOrigin, u32)) -> bool,
    {
        let Some(set) = self.routes.get_mut(&prefix) else {
            return RibDelta::Unchanged(prefix);
        };
        let before = set.entries.len();
        set.entries.retain(|key, _| !pred(key));
        if set.entries.len() == before {
            return RibDelta::Unchanged(prefix);
        }
        if set.entries.is_empty() {
            let old = set.installed.take();
            self.routes.remove(&prefix);
            return RibDelta::transition(prefix, old, None);
        }
        set.select(prefix, resolver, policy)
    }

    /// Remove every entry of a protocol for a prefix
    pub fn withdraw<R: NhResolver + ?Sized>(
        &mut self,
        prefix: Prefix,
        origin: RouteOrigin,
        resolver: &R,
        policy: &SelectionPolicy,
    ) -> RibDelta {
        debug!("Withdrawing {origin} routes for {prefix}");
        self.remove_where(prefix, resolver, policy, |(o, _)| *o == origin)
    }

    /// Remove a single entry of a protocol for a prefix
    pub fn withdraw_instance<R: NhResolver + ?Sized>(
        &mut self,
        prefix: Prefix,
        origin: RouteOrigin,
        instance: u32,
        resolver: &R,
        policy: &SelectionPolicy,
    ) -> RibDelta {
        debug!("Withdrawing {origin} route for {prefix} instance {instance}");
        self.remove_where(prefix, resolver, policy, |key| *key == (origin, instance))
    }

    /// Swap all the entries of a protocol for a prefix with the given ones, in a single selection
    pub fn replace_origin<R: NhResolver + ?Sized>(
        &mut self,
        prefix: Prefix,
        origin: RouteOrigin,
        entries: Vec<RouteEntry>,
        resolver: &R,
        policy: &SelectionPolicy,
    ) -> RibDelta {
        let entries: Vec<RouteEntry> = entries
            .into_iter()
            .filter(|e| e.origin == origin && e.prefix == prefix)
            .collect();
        if entries.is_empty() {
            return self.withdraw(prefix, origin, resolver, policy);
        }
        let set = self.routes.entry(prefix).or_default();
        set.entries.retain(|(o, _), _| *o != origin);
        for entry in entries {
            set.entries.insert(entry.key(), entry);
        }
        set.select(prefix, resolver, policy)
    }

    /// Re-run selection on every prefix after next-hop resolvability may have changed.
    /// Only the deltas that change the forwarding state are returned.
    pub fn on_nexthop_resolvability_changed<R: NhResolver + ?Sized>(
        &mut self,
        resolver: &R,
        policy: &SelectionPolicy,
    ) -> Vec<RibDelta> {
        self.routes
            .iter_mut()
            .map(|(prefix, set)| set.select(*prefix, resolver, policy))
            .filter(|delta| !delta.is_unchanged())
            .collect()
    }

    /// Remove all routes, returning the deltas to remove the installed ones
    pub fn purge(&mut self) -> Vec<RibDelta> {
        std::mem::take(&mut self.routes)
            .into_iter()
            .filter_map(|(_, set)| set.installed.map(RibDelta::Remove))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::nexthop::NextHop;
    use crate::rib::nexthop::tests::FakeResolver;
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};

    fn resolver() -> FakeResolver {
        FakeResolver::default()
            .with("1", 1, "1.1.1.1/24")
            .with("2", 2, "")
            .with("3", 3, "")
            .with("5", 5, "5.5.5.5/24")
    }
    fn prefix() -> Prefix {
        "123.0.0.1/32".parse().unwrap()
    }
    fn gw(a: &str) -> NextHop {
        NextHop::gateway(a.parse().unwrap())
    }
    fn static_entry(distance: u8) -> RouteEntry {
        RouteEntry::new(0, prefix(), RouteOrigin::Static)
            .with_distance(distance)
            .with_instance(u32::from(distance))
    }

    #[test]
    fn test_ecmp_static_route() {
        let mut rib = RibTable::new(AddressFamily::Ipv4);
        let policy = SelectionPolicy::default();
        let resolver = resolver();
        let entry = static_entry(1)
            .with_nexthop(gw("1.1.1.2"))
            .with_nexthop(NextHop::interface("2"))
            .with_nexthop(NextHop::interface("3"))
            .with_nexthop(gw("5.5.5.1"));
        let RibDelta::Add(route) = rib.insert_or_update(entry.clone(), &resolver, &policy) else {
            panic!("Expected an Add delta");
        };
        assert_eq!(route.num_nhops(), 4);
        assert_eq!(route.origin, RouteOrigin::Static);
        assert_eq!(route.distance, 1);
        assert_eq!(route.metric, 0);

        // same entry again: nothing changes
        assert!(rib.insert_or_update(entry, &resolver, &policy).is_unchanged());

        // drop 5.5.5.1
        let entry = static_entry(1)
            .with_nexthop(gw("1.1.1.2"))
            .with_nexthop(NextHop::interface("2"))
            .with_nexthop(NextHop::interface("3"));
        let RibDelta::Replace { old, new } =
            rib.replace_origin(prefix(), RouteOrigin::Static, vec![entry], &resolver, &policy)
        else {
            panic!("Expected a Replace delta");
        };
        assert_eq!(old.num_nhops(), 4);
        assert_eq!(new.num_nhops(), 3);
        assert!(
            new.nhops
                .iter()
                .all(|nh| nh.gateway != Some(IpAddr::V4(Ipv4Addr::new(5, 5, 5, 1))))
        );
        assert_eq!(rib.num_entries(), 1);
    }

    #[test]
    fn test_withdraw_promotes_next_candidate() {
        let mut rib = RibTable::new(AddressFamily::Ipv4);
        let policy = SelectionPolicy::default();
        let resolver = resolver();
        rib.insert_or_update(static_entry(10).with_nexthop(gw("1.1.1.2")), &resolver, &policy);
        let bgp = RouteEntry::new(0, prefix(), RouteOrigin::Bgp)
            .with_distance(6)
            .with_nexthop(gw("5.5.5.1"));
        let delta = rib.insert_or_update(bgp, &resolver, &policy);
        assert_eq!(delta.desired().map(|r| (r.origin, r.distance)), Some((RouteOrigin::Bgp, 6)));

        let delta = rib.withdraw(prefix(), RouteOrigin::Bgp, &resolver, &policy);
        let RibDelta::Replace { old, new } = delta else {
            panic!("Expected a Replace delta, got {delta}");
        };
        assert_eq!(old.origin, RouteOrigin::Bgp);
        assert_eq!((new.origin, new.distance), (RouteOrigin::Static, 10));

        // withdrawing what is not there changes nothing
        assert!(rib.withdraw(prefix(), RouteOrigin::Ospf, &resolver, &policy).is_unchanged());

        let delta = rib.withdraw_instance(prefix(), RouteOrigin::Static, 10, &resolver, &policy);
        assert!(matches!(delta, RibDelta::Remove(_)));
        assert!(rib.is_empty());
    }

    #[test]
    fn test_cross_protocol_tie() {
        let mut rib = RibTable::new(AddressFamily::Ipv4);
        let policy = SelectionPolicy::default();
        let resolver = resolver();
        let ospf = RouteEntry::new(0, prefix(), RouteOrigin::Ospf)
            .with_distance(5)
            .with_nexthop(gw("5.5.5.1"));
        let stat = static_entry(5).with_nexthop(gw("1.1.1.2"));
        rib.insert_or_update(ospf, &resolver, &policy);
        let delta = rib.insert_or_update(stat, &resolver, &policy);
        let installed = delta.desired().unwrap();
        assert_eq!(installed.origin, RouteOrigin::Static);
        assert_eq!(installed.num_nhops(), 1);
        let set = rib.get(&prefix()).unwrap();
        assert_eq!(set.entries().filter(|e| e.selected).count(), 1);
    }

    #[test]
    fn test_unresolvable_entry_kept_and_reinstated() {
        let mut rib = RibTable::new(AddressFamily::Ipv4);
        let policy = SelectionPolicy::default();
        let entry = static_entry(1).with_nexthop(NextHop::interface("2"));
        rib.insert_or_update(entry, &resolver(), &policy);

        let down = resolver().without("2");
        let deltas = rib.on_nexthop_resolvability_changed(&down, &policy);
        assert_eq!(deltas.len(), 1);
        assert!(matches!(deltas[0], RibDelta::Remove(_)));
        assert_eq!(rib.len(), 1);
        assert!(rib.get(&prefix()).unwrap().installed().is_none());

        let deltas = rib.on_nexthop_resolvability_changed(&resolver(), &policy);
        assert!(matches!(deltas[0], RibDelta::Add(_)));
        assert!(rib.on_nexthop_resolvability_changed(&resolver(), &policy).is_empty());
    }

    #[test]
    fn test_max_paths() {
        let mut rib = RibTable::new(AddressFamily::Ipv4);
        let resolver = resolver();
        let policy = SelectionPolicy {
            max_paths: Some(3),
            bgp_max_paths: Some(2),
        };
        let bgp = RouteEntry::new(0, prefix(), RouteOrigin::Bgp)
            .with_nexthop(gw("1.1.1.2"))
            .with_nexthop(gw("1.1.1.3"))
            .with_nexthop(gw("5.5.5.1"))
            .with_nexthop(gw("5.5.5.2"));
        let delta = rib.insert_or_update(bgp, &resolver, &policy);
        assert_eq!(delta.desired().unwrap().num_nhops(), 2);

        let stat = static_entry(1)
            .with_nexthop(gw("1.1.1.2"))
            .with_nexthop(gw("1.1.1.3"))
            .with_nexthop(gw("5.5.5.1"))
            .with_nexthop(gw("5.5.5.2"));
        let delta = rib.insert_or_update(stat, &resolver, &policy);
        assert_eq!(delta.desired().unwrap().num_nhops(), 3);
        assert_eq!(rib.purge().len(), 1);
    }

    #[test]
    fn test_metric_of_kept_nexthops() {
        let mut rib = RibTable::new(AddressFamily::Ipv4);
        let resolver = resolver();
        let policy = SelectionPolicy {
            max_paths: Some(1),
            bgp_max_paths: None,
        };
        let near = RouteEntry::new(0, prefix(), RouteOrigin::Ospf)
            .with_instance(1)
            .with_metric(20)
            .with_nexthop(gw("5.5.5.1"));
        let far = RouteEntry::new(0, prefix(), RouteOrigin::Ospf)
            .with_instance(2)
            .with_metric(10)
            .with_nexthop(NextHop::interface("9"));
        rib.insert_or_update(near, &resolver, &policy);
        rib.insert_or_update(far, &resolver, &policy);
        let installed = rib.get(&prefix()).unwrap().installed().unwrap();
        assert_eq!(installed.num_nhops(), 1);
        // the unresolvable entry does not lend its metric
        assert_eq!(installed.metric, 20);

        let other = RouteEntry::new(0, prefix(), RouteOrigin::Ospf)
            .with_instance(3)
            .with_metric(5)
            .with_nexthop(gw("1.1.1.2"));
        let delta = rib.insert_or_update(other, &resolver, &policy);
        let installed = delta.desired().unwrap();
        assert_eq!(installed.metric, 5);
        assert_eq!(installed.nhops[0].gateway, Some(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 2))));
    }

    #[test]
    fn test_replace_origin_drops_empty_sets() {
        let mut rib = RibTable::new(AddressFamily::Ipv4);
        let policy = SelectionPolicy::default();
        let resolver = resolver();
        let stray = RouteEntry::new(0, "10.0.0.0/8".parse().unwrap(), RouteOrigin::Static)
            .with_nexthop(gw("1.1.1.2"));
        let delta = rib.replace_origin(prefix(), RouteOrigin::Static, vec![stray], &resolver, &policy);
        assert!(delta.is_unchanged());
        assert!(rib.is_empty());

        rib.insert_or_update(static_entry(1).with_nexthop(gw("1.1.1.2")), &resolver, &policy);
        let ospf = RouteEntry::new(0, prefix(), RouteOrigin::Ospf).with_nexthop(gw("5.5.5.1"));
        let delta = rib.replace_origin(prefix(), RouteOrigin::Static, vec![ospf], &resolver, &policy);
        assert!(matches!(delta, RibDelta::Remove(_)));
        assert!(rib.is_empty());
    }

    /// Candidates for a prefix: (distance, origin selector, instance, next-hop selectors)
    type Candidates = Vec<(u8, u8, u8, Vec<u8>)>;

    const NHOPS: [&str; 6] = ["1.1.1.2", "1.1.1.3", "5.5.5.1", "9.9.9.9", "i2", "i7"];

    fn build(input: &Candidates) -> Vec<RouteEntry> {
        input
            .iter()
            .map(|(distance, origin, instance, nhops)| {
                let origin = match origin % 4 {
                    0 => RouteOrigin::Connected,
                    1 => RouteOrigin::Static,
                    2 => RouteOrigin::Ospf,
                    _ => RouteOrigin::Bgp,
                };
                let mut entry = RouteEntry::new(0, prefix(), origin)
                    .with_distance(distance % 8)
                    .with_instance(u32::from(instance % 3));
                for n in nhops {
                    let nh = NHOPS[usize::from(*n) % NHOPS.len()];
                    entry.add_nexthop(match nh.strip_prefix('i') {
                        Some(ifname) => NextHop::interface(ifname),
                        None => gw(nh),
                    });
                }
                entry
            })
            .collect()
    }

    #[test]
    fn test_selection_properties() {
        bolero::check!()
            .with_type::<Candidates>()
            .for_each(|input: &Candidates| {
                let resolver = resolver();
                let policy = SelectionPolicy::default();
                let mut rib = RibTable::new(AddressFamily::Ipv4);
                for entry in build(input) {
                    rib.insert_or_update(entry, &resolver, &policy);
                }
                let Some(set) = rib.get(&prefix()) else {
                    return;
                };
                let eligible: Vec<&RouteEntry> = set.entries().filter(|e| e.is_eligible()).collect();
                let Some(installed) = set.installed() else {
                    assert!(eligible.is_empty());
                    return;
                };
                // single winner per distance tier
                let min = eligible.iter().map(|e| e.distance).min().unwrap();
                assert_eq!(installed.distance, min);

                // ECMP merge: installed next-hops are the union of the winners' resolvable ones
                let mut union = BTreeSet::new();
                for e in eligible
                    .iter()
                    .filter(|e| e.distance == installed.distance && e.origin == installed.origin)
                {
                    assert!(e.selected);
                    for nh in e.next_hops.iter().filter(|nh| nh.selected) {
                        let egress = nh.resolved.as_ref().unwrap();
                        union.insert((nh.kind.gateway(), egress.ifname.clone()));
                    }
                }
                let installed_set: BTreeSet<_> = installed
                    .nhops
                    .iter()
                    .map(|nh| (nh.gateway, nh.ifname.clone()))
                    .collect();
                assert_eq!(installed_set, union);
                assert_eq!(installed.num_nhops(), union.len());
                assert!(set.entries().filter(|e| e.selected).all(|e| e.origin == installed.origin));
            });
    }
}
