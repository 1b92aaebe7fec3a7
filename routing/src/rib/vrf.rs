// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! VRF module to store Ipv4 and Ipv6 routing tables

use config::{BgpRouterConfig, DistanceConfig, StaticRouteConfig};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::errors::RouterError;
use crate::fib::fibtype::{FibReader, FibReaderFactory};
use crate::fib::kernel::{KernelError, KernelRoute, KernelRoutes};
use crate::fib::sync::{FibSync, RetryPolicy, SyncStats};
use crate::prefix::{AddressFamily, Prefix};
use crate::rib::nexthop::{IfIndex, NhKind, NhResolver};
use crate::rib::route::{FibRoute, RibDelta, RouteEntry, RouteOrigin};
use crate::rib::table::{RibTable, SelectionPolicy};
use crate::routerid::RouterIdSelector;
use crate::statics::StaticRoutes;

/// Every VRF is univocally identified with a numerical VRF id
pub type VrfId = u32;

/// What a query on a prefix returns: the candidates in the RIB and the route in the FIB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteView {
    pub rib: Vec<RouteEntry>,
    pub fib: Option<FibRoute>,
}

/// The outcome of a change in a VRF: the deltas produced by selection and the
/// errors met when syncing them to the kernel
#[derive(Debug, Default)]
pub struct SyncReport {
    pub deltas: Vec<RibDelta>,
    pub errors: Vec<RouterError>,
}
impl SyncReport {
    fn merge(&mut self, other: SyncReport) {
        self.deltas.extend(other.deltas);
        self.errors.extend(other.errors);
    }
    /// Tell if the forwarding state changed
    #[must_use]
    pub fn changed(&self) -> bool {
        self.deltas.iter().any(|d| !d.is_unchanged())
    }
}

pub struct Vrf {
    pub name: String,
    pub vrfid: VrfId,
    rib_v4: RibTable,
    rib_v6: RibTable,
    policy: SelectionPolicy,
    distance: DistanceConfig,
    fibsync: Mutex<FibSync>,
    fibrf: FibReaderFactory,
    pub(crate) routerid: RouterIdSelector,
    pub(crate) statics: StaticRoutes,
    pub(crate) bgp: Option<BgpRouterConfig>,
}

impl Vrf {
    /// Create a VRF whose routes are synced to the given kernel
    #[must_use]
    pub fn new(name: &str, vrfid: VrfId, kernel: Box<dyn KernelRoutes>, retry: RetryPolicy) -> Self {
        let fibsync = FibSync::new(vrfid, kernel, retry);
        let fibrf = fibsync.reader_factory();
        debug!("Created VRF {name} with id {vrfid} in netns {}", fibsync.netns());
        Self {
            name: name.to_owned(),
            vrfid,
            rib_v4: RibTable::new(AddressFamily::Ipv4),
            rib_v6: RibTable::new(AddressFamily::Ipv6),
            policy: SelectionPolicy::default(),
            distance: DistanceConfig::default(),
            fibsync: Mutex::new(fibsync),
            fibrf,
            routerid: RouterIdSelector::new(),
            statics: StaticRoutes::new(),
            bgp: None,
        }
    }

    fn fibsync_mut(&mut self) -> &mut FibSync {
        self.fibsync.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
    fn fibsync(&self) -> MutexGuard<'_, FibSync> {
        self.fibsync.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn rib(&self, afi: AddressFamily) -> &RibTable {
        match afi {
            AddressFamily::Ipv4 => &self.rib_v4,
            AddressFamily::Ipv6 => &self.rib_v6,
        }
    }
    fn rib_mut(&mut self, afi: AddressFamily) -> &mut RibTable {
        match afi {
            AddressFamily::Ipv4 => &mut self.rib_v4,
            AddressFamily::Ipv6 => &mut self.rib_v6,
        }
    }

    #[must_use]
    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }
    pub fn set_max_paths(&mut self, max_paths: Option<u16>) {
        self.policy.max_paths = max_paths;
    }
    pub fn set_distance(&mut self, distance: DistanceConfig) {
        self.distance = distance;
    }
    #[must_use]
    pub fn bgp(&self) -> Option<&BgpRouterConfig> {
        self.bgp.as_ref()
    }
    pub fn set_bgp(&mut self, bgp: Option<BgpRouterConfig>) {
        self.policy.bgp_max_paths = bgp.as_ref().map(|b| b.maximum_paths);
        self.bgp = bgp;
    }
    #[must_use]
    pub fn router_id(&self) -> &RouterIdSelector {
        &self.routerid
    }
    #[must_use]
    pub fn statics(&self) -> &StaticRoutes {
        &self.statics
    }
    #[must_use]
    pub fn netns(&self) -> String {
        self.fibsync().netns().to_owned()
    }

    /// Sync deltas to the kernel and the FIB
    fn sync(&mut self, deltas: Vec<RibDelta>) -> SyncReport {
        let fibsync = self.fibsync_mut();
        let mut report = SyncReport::default();
        for delta in deltas {
            if let Err(e) = fibsync.apply(&delta) {
                report.errors.push(e);
            }
            report.deltas.push(delta);
        }
        report
    }

    /// Add or update a candidate route. Configured distances override the ones of OSPF and BGP:
    /// the distance overrides first, then the eBGP or iBGP distance of the BGP instance.
    pub fn announce<R: NhResolver + ?Sized>(
        &mut self,
        mut entry: RouteEntry,
        resolver: &R,
    ) -> Result<SyncReport, RouterError> {
        if entry.vrf_id != self.vrfid {
            return Err(RouterError::VrfMismatch(entry.prefix, self.vrfid));
        }
        let configured = match entry.origin {
            RouteOrigin::Ospf => self.distance.ospf,
            RouteOrigin::Bgp => self
                .distance
                .bgp
                .or_else(|| self.bgp.as_ref().map(|bgp| bgp.distance(entry.ibgp))),
            RouteOrigin::Connected | RouteOrigin::Static => None,
        };
        if let Some(distance) = configured {
            entry.distance = distance;
        }
        let policy = self.policy;
        let delta = self
            .rib_mut(entry.prefix.afi())
            .insert_or_update(entry, resolver, &policy);
        Ok(self.sync(vec![delta]))
    }

    /// Remove all the candidates of a protocol for a prefix
    pub fn withdraw<R: NhResolver + ?Sized>(
        &mut self,
        prefix: Prefix,
        origin: RouteOrigin,
        resolver: &R,
    ) -> SyncReport {
        let policy = self.policy;
        let delta = self
            .rib_mut(prefix.afi())
            .withdraw(prefix, origin, resolver, &policy);
        self.sync(vec![delta])
    }

    /// Remove one candidate of a protocol for a prefix
    pub fn withdraw_instance<R: NhResolver + ?Sized>(
        &mut self,
        prefix: Prefix,
        origin: RouteOrigin,
        instance: u32,
        resolver: &R,
    ) -> SyncReport {
        let policy = self.policy;
        let delta = self
            .rib_mut(prefix.afi())
            .withdraw_instance(prefix, origin, instance, resolver, &policy);
        self.sync(vec![delta])
    }

    /// Remove the connected routes contributed by an interface
    pub fn withdraw_connected<R: NhResolver + ?Sized>(&mut self, ifindex: IfIndex, resolver: &R) -> SyncReport {
        let prefixes: Vec<Prefix> = self
            .rib_v4
            .iter()
            .chain(self.rib_v6.iter())
            .filter(|(_, set)| {
                set.entries()
                    .any(|e| e.origin == RouteOrigin::Connected && e.instance == ifindex)
            })
            .map(|(prefix, _)| *prefix)
            .collect();
        let mut report = SyncReport::default();
        for prefix in prefixes {
            report.merge(self.withdraw_instance(prefix, RouteOrigin::Connected, ifindex, resolver));
        }
        report
    }

    /// Re-run selection on all prefixes, after interface state or the selection policy changed
    pub fn refresh<R: NhResolver + ?Sized>(&mut self, resolver: &R) -> SyncReport {
        let policy = self.policy;
        let mut deltas = self.rib_v4.on_nexthop_resolvability_changed(resolver, &policy);
        deltas.extend(self.rib_v6.on_nexthop_resolvability_changed(resolver, &policy));
        if !deltas.is_empty() {
            debug!("Vrf {}: {} prefixes changed", self.name, deltas.len());
        }
        self.sync(deltas)
    }

    /// Re-derive the static entries of a prefix from the static configuration
    fn refresh_static<R: NhResolver + ?Sized>(&mut self, prefix: Prefix, resolver: &R) -> SyncReport {
        let entries = self.statics.entries(self.vrfid, &prefix);
        let policy = self.policy;
        let delta = self.rib_mut(prefix.afi()).replace_origin(
            prefix,
            RouteOrigin::Static,
            entries,
            resolver,
            &policy,
        );
        self.sync(vec![delta])
    }

    pub fn add_static_route<R: NhResolver + ?Sized>(
        &mut self,
        config: &StaticRouteConfig,
        resolver: &R,
    ) -> SyncReport {
        info!("Vrf {}: adding static route {config}", self.name);
        let prefix = self.statics.add(config);
        self.refresh_static(prefix, resolver)
    }

    pub fn del_static_route<R: NhResolver + ?Sized>(
        &mut self,
        config: &StaticRouteConfig,
        resolver: &R,
    ) -> Result<SyncReport, RouterError> {
        info!("Vrf {}: removing static route {config}", self.name);
        let prefix = self.statics.del(config)?;
        Ok(self.refresh_static(prefix, resolver))
    }

    /// Drop the static next-hops bound to an interface that stopped routing. Gateways are
    /// bound when the RIB last resolved them over that interface, so this must run before
    /// selection sees the new interface state.
    pub fn purge_static_interface<R: NhResolver + ?Sized>(&mut self, ifname: &str, resolver: &R) -> SyncReport {
        let resolved: BTreeSet<(Prefix, NhKind)> = self
            .rib_v4
            .iter()
            .chain(self.rib_v6.iter())
            .flat_map(|(prefix, set)| {
                set.entries()
                    .filter(|e| e.origin == RouteOrigin::Static)
                    .flat_map(|e| e.next_hops.iter())
                    .filter(move |nh| nh.is_bound_to(ifname))
                    .map(move |nh| (*prefix, nh.kind.clone()))
            })
            .collect();
        let mut report = SyncReport::default();
        for prefix in self.statics.purge_interface(ifname, &resolved) {
            report.merge(self.refresh_static(prefix, resolver));
        }
        report
    }

    /// Remove all routes, from the RIB and from the kernel
    pub fn purge(&mut self) -> SyncReport {
        warn!("Vrf {}: removing all routes", self.name);
        let mut deltas = self.rib_v4.purge();
        deltas.extend(self.rib_v6.purge());
        self.sync(deltas)
    }

    /// Retry syncing the prefixes that failed to sync. Returns how many are still pending.
    pub fn resync(&mut self) -> usize {
        self.fibsync_mut().resync()
    }

    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.fibsync().num_pending()
    }
    #[must_use]
    pub fn pending(&self) -> Vec<(Prefix, Option<FibRoute>)> {
        self.fibsync()
            .pending()
            .map(|(p, r)| (*p, r.clone()))
            .collect()
    }
    #[must_use]
    pub fn sync_stats(&self) -> SyncStats {
        self.fibsync().stats()
    }
    pub fn kernel_routes(&self) -> Result<Vec<KernelRoute>, KernelError> {
        self.fibsync().dump()
    }

    /// Get a reader of the FIB of this VRF
    #[must_use]
    pub fn fib_reader(&self) -> FibReader {
        self.fibrf.handle()
    }

    /// Look up a prefix in the RIB and in the FIB
    #[must_use]
    pub fn get_route(&self, prefix: &Prefix) -> RouteView {
        let rib = self
            .rib(prefix.afi())
            .get(prefix)
            .map(|set| set.entries().cloned().collect())
            .unwrap_or_default();
        RouteView {
            rib,
            fib: self.fib_reader().get(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::kernel::MemKernel;
    use crate::rib::nexthop::NextHop;
    use crate::rib::nexthop::tests::FakeResolver;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn resolver() -> FakeResolver {
        FakeResolver::default()
            .with("1", 1, "1.1.1.1/24")
            .with("2", 2, "")
            .with("3", 3, "")
            .with("5", 5, "5.5.5.5/24")
    }

    #[test]
    #[traced_test]
    fn test_vrf_distance_override() {
        let kernel = MemKernel::new("red");
        let mut vrf = Vrf::new("red", 1, Box::new(kernel.clone()), RetryPolicy::default());
        vrf.set_distance(DistanceConfig::default().set_bgp(6));
        let prefix: Prefix = "123.0.0.1/32".parse().unwrap();

        let stat: StaticRouteConfig = "123.0.0.1/32 1.1.1.2 10".parse().unwrap();
        vrf.add_static_route(&stat, &resolver());
        let bgp = RouteEntry::new(1, prefix, RouteOrigin::Bgp).with_nexthop(NextHop::gateway("5.5.5.1".parse().unwrap()));
        let report = vrf.announce(bgp, &resolver()).unwrap();
        assert!(report.changed());
        assert!(report.errors.is_empty());

        let view = vrf.get_route(&prefix);
        assert_eq!(view.rib.len(), 2);
        let fib = view.fib.unwrap();
        assert_eq!((fib.origin, fib.distance), (RouteOrigin::Bgp, 6));
        assert_eq!(kernel.get(&prefix).map(|r| r.protocol), Some(RouteOrigin::Bgp));

        let wrong_vrf = RouteEntry::new(0, prefix, RouteOrigin::Bgp);
        assert_eq!(
            vrf.announce(wrong_vrf, &resolver()).unwrap_err(),
            RouterError::VrfMismatch(prefix, 1)
        );

        vrf.withdraw(prefix, RouteOrigin::Bgp, &resolver());
        let fib = vrf.get_route(&prefix).fib.unwrap();
        assert_eq!((fib.origin, fib.distance), (RouteOrigin::Static, 10));

        let report = vrf.purge();
        assert_eq!(report.deltas.len(), 1);
        assert!(kernel.is_empty());
        assert!(vrf.fib_reader().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_vrf_bgp_distances() {
        let kernel = MemKernel::new("red");
        let mut vrf = Vrf::new("red", 1, Box::new(kernel), RetryPolicy::default());
        let prefix: Prefix = "123.0.0.1/32".parse().unwrap();
        let stat: StaticRouteConfig = "123.0.0.1/32 1.1.1.2 100".parse().unwrap();
        vrf.add_static_route(&stat, &resolver());
        let ibgp = || {
            RouteEntry::new(1, prefix, RouteOrigin::Bgp)
                .with_ibgp()
                .with_nexthop(NextHop::gateway("5.5.5.1".parse().unwrap()))
        };

        // iBGP at 200 loses to the static route
        vrf.announce(ibgp(), &resolver()).unwrap();
        let fib = vrf.get_route(&prefix).fib.unwrap();
        assert_eq!(fib.origin, RouteOrigin::Static);
        let rib = vrf.get_route(&prefix).rib;
        assert_eq!(rib.iter().find(|e| e.ibgp).map(|e| e.distance), Some(200));

        vrf.set_bgp(Some(BgpRouterConfig::new(65001).set_distances(30, 90)));
        vrf.announce(ibgp(), &resolver()).unwrap();
        let fib = vrf.get_route(&prefix).fib.unwrap();
        assert_eq!((fib.origin, fib.distance), (RouteOrigin::Bgp, 90));

        let ebgp = RouteEntry::new(1, prefix, RouteOrigin::Bgp)
            .with_distance(7)
            .with_nexthop(NextHop::gateway("5.5.5.2".parse().unwrap()));
        vrf.announce(ebgp, &resolver()).unwrap();
        let fib = vrf.get_route(&prefix).fib.unwrap();
        assert_eq!(fib.distance, 30);

        // the distance overrides win over the BGP instance
        vrf.set_distance(DistanceConfig::default().set_bgp(150));
        vrf.announce(ibgp(), &resolver()).unwrap();
        let fib = vrf.get_route(&prefix).fib.unwrap();
        assert_eq!((fib.origin, fib.distance), (RouteOrigin::Static, 100));
    }

    #[test]
    fn test_vrf_static_purge() {
        let kernel = MemKernel::new("default");
        let mut vrf = Vrf::new("vrf_default", 0, Box::new(kernel.clone()), RetryPolicy::default());
        let prefix: Prefix = "123.0.0.1/32".parse().unwrap();
        for nh in ["1.1.1.2", "2", "3", "5.5.5.1"] {
            let cfg: StaticRouteConfig = format!("123.0.0.1/32 {nh}").parse().unwrap();
            vrf.add_static_route(&cfg, &resolver());
        }
        assert_eq!(vrf.get_route(&prefix).fib.unwrap().num_nhops(), 4);

        let resolver = resolver().without("1");
        vrf.purge_static_interface("1", &resolver);
        let view = vrf.get_route(&prefix);
        assert_eq!(view.fib.unwrap().num_nhops(), 3);
        assert_eq!(view.rib[0].next_hops.len(), 3);
        assert_eq!(vrf.statics().len(), 3);
        assert_eq!(kernel.get(&prefix).unwrap().nexthops.len(), 3);
    }
}
