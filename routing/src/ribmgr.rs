// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The RIB manager: the single path through which routes, interface events and
//! configuration reach the VRFs. Every mutation runs to completion, kernel sync
//! included, before returning. The outcome is then published as a [`Settled`] value.

use derive_builder::Builder;
use ipnet::IpNet;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use config::addr::{check_gateway, check_prefix};
use config::bgp::check_bgp_instance;
use config::interface::check_interface_address;
use config::{
    BgpRouterConfig, ConfigError, DEFAULT_VRF_ID, DEFAULT_VRF_NAME, DistanceConfig, EcmpConfig,
    InterfaceConfig, RouterConfig, StaticRouteConfig, VrfConfig,
};
use tracectl::trace_target;

use crate::connected::{connected_entries, connected_entry};
use crate::display::{ShowFib, ShowRib};
use crate::errors::RouterError;
use crate::event::{EventLog, RibEvent};
use crate::fib::fibtype::FibReader;
use crate::fib::kernel::{KernelFactory, MemKernelFactory};
use crate::fib::sync::RetryPolicy;
use crate::interfaces::interface::Interface;
use crate::interfaces::tracker::{IfChange, IfChangeKind, IfTracker, VrfResolver};
use crate::prefix::{AddressFamily, Prefix};
use crate::rib::nexthop::NhKind;
use crate::rib::route::{RouteEntry, RouteOrigin};
use crate::rib::vrf::{RouteView, SyncReport, Vrf, VrfId};
use crate::rib::vrftable::VrfTable;

trace_target!("ribmgr", LevelFilter::INFO, &["rib"]);

/// Struct to configure the RIB manager. N.B we derive a builder type `RibParamsBuilder`
/// and provide defaults for each field.
#[derive(Builder, Clone)]
pub struct RibParams {
    #[builder(setter(into), default = "ribd".to_string())]
    pub name: String,

    /// How transient kernel errors are retried
    #[builder(default)]
    pub retry: RetryPolicy,

    /// Number of events kept in the event log
    #[builder(default = 256)]
    pub event_log_capacity: usize,

    /// Builds the kernel backend of each VRF
    #[builder(default = Arc::new(MemKernelFactory::new()) as Arc<dyn KernelFactory>)]
    pub kernel: Arc<dyn KernelFactory>,
}

impl Display for RibParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(f, "RIB manager config")?;
        writeln!(f, "  name      : {}", self.name)?;
        writeln!(
            f,
            "  retries   : {} (initial delay {:?})",
            self.retry.attempts, self.retry.initial_delay
        )?;
        writeln!(f, "  event log : {}", self.event_log_capacity)
    }
}

/// Published after every mutation. `pending` counts the prefixes that could not be
/// synced to the kernel yet, across all VRFs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settled {
    pub generation: u64,
    pub pending: usize,
}

/// The RIB manager. Locks are always taken in this order: interface tracker, VRF table, VRF.
pub struct RibManager {
    pub(crate) params: RibParams,
    pub(crate) iftracker: RwLock<IfTracker>,
    pub(crate) vrftable: RwLock<VrfTable>,
    pub(crate) ecmp: RwLock<EcmpConfig>,
    pub(crate) events: Mutex<EventLog<RibEvent>>,
    generation: AtomicU64,
    settled: watch::Sender<Settled>,
}

fn write_vrf(vrf: &Arc<RwLock<Vrf>>) -> Result<RwLockWriteGuard<'_, Vrf>, RouterError> {
    vrf.write()
        .map_err(|_| RouterError::Internal("VRF lock poisoned"))
}
pub(crate) fn read_vrf(vrf: &Arc<RwLock<Vrf>>) -> Result<RwLockReadGuard<'_, Vrf>, RouterError> {
    vrf.read()
        .map_err(|_| RouterError::Internal("VRF lock poisoned"))
}

impl RibManager {
    //////////////////////////////////////////////////////////////////
    /// Create a RIB manager with only the default VRF
    //////////////////////////////////////////////////////////////////
    pub fn new(params: RibParams) -> Result<Self, RouterError> {
        debug!("{}: Initializing with parameters:\n{params}", params.name);
        let (settled, _) = watch::channel(Settled::default());
        let events = EventLog::new(&format!("{} events", params.name), params.event_log_capacity);
        let ribmgr = Self {
            params,
            iftracker: RwLock::new(IfTracker::new()),
            vrftable: RwLock::new(VrfTable::new()),
            ecmp: RwLock::new(EcmpConfig::default()),
            events: Mutex::new(events),
            generation: AtomicU64::new(0),
            settled,
        };
        ribmgr.add_vrf(&VrfConfig::new_default())?;
        Ok(ribmgr)
    }

    //////////////////////////////////////////////////////////////////
    /// Create a RIB manager from a configuration. The configuration is validated first.
    //////////////////////////////////////////////////////////////////
    pub fn from_config(params: RibParams, config: &RouterConfig) -> Result<Self, RouterError> {
        config.validate()?;
        if let Some(tracing) = &config.tracing {
            tracing.apply()?;
        }
        let ribmgr = Self::new(params)?;
        ribmgr.set_ecmp(config.ecmp.clone())?;
        for vrf in &config.vrfs {
            if vrf.name == DEFAULT_VRF_NAME {
                ribmgr.configure_default_vrf(vrf)?;
            } else {
                ribmgr.add_vrf(vrf)?;
            }
        }
        for iface in &config.interfaces {
            ribmgr.add_interface(iface)?;
        }
        info!("{}: configured", ribmgr.params.name);
        Ok(ribmgr)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub(crate) fn tracker(&self) -> Result<RwLockReadGuard<'_, IfTracker>, RouterError> {
        self.iftracker
            .read()
            .map_err(|_| RouterError::Internal("interface tracker lock poisoned"))
    }
    fn tracker_mut(&self) -> Result<RwLockWriteGuard<'_, IfTracker>, RouterError> {
        self.iftracker
            .write()
            .map_err(|_| RouterError::Internal("interface tracker lock poisoned"))
    }
    pub(crate) fn vrftable(&self) -> Result<RwLockReadGuard<'_, VrfTable>, RouterError> {
        self.vrftable
            .read()
            .map_err(|_| RouterError::Internal("VRF table lock poisoned"))
    }
    fn vrftable_mut(&self) -> Result<RwLockWriteGuard<'_, VrfTable>, RouterError> {
        self.vrftable
            .write()
            .map_err(|_| RouterError::Internal("VRF table lock poisoned"))
    }

    pub(crate) fn record(&self, event: RibEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .add(event);
    }

    /// Log and record a configuration that was refused
    fn reject(&self, e: ConfigError) -> RouterError {
        warn!("Rejected configuration: {e}");
        self.record(RibEvent::ConfigRejected(e.to_string()));
        RouterError::InvalidConfig(e)
    }

    /// Record the kernel failures met while applying some changes
    fn account(&self, vrfid: VrfId, report: &SyncReport) {
        for e in &report.errors {
            if let RouterError::KernelSync(prefix, kerr) = e {
                self.record(RibEvent::KernelSyncFailed {
                    vrfid,
                    prefix: *prefix,
                    error: kerr.to_string(),
                });
            } else {
                error!("Vrf {vrfid}: {e}");
            }
        }
    }

    /// Publish the outcome of the last mutation. Must be called with no lock held.
    fn publish(&self) {
        let pending = self.vrftable().map_or(0, |vrftable| {
            vrftable
                .values()
                .filter_map(|vrf| read_vrf(vrf).ok())
                .map(|vrf| vrf.num_pending())
                .sum()
        });
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        if pending > 0 {
            warn!("{}: {pending} prefixes pending kernel sync", self.params.name);
        }
        self.settled.send_replace(Settled {
            generation,
            pending,
        });
    }

    /// Subscribe to the outcome of mutations
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Settled> {
        self.settled.subscribe()
    }
    #[must_use]
    pub fn settled(&self) -> Settled {
        *self.settled.borrow()
    }

    /// Run a mutation on a VRF, then publish its outcome
    fn mutate_vrf<F>(&self, vrfid: VrfId, f: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut Vrf, &VrfResolver<'_>) -> Result<SyncReport, RouterError>,
    {
        let result = self.locked_mutate_vrf(vrfid, f);
        self.publish();
        result
    }
    fn locked_mutate_vrf<F>(&self, vrfid: VrfId, f: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut Vrf, &VrfResolver<'_>) -> Result<SyncReport, RouterError>,
    {
        let tracker = self.tracker()?;
        let vrftable = self.vrftable()?;
        let mut vrf = write_vrf(vrftable.get_vrf(vrfid)?)?;
        let report = f(&mut *vrf, &tracker.resolver(vrfid))?;
        self.account(vrfid, &report);
        Ok(())
    }

    /// Run a query on a VRF
    fn query_vrf<T, F>(&self, vrfid: VrfId, f: F) -> Result<T, RouterError>
    where
        F: FnOnce(&Vrf) -> T,
    {
        let vrftable = self.vrftable()?;
        let vrf = read_vrf(vrftable.get_vrf(vrfid)?)?;
        Ok(f(&vrf))
    }

    /// Re-run selection on a VRF and re-evaluate its router-id
    fn refresh_vrf(&self, tracker: &IfTracker, vrf: &mut Vrf) {
        let report = vrf.refresh(&tracker.resolver(vrf.vrfid));
        self.account(vrf.vrfid, &report);
        let candidates = tracker.router_id_candidates(vrf.vrfid);
        if vrf.routerid.update(&candidates) {
            self.record(RibEvent::RouterIdChanged {
                vrfid: vrf.vrfid,
                router_id: vrf.routerid.router_id(),
            });
        }
    }

    /// React to interface changes: connected routes come and go, static next-hops
    /// of interfaces that stop routing are purged, and the affected VRFs re-run selection.
    fn apply_if_changes(
        &self,
        tracker: &IfTracker,
        vrftable: &VrfTable,
        changes: &[IfChange],
    ) -> Result<(), RouterError> {
        let mut affected = BTreeSet::new();
        for change in changes {
            info!("{change}");
            self.record(RibEvent::Interface(change.clone()));
            let Ok(vrf) = vrftable.get_vrf(change.vrfid) else {
                warn!("Interface {} is in unknown vrf {}", change.ifname, change.vrfid);
                continue;
            };
            let mut vrf = write_vrf(vrf)?;
            let resolver = tracker.resolver(change.vrfid);
            let iface = tracker.get(&change.ifname);
            let report = match &change.what {
                IfChangeKind::Usable(_) => SyncReport::default(),
                IfChangeKind::RoutingDisabled => vrf.purge_static_interface(&change.ifname, &resolver),
                IfChangeKind::AddressAdded(address) => vrf.announce(
                    connected_entry(change.vrfid, &change.ifname, change.ifindex, address),
                    &resolver,
                )?,
                IfChangeKind::AddressRemoved(address) => {
                    let prefix = Prefix::from(*address);
                    // another address of the interface may still cover the same subnet
                    match iface
                        .into_iter()
                        .flat_map(connected_entries)
                        .find(|e| e.prefix == prefix)
                    {
                        Some(entry) => vrf.announce(entry, &resolver)?,
                        None => vrf.withdraw_instance(
                            prefix,
                            RouteOrigin::Connected,
                            change.ifindex,
                            &resolver,
                        ),
                    }
                }
                IfChangeKind::Attached => {
                    let mut report = SyncReport::default();
                    for entry in iface.into_iter().flat_map(connected_entries) {
                        let r = vrf.announce(entry, &resolver)?;
                        report.deltas.extend(r.deltas);
                        report.errors.extend(r.errors);
                    }
                    report
                }
                IfChangeKind::Detached => vrf.withdraw_connected(change.ifindex, &resolver),
            };
            self.account(change.vrfid, &report);
            affected.insert(change.vrfid);
        }
        for vrfid in affected {
            if let Ok(vrf) = vrftable.get_vrf(vrfid) {
                self.refresh_vrf(tracker, &mut *write_vrf(vrf)?);
            }
        }
        Ok(())
    }

    /// Run a mutation on the interface tracker and react to the changes it reports
    fn mutate_interfaces<F>(&self, f: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut IfTracker, &VrfTable) -> Result<Vec<IfChange>, RouterError>,
    {
        let result = self.locked_mutate_interfaces(f);
        self.publish();
        result
    }
    fn locked_mutate_interfaces<F>(&self, f: F) -> Result<(), RouterError>
    where
        F: FnOnce(&mut IfTracker, &VrfTable) -> Result<Vec<IfChange>, RouterError>,
    {
        let mut tracker = self.tracker_mut()?;
        let vrftable = self.vrftable()?;
        let changes = f(&mut *tracker, &*vrftable)?;
        self.apply_if_changes(&tracker, &vrftable, &changes)
    }

    //////////////////////////////////////////////////////////////////
    // VRFs
    //////////////////////////////////////////////////////////////////

    /// Apply the settings of a VRF config to a VRF, static routes included
    fn configure_vrf(&self, tracker: &IfTracker, vrf: &mut Vrf, config: &VrfConfig) -> Result<(), RouterError> {
        let local: Vec<IpAddr> = tracker
            .vrf_interfaces(vrf.vrfid)
            .flat_map(|i| i.addresses.iter().map(IpNet::addr))
            .collect();
        config.validate(&local).map_err(|e| self.reject(e))?;
        if let Some(bgp) = &config.bgp {
            check_bgp_instance(vrf.bgp(), bgp).map_err(|e| self.reject(e))?;
        }
        vrf.set_distance(config.distance.clone());
        vrf.set_bgp(config.bgp.clone());
        vrf.routerid.set_configured(config.router_id);
        let resolver = tracker.resolver(vrf.vrfid);
        for route in &config.static_routes {
            let report = vrf.add_static_route(route, &resolver);
            self.account(vrf.vrfid, &report);
        }
        self.refresh_vrf(tracker, vrf);
        Ok(())
    }

    fn configure_default_vrf(&self, config: &VrfConfig) -> Result<(), RouterError> {
        let result = self.locked_configure_default_vrf(config);
        self.publish();
        result
    }
    fn locked_configure_default_vrf(&self, config: &VrfConfig) -> Result<(), RouterError> {
        let tracker = self.tracker()?;
        let vrftable = self.vrftable()?;
        let mut vrf = write_vrf(vrftable.get_vrf(DEFAULT_VRF_ID)?)?;
        self.configure_vrf(&tracker, &mut vrf, config)
    }

    //////////////////////////////////////////////////////////////////
    /// Create a VRF. Its kernel routes live in the configured namespace or,
    /// if none, in a namespace named after the VRF.
    //////////////////////////////////////////////////////////////////
    pub fn add_vrf(&self, config: &VrfConfig) -> Result<VrfId, RouterError> {
        let result = self.locked_add_vrf(config);
        self.publish();
        result
    }
    fn locked_add_vrf(&self, config: &VrfConfig) -> Result<VrfId, RouterError> {
        let tracker = self.tracker()?;
        let mut vrftable = self.vrftable_mut()?;
        if vrftable.get_vrfid_by_name(&config.name).is_ok() {
            return Err(self.reject(ConfigError::DuplicateVrfName(config.name.clone())));
        }
        if vrftable.contains(config.id) {
            return Err(self.reject(ConfigError::DuplicateVrfId(config.id)));
        }
        let netns = config.netns.as_deref().unwrap_or(&config.name);
        let kernel = self.params.kernel.kernel(netns)?;
        let mut vrf = Vrf::new(&config.name, config.id, kernel, self.params.retry);
        let max_paths = self
            .ecmp
            .read()
            .map_err(|_| RouterError::Internal("ECMP lock poisoned"))?
            .max_paths;
        vrf.set_max_paths(max_paths);
        self.configure_vrf(&tracker, &mut vrf, config)?;
        vrftable.add_vrf(vrf)?;
        info!("Added VRF {} with id {} (netns {netns})", config.name, config.id);
        self.record(RibEvent::VrfAdded(config.name.clone()));
        Ok(config.id)
    }

    //////////////////////////////////////////////////////////////////
    /// Remove a VRF. Its routes are removed from the kernel. It must have no interfaces.
    //////////////////////////////////////////////////////////////////
    pub fn del_vrf(&self, name: &str) -> Result<(), RouterError> {
        let result = self.locked_del_vrf(name);
        self.publish();
        result
    }
    fn locked_del_vrf(&self, name: &str) -> Result<(), RouterError> {
        let tracker = self.tracker()?;
        let mut vrftable = self.vrftable_mut()?;
        let vrfid = vrftable.get_vrfid_by_name(name)?;
        if vrfid == DEFAULT_VRF_ID {
            return Err(RouterError::DefaultVrf);
        }
        if tracker.vrf_interfaces(vrfid).next().is_some() {
            warn!("Refusing to remove VRF {name}: it has interfaces");
            return Err(RouterError::VrfBusy(name.to_owned()));
        }
        let vrf = vrftable.remove_vrf(vrfid)?;
        let report = write_vrf(&vrf)?.purge();
        self.account(vrfid, &report);
        info!("Removed VRF {name}");
        self.record(RibEvent::VrfRemoved(name.to_owned()));
        Ok(())
    }

    /// Get the id of a VRF by name
    pub fn vrfid(&self, name: &str) -> Result<VrfId, RouterError> {
        self.vrftable()?.get_vrfid_by_name(name)
    }

    /// The ids of all VRFs
    pub fn vrfids(&self) -> Result<Vec<VrfId>, RouterError> {
        Ok(self.vrftable()?.vrfids())
    }

    //////////////////////////////////////////////////////////////////
    // Interfaces
    //////////////////////////////////////////////////////////////////

    pub fn add_interface(&self, config: &InterfaceConfig) -> Result<(), RouterError> {
        config.validate().map_err(|e| self.reject(e))?;
        self.mutate_interfaces(|tracker, vrftable| {
            let vrfid = vrftable.get_vrfid_by_name(&config.vrf)?;
            tracker.add_interface(Interface::from_config(config, vrfid))
        })
    }

    pub fn del_interface(&self, ifname: &str) -> Result<(), RouterError> {
        self.mutate_interfaces(|tracker, _| tracker.del_interface(ifname).map(|(_, changes)| changes))
    }

    pub fn set_admin_state(&self, ifname: &str, up: bool) -> Result<(), RouterError> {
        self.mutate_interfaces(|tracker, _| tracker.on_admin_state_change(ifname, up))
    }

    pub fn set_oper_state(&self, ifname: &str, up: bool) -> Result<(), RouterError> {
        self.mutate_interfaces(|tracker, _| tracker.on_oper_state_change(ifname, up))
    }

    /// Switch an interface to routing (true) or to bridging (false). Switching to
    /// bridging purges the static next-hops that depend on the interface.
    pub fn set_routing(&self, ifname: &str, routing: bool) -> Result<(), RouterError> {
        self.mutate_interfaces(|tracker, _| tracker.on_routing_enabled_change(ifname, routing))
    }

    pub fn add_address(&self, ifname: &str, address: IpNet) -> Result<(), RouterError> {
        check_interface_address(ifname, &address).map_err(|e| self.reject(e))?;
        self.mutate_interfaces(|tracker, _| tracker.add_address(ifname, address))
    }

    pub fn del_address(&self, ifname: &str, address: IpNet) -> Result<(), RouterError> {
        self.mutate_interfaces(|tracker, _| tracker.del_address(ifname, address))
    }

    /// Move an interface to another VRF
    pub fn set_interface_vrf(&self, ifname: &str, vrf: &str) -> Result<(), RouterError> {
        self.mutate_interfaces(|tracker, vrftable| {
            let vrfid = vrftable.get_vrfid_by_name(vrf)?;
            tracker.attach(ifname, vrfid)
        })
    }

    /// A copy of the state of an interface
    pub fn interface(&self, ifname: &str) -> Result<Interface, RouterError> {
        self.tracker()?
            .get(ifname)
            .cloned()
            .ok_or_else(|| RouterError::NoSuchInterface(ifname.to_owned()))
    }

    //////////////////////////////////////////////////////////////////
    // Routes
    //////////////////////////////////////////////////////////////////

    /// Refuse routes to reserved prefixes or through reserved gateways
    fn validate_entry(&self, entry: &RouteEntry) -> Result<(), RouterError> {
        check_prefix(&entry.prefix.as_ipnet()).map_err(|e| self.reject(e))?;
        for nhop in &entry.next_hops {
            if let NhKind::Gateway { address, interface } = &nhop.kind {
                check_gateway(address, interface.is_some()).map_err(|e| self.reject(e))?;
            }
        }
        Ok(())
    }

    //////////////////////////////////////////////////////////////////
    /// Add or update a candidate route
    //////////////////////////////////////////////////////////////////
    pub fn announce(&self, entry: RouteEntry) -> Result<(), RouterError> {
        self.validate_entry(&entry)?;
        self.mutate_vrf(entry.vrf_id, |vrf, resolver| vrf.announce(entry, resolver))
    }

    //////////////////////////////////////////////////////////////////
    /// Remove all the candidates of a protocol for a prefix
    //////////////////////////////////////////////////////////////////
    pub fn withdraw(&self, vrfid: VrfId, prefix: Prefix, origin: RouteOrigin) -> Result<(), RouterError> {
        self.mutate_vrf(vrfid, |vrf, resolver| Ok(vrf.withdraw(prefix, origin, resolver)))
    }

    //////////////////////////////////////////////////////////////////
    /// Remove one candidate of a protocol for a prefix
    //////////////////////////////////////////////////////////////////
    pub fn withdraw_instance(
        &self,
        vrfid: VrfId,
        prefix: Prefix,
        origin: RouteOrigin,
        instance: u32,
    ) -> Result<(), RouterError> {
        self.mutate_vrf(vrfid, |vrf, resolver| {
            Ok(vrf.withdraw_instance(prefix, origin, instance, resolver))
        })
    }

    pub fn add_static_route(&self, vrfid: VrfId, route: &StaticRouteConfig) -> Result<(), RouterError> {
        let local: Vec<IpAddr> = self
            .tracker()?
            .vrf_interfaces(vrfid)
            .flat_map(|i| i.addresses.iter().map(IpNet::addr))
            .collect();
        route.validate(&local).map_err(|e| self.reject(e))?;
        self.mutate_vrf(vrfid, |vrf, resolver| Ok(vrf.add_static_route(route, resolver)))
    }

    pub fn del_static_route(&self, vrfid: VrfId, route: &StaticRouteConfig) -> Result<(), RouterError> {
        self.mutate_vrf(vrfid, |vrf, resolver| vrf.del_static_route(route, resolver))
    }

    //////////////////////////////////////////////////////////////////
    // Configuration
    //////////////////////////////////////////////////////////////////

    /// Configure the BGP router of a VRF. A VRF has at most one BGP router (ASN).
    pub fn set_bgp(&self, vrfid: VrfId, bgp: BgpRouterConfig) -> Result<(), RouterError> {
        self.mutate_vrf(vrfid, |vrf, resolver| {
            check_bgp_instance(vrf.bgp(), &bgp).map_err(|e| self.reject(e))?;
            info!("Vrf {}: BGP router with ASN {}", vrf.name, bgp.asn);
            vrf.set_bgp(Some(bgp));
            Ok(vrf.refresh(resolver))
        })
    }

    pub fn del_bgp(&self, vrfid: VrfId) -> Result<(), RouterError> {
        self.mutate_vrf(vrfid, |vrf, resolver| {
            vrf.set_bgp(None);
            Ok(vrf.refresh(resolver))
        })
    }

    /// Override the distances assigned by dynamic protocols. Applies to routes announced afterwards.
    pub fn set_distance(&self, vrfid: VrfId, distance: DistanceConfig) -> Result<(), RouterError> {
        if let Some(d) = [distance.ospf, distance.bgp].into_iter().flatten().find(|d| *d == 0) {
            return Err(self.reject(ConfigError::BadDistance(u16::from(d))));
        }
        self.mutate_vrf(vrfid, |vrf, _| {
            vrf.set_distance(distance);
            Ok(SyncReport::default())
        })
    }

    /// Set or clear the configured router-id of a VRF
    pub fn set_router_id(&self, vrfid: VrfId, router_id: Option<Ipv4Addr>) -> Result<(), RouterError> {
        if let Some(rid) = router_id
            && (rid.is_unspecified() || rid.is_multicast() || rid.is_broadcast())
        {
            return Err(self.reject(ConfigError::BadRouterId(IpAddr::V4(rid))));
        }
        self.mutate_vrf(vrfid, |vrf, _| {
            if vrf.routerid.set_configured(router_id) {
                self.record(RibEvent::RouterIdChanged {
                    vrfid,
                    router_id: vrf.routerid.router_id(),
                });
            }
            Ok(SyncReport::default())
        })
    }

    /// Change the ECMP settings. ECMP cannot be disabled.
    pub fn set_ecmp(&self, ecmp: EcmpConfig) -> Result<(), RouterError> {
        ecmp.validate().map_err(|e| self.reject(e))?;
        let result = self.locked_set_ecmp(ecmp);
        self.publish();
        result
    }
    fn locked_set_ecmp(&self, ecmp: EcmpConfig) -> Result<(), RouterError> {
        let tracker = self.tracker()?;
        let vrftable = self.vrftable()?;
        let mut current = self
            .ecmp
            .write()
            .map_err(|_| RouterError::Internal("ECMP lock poisoned"))?;
        info!("ECMP max paths: {:?}", ecmp.max_paths);
        for vrf in vrftable.values() {
            let mut vrf = write_vrf(vrf)?;
            vrf.set_max_paths(ecmp.max_paths);
            self.refresh_vrf(&tracker, &mut vrf);
        }
        *current = ecmp;
        Ok(())
    }

    //////////////////////////////////////////////////////////////////
    // Queries
    //////////////////////////////////////////////////////////////////

    /// The candidates and the installed route of a prefix
    pub fn get_route(&self, vrfid: VrfId, prefix: &Prefix) -> Result<RouteView, RouterError> {
        self.query_vrf(vrfid, |vrf| vrf.get_route(prefix))
    }

    /// `show rib`
    pub fn show_rib(&self, vrfid: VrfId) -> Result<String, RouterError> {
        self.query_vrf(vrfid, |vrf| ShowRib(vrf).to_string())
    }

    /// `show ip route`
    pub fn show_ip_route(&self, vrfid: VrfId) -> Result<String, RouterError> {
        self.query_vrf(vrfid, |vrf| ShowFib(&vrf.fib_reader(), AddressFamily::Ipv4).to_string())
    }

    /// `show ipv6 route`
    pub fn show_ipv6_route(&self, vrfid: VrfId) -> Result<String, RouterError> {
        self.query_vrf(vrfid, |vrf| ShowFib(&vrf.fib_reader(), AddressFamily::Ipv6).to_string())
    }

    /// The router-id in use in a VRF
    pub fn active_router_id(&self, vrfid: VrfId) -> Result<Option<Ipv4Addr>, RouterError> {
        self.query_vrf(vrfid, |vrf| vrf.router_id().router_id())
    }

    /// Get a reader of the FIB of a VRF. Reads never block the manager.
    pub fn fib_reader(&self, vrfid: VrfId) -> Result<FibReader, RouterError> {
        self.query_vrf(vrfid, Vrf::fib_reader)
    }

    /// Retry the prefixes that failed to sync to the kernel. Returns how many are still pending.
    pub fn resync(&self) -> Result<usize, RouterError> {
        let result = self.locked_resync();
        self.publish();
        result
    }
    fn locked_resync(&self) -> Result<usize, RouterError> {
        let vrftable = self.vrftable()?;
        let mut pending = 0;
        for vrf in vrftable.values() {
            pending += write_vrf(vrf)?.resync();
        }
        Ok(pending)
    }
}
