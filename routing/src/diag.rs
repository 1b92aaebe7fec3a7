// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Diagnostic dumps of the state of the RIB manager

use std::fmt::Write;
use std::sync::PoisonError;

use crate::errors::RouterError;
use crate::interfaces::interface::Interface;
use crate::pretty_utils::{Frame, Heading};
use crate::prefix::AddressFamily;
use crate::rib::vrf::{Vrf, VrfId};
use crate::ribmgr::{RibManager, read_vrf};

/// The next-hops of a VRF that an interface resolves, one line each
fn resolved_by(vrf: &Vrf, iface: &Interface) -> Vec<String> {
    let mut out = vec![];
    for afi in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
        for (prefix, set) in vrf.rib(afi).iter() {
            for entry in set.entries() {
                for nh in entry.next_hops.iter().filter(|nh| {
                    nh.resolved
                        .as_ref()
                        .is_some_and(|egress| egress.ifname == iface.name)
                }) {
                    let mark = if entry.selected && nh.selected { "*" } else { " " };
                    out.push(format!("{mark}{prefix} via {} ({})", nh.kind, entry.origin));
                }
            }
        }
    }
    out
}

impl RibManager {
    /// The `show rib` output of a VRF
    pub fn diag_rib(&self, vrfid: VrfId) -> Result<String, RouterError> {
        let mut out = Frame(format!("RIB of vrf {vrfid}")).to_string();
        out += &self.show_rib(vrfid)?;
        Ok(out)
    }

    /// The routes of the kernel of a VRF, and the prefixes not synced yet
    pub fn diag_kernel_routes(&self, vrfid: VrfId) -> Result<String, RouterError> {
        let vrftable = self.vrftable()?;
        let vrf = read_vrf(vrftable.get_vrf(vrfid)?)?;
        let routes = vrf.kernel_routes()?;
        let pending = vrf.pending();
        let stats = vrf.sync_stats();

        let mut out = Heading(format!("Kernel routes (netns {})", vrf.netns())).to_string();
        for route in &routes {
            let _ = writeln!(out, "{route}");
        }
        let _ = writeln!(out, "\n {} routes", routes.len());
        let _ = writeln!(
            out,
            " installed: {} replaced: {} deleted: {} noops: {} retries: {} failures: {}",
            stats.installed, stats.replaced, stats.deleted, stats.noops, stats.retries, stats.failures
        );
        if !pending.is_empty() {
            out += &Heading(format!("Pending ({})", pending.len())).to_string();
            for (prefix, desired) in &pending {
                match desired {
                    Some(route) => {
                        let _ = writeln!(out, " {prefix}: install {} next-hops", route.num_nhops());
                    }
                    None => {
                        let _ = writeln!(out, " {prefix}: delete");
                    }
                }
            }
        }
        Ok(out)
    }

    /// The interfaces, their state and addresses, and the next-hops each of them resolves
    pub fn diag_l3_port_cache(&self) -> Result<String, RouterError> {
        let tracker = self.tracker()?;
        let vrftable = self.vrftable()?;
        let mut out = Heading("L3 port cache".to_owned()).to_string();
        for iface in tracker.iftable().sorted() {
            let _ = writeln!(
                out,
                " {} (ifindex {}, {}) vrf {} admin {} oper {} {}{}",
                iface.name,
                iface.ifindex,
                iface.kind,
                iface.vrfid,
                iface.admin_state,
                iface.oper_state,
                iface.mode,
                if iface.is_usable() { "" } else { " (unusable)" }
            );
            if let Some(lag) = &iface.lag {
                let _ = writeln!(out, "    member of {lag}");
            }
            if !iface.addresses.is_empty() {
                let addresses: Vec<String> = iface.addresses.iter().map(ToString::to_string).collect();
                let _ = writeln!(out, "    addresses: {}", addresses.join(", "));
            }
            if let Ok(vrf) = vrftable.get_vrf(iface.vrfid) {
                for line in resolved_by(&*read_vrf(vrf)?, iface) {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }
        Ok(out)
    }

    /// Sizes of the state kept by the manager
    pub fn diag_memory(&self) -> Result<String, RouterError> {
        let tracker = self.tracker()?;
        let vrftable = self.vrftable()?;
        let mut out = Heading("Memory".to_owned()).to_string();
        let _ = writeln!(out, " interfaces: {}", tracker.iftable().len());
        let _ = writeln!(out, " vrfs: {}", vrftable.len());
        for vrf in vrftable.values() {
            let vrf = read_vrf(vrf)?;
            let (v4, v6) = (vrf.rib(AddressFamily::Ipv4), vrf.rib(AddressFamily::Ipv6));
            let nexthops: usize = v4
                .iter()
                .chain(v6.iter())
                .map(|(_, set)| set.num_nexthops())
                .sum();
            let fib = vrf.fib_reader();
            let _ = writeln!(
                out,
                " vrf {} ({}): prefixes {}/{} entries {} next-hops {} fib {} pending {} statics {}",
                vrf.name,
                vrf.vrfid,
                v4.len(),
                v6.len(),
                v4.num_entries() + v6.num_entries(),
                nexthops,
                fib.len(),
                vrf.num_pending(),
                vrf.statics().len()
            );
        }
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, " events: {} stored, {} generated", events.len(), events.generated());
        Ok(out)
    }

    /// The event log
    #[must_use]
    pub fn diag_events(&self) -> String {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::fib::kernel::{KernelFactory, KernelOp, MemKernelFactory};
    use crate::ribmgr::{RibManager, RibParamsBuilder};
    use config::{InterfaceConfigBuilder, StaticRouteConfig};
    use ipnet::IpNet;
    use nix::errno::Errno;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_diag_dumps() {
        let factory = Arc::new(MemKernelFactory::new());
        let params = RibParamsBuilder::default()
            .kernel(factory.clone() as Arc<dyn KernelFactory>)
            .build()
            .unwrap();
        let ribmgr = RibManager::new(params).unwrap();
        let eth = InterfaceConfigBuilder::default()
            .name("1")
            .ifindex(1)
            .address("1.1.1.1/24".parse::<IpNet>().unwrap())
            .build()
            .unwrap();
        ribmgr.add_interface(&eth).unwrap();
        let route: StaticRouteConfig = "123.0.0.1/32 1.1.1.2".parse().unwrap();
        ribmgr.add_static_route(0, &route).unwrap();

        let rib = ribmgr.diag_rib(0).unwrap();
        assert!(rib.contains("RIB of vrf 0"));
        assert!(rib.contains("*123.0.0.1/32,  1 unicast next-hops"));

        let kernel = ribmgr.diag_kernel_routes(0).unwrap();
        assert!(kernel.contains("123.0.0.1 via 1.1.1.2 dev 1 proto static"));
        assert!(kernel.contains(" 2 routes"));
        assert!(!kernel.contains("Pending"));

        factory.get("vrf_default").inject(KernelOp::Observe, Errno::EPERM, 1);
        let other: StaticRouteConfig = "10.0.0.0/8 1.1.1.3".parse().unwrap();
        ribmgr.add_static_route(0, &other).unwrap();
        let kernel = ribmgr.diag_kernel_routes(0).unwrap();
        assert!(kernel.contains("Pending (1)"));
        assert!(kernel.contains(" 10.0.0.0/8: install 1 next-hops"));

        let ports = ribmgr.diag_l3_port_cache().unwrap();
        assert!(ports.contains(" 1 (ifindex 1, ethernet) vrf 0 admin up oper up routing\n"));
        assert!(ports.contains("    addresses: 1.1.1.1/24"));
        assert!(ports.contains("    *123.0.0.1/32 via 1.1.1.2 (static)"));

        ribmgr.set_admin_state("1", false).unwrap();
        let ports = ribmgr.diag_l3_port_cache().unwrap();
        assert!(ports.contains("admin down oper up routing (unusable)"));
        assert!(!ports.contains("123.0.0.1/32"));

        let memory = ribmgr.diag_memory().unwrap();
        assert!(memory.contains(" interfaces: 1"));
        assert!(memory.contains(" vrf vrf_default (0): prefixes 3/0 entries 3 next-hops 3"));

        let events = ribmgr.diag_events();
        assert!(events.contains("failed to sync 10.0.0.0/8"));
        assert!(events.contains("interface 1 (vrf 0): unusable"));
    }
}
