// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The static routes configured in a VRF. They are turned into RIB entries, one per
//! prefix and distance, with the distance as instance.

use crate::errors::RouterError;
use crate::prefix::Prefix;
use crate::rib::nexthop::{NextHop, NhKind};
use crate::rib::route::{RouteEntry, RouteOrigin};
use crate::rib::vrf::VrfId;
use config::{StaticNextHop, StaticRouteConfig};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Clone, Debug, Default)]
pub struct StaticRoutes {
    routes: BTreeMap<Prefix, BTreeMap<NhKind, u8>>,
}

impl StaticRoutes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(BTreeMap::len).sum()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Add a static route. A route for the same prefix and next-hop is replaced.
    pub fn add(&mut self, config: &StaticRouteConfig) -> Prefix {
        let prefix = Prefix::from(config.prefix);
        let nhkind = NhKind::from(&config.nexthop);
        debug!("Adding static route to {prefix} via {nhkind} distance {}", config.distance);
        self.routes
            .entry(prefix)
            .or_default()
            .insert(nhkind, config.distance);
        prefix
    }

    /// Remove a static route. The distance is not relevant.
    pub fn del(&mut self, config: &StaticRouteConfig) -> Result<Prefix, RouterError> {
        let prefix = Prefix::from(config.prefix);
        let nhkind = NhKind::from(&config.nexthop);
        let nhops = self
            .routes
            .get_mut(&prefix)
            .ok_or(RouterError::NoSuchRoute(prefix))?;
        nhops.remove(&nhkind).ok_or(RouterError::NoSuchRoute(prefix))?;
        if nhops.is_empty() {
            self.routes.remove(&prefix);
        }
        debug!("Removed static route to {prefix} via {nhkind}");
        Ok(prefix)
    }

    /// The RIB entries for a prefix, one per configured distance
    #[must_use]
    pub fn entries(&self, vrfid: VrfId, prefix: &Prefix) -> Vec<RouteEntry> {
        let mut by_distance: BTreeMap<u8, RouteEntry> = BTreeMap::new();
        for (nhkind, distance) in self.routes.get(prefix).into_iter().flatten() {
            by_distance
                .entry(*distance)
                .or_insert_with(|| {
                    RouteEntry::new(vrfid, *prefix, RouteOrigin::Static)
                        .with_distance(*distance)
                        .with_instance(u32::from(*distance))
                })
                .add_nexthop(NextHop::new(nhkind.clone()));
        }
        by_distance.into_values().collect()
    }

    /// Remove the next-hops that depend on an interface, either because they name it or
    /// because they are listed in `resolved` as egressing through it. Returns the prefixes affected.
    pub fn purge_interface(&mut self, ifname: &str, resolved: &BTreeSet<(Prefix, NhKind)>) -> Vec<Prefix> {
        let mut affected = vec![];
        for (prefix, nhops) in &mut self.routes {
            let before = nhops.len();
            nhops.retain(|nhkind, _| {
                let bound = nhkind.names_interface(ifname)
                    || resolved.contains(&(*prefix, nhkind.clone()));
                if bound {
                    info!("Purging static next-hop {nhkind} of {prefix}: interface {ifname} is no longer routing");
                }
                !bound
            });
            if nhops.len() != before {
                affected.push(*prefix);
            }
        }
        self.routes.retain(|_, nhops| !nhops.is_empty());
        affected
    }

    /// The configuration of the static routes
    #[must_use]
    pub fn configs(&self) -> Vec<StaticRouteConfig> {
        self.routes
            .iter()
            .flat_map(|(prefix, nhops)| {
                nhops.iter().map(|(nhkind, distance)| {
                    let nexthop = match nhkind {
                        NhKind::Gateway { address, interface } => StaticNextHop::Gateway {
                            address: *address,
                            interface: interface.clone(),
                        },
                        NhKind::Interface(name) => StaticNextHop::Interface(name.clone()),
                    };
                    StaticRouteConfig::new(prefix.as_ipnet(), nexthop).with_distance(*distance)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg(s: &str) -> StaticRouteConfig {
        s.parse().unwrap()
    }

    #[test]
    fn test_static_entries() {
        let mut statics = StaticRoutes::new();
        let prefix = statics.add(&cfg("123.0.0.1/32 1.1.1.2"));
        statics.add(&cfg("123.0.0.1/32 2"));
        statics.add(&cfg("123.0.0.1/32 5.5.5.1 10"));
        assert_eq!(statics.len(), 3);

        let entries = statics.entries(0, &prefix);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].distance, 1);
        assert_eq!(entries[0].instance, 1);
        assert_eq!(entries[0].next_hops.len(), 2);
        assert_eq!(entries[1].distance, 10);

        // same next-hop, new distance: replaced
        statics.add(&cfg("123.0.0.1/32 5.5.5.1"));
        assert_eq!(statics.entries(0, &prefix).len(), 1);
        assert_eq!(statics.configs().len(), 3);

        assert_eq!(statics.del(&cfg("123.0.0.1/32 5.5.5.1 7")), Ok(prefix));
        assert_eq!(
            statics.del(&cfg("123.0.0.1/32 5.5.5.1")),
            Err(RouterError::NoSuchRoute(prefix))
        );
        assert_eq!(statics.len(), 2);
    }

    #[test]
    fn test_purge_interface() {
        let mut statics = StaticRoutes::new();
        let prefix = statics.add(&cfg("123.0.0.1/32 1.1.1.2"));
        statics.add(&cfg("123.0.0.1/32 2"));
        statics.add(&cfg("123.0.0.1/32 3"));
        let other = statics.add(&cfg("10.0.0.0/8 1.1.1.2"));

        // 1.1.1.2 egresses through "1" for the first prefix only
        let gw = NhKind::from(&StaticNextHop::gateway("1.1.1.2".parse().unwrap()));
        let resolved = BTreeSet::from([(prefix, gw)]);
        assert_eq!(statics.purge_interface("1", &resolved), vec![prefix]);
        assert_eq!(statics.entries(0, &prefix)[0].next_hops.len(), 2);
        assert_eq!(statics.entries(0, &other).len(), 1);

        assert_eq!(statics.purge_interface("2", &BTreeSet::new()), vec![prefix]);
        assert_eq!(statics.purge_interface("9", &BTreeSet::new()), vec![]);
        assert_eq!(statics.len(), 2);
    }
}
