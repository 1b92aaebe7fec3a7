// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The forwarding table of a VRF. It mirrors the routes the kernel accepted and is
//! published to readers through left-right.

use ipnet::{Ipv4Net, Ipv6Net};
use left_right::{Absorb, ReadGuard, ReadHandle, ReadHandleFactory, WriteHandle};
use prefix_trie::PrefixMap;
use std::net::IpAddr;

use crate::prefix::Prefix;
use crate::rib::route::FibRoute;
use crate::rib::vrf::VrfId;

#[derive(Clone)]
pub struct Fib {
    vrfid: VrfId,
    version: u64,
    routesv4: PrefixMap<Ipv4Net, FibRoute>,
    routesv6: PrefixMap<Ipv6Net, FibRoute>,
}

impl Fib {
    #[must_use]
    pub fn new(vrfid: VrfId) -> Self {
        Self {
            vrfid,
            version: 0,
            routesv4: PrefixMap::new(),
            routesv6: PrefixMap::new(),
        }
    }
    #[must_use]
    pub fn vrfid(&self) -> VrfId {
        self.vrfid
    }
    /// Number of changes absorbed so far
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
    fn add_route(&mut self, route: &FibRoute) {
        match route.prefix {
            Prefix::IPV4(p) => self.routesv4.insert(p, route.clone()),
            Prefix::IPV6(p) => self.routesv6.insert(p, route.clone()),
        };
    }
    fn del_route(&mut self, prefix: &Prefix) {
        match prefix {
            Prefix::IPV4(p) => self.routesv4.remove(p),
            Prefix::IPV6(p) => self.routesv6.remove(p),
        };
    }
    /// Exact-match lookup
    #[must_use]
    pub fn get(&self, prefix: &Prefix) -> Option<&FibRoute> {
        match prefix {
            Prefix::IPV4(p) => self.routesv4.get(p),
            Prefix::IPV6(p) => self.routesv6.get(p),
        }
    }
    /// Longest-prefix-match lookup of an address
    #[must_use]
    pub fn lpm(&self, target: &IpAddr) -> Option<&FibRoute> {
        match target {
            IpAddr::V4(a) => self.routesv4.get_lpm(&Ipv4Net::from(*a)).map(|(_, r)| r),
            IpAddr::V6(a) => self.routesv6.get_lpm(&Ipv6Net::from(*a)).map(|(_, r)| r),
        }
    }
    #[must_use]
    pub fn len_v4(&self) -> usize {
        self.routesv4.len()
    }
    #[must_use]
    pub fn len_v6(&self) -> usize {
        self.routesv6.len()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.len_v4() + self.len_v6()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn iter_v4(&self) -> impl Iterator<Item = &FibRoute> {
        self.routesv4.iter().map(|(_, r)| r)
    }
    pub fn iter_v6(&self) -> impl Iterator<Item = &FibRoute> {
        self.routesv6.iter().map(|(_, r)| r)
    }
}

#[derive(Debug)]
pub enum FibChange {
    Add(FibRoute),
    Del(Prefix),
}

impl Absorb<FibChange> for Fib {
    fn absorb_first(&mut self, change: &mut FibChange, _: &Self) {
        self.version += 1;
        match change {
            FibChange::Add(route) => self.add_route(route),
            FibChange::Del(prefix) => self.del_route(prefix),
        }
    }
    fn drop_first(self: Box<Self>) {}
    fn sync_with(&mut self, first: &Self) {
        *self = first.clone();
    }
}

pub struct FibWriter(WriteHandle<Fib, FibChange>);
impl FibWriter {
    /// create a fib, providing a writer and a reader
    #[must_use]
    pub fn new(vrfid: VrfId) -> (FibWriter, FibReader) {
        let (w, r) = left_right::new_from_empty::<Fib, FibChange>(Fib::new(vrfid));
        (FibWriter(w), FibReader(r))
    }
    pub fn enter(&self) -> Option<ReadGuard<'_, Fib>> {
        self.0.enter()
    }
    pub fn add_route(&mut self, route: FibRoute) {
        self.0.append(FibChange::Add(route));
        self.0.publish();
    }
    pub fn del_route(&mut self, prefix: Prefix) {
        self.0.append(FibChange::Del(prefix));
        self.0.publish();
    }
    #[must_use]
    pub fn factory(&self) -> FibReaderFactory {
        FibReaderFactory(self.0.factory())
    }
}

#[derive(Clone, Debug)]
pub struct FibReader(ReadHandle<Fib>);
impl FibReader {
    pub fn enter(&self) -> Option<ReadGuard<'_, Fib>> {
        self.0.enter()
    }
    /// Get a copy of the route for a prefix
    #[must_use]
    pub fn get(&self, prefix: &Prefix) -> Option<FibRoute> {
        self.enter().and_then(|fib| fib.get(prefix).cloned())
    }
    #[must_use]
    pub fn lpm(&self, target: &IpAddr) -> Option<FibRoute> {
        self.enter().and_then(|fib| fib.lpm(target).cloned())
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.enter().map_or(0, |fib| fib.len())
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates [`FibReader`]s. Unlike readers, factories can be shared among threads.
#[derive(Clone)]
pub struct FibReaderFactory(ReadHandleFactory<Fib>);
impl FibReaderFactory {
    #[must_use]
    pub fn handle(&self) -> FibReader {
        FibReader(self.0.handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::route::{FibNextHop, RouteOrigin};

    fn route(prefix: &str, gw: &str) -> FibRoute {
        FibRoute {
            prefix: prefix.parse().unwrap(),
            origin: RouteOrigin::Static,
            distance: 1,
            metric: 0,
            nhops: vec![FibNextHop {
                gateway: Some(gw.parse().unwrap()),
                ifname: "1".to_string(),
                ifindex: 1,
            }],
        }
    }

    #[test]
    fn test_fib_publish() {
        let (mut fibw, fibr) = FibWriter::new(0);
        let factory = fibw.factory();
        assert!(fibr.is_empty());

        fibw.add_route(route("10.0.0.0/8", "1.1.1.2"));
        fibw.add_route(route("10.1.0.0/16", "1.1.1.3"));
        fibw.add_route(route("2001:db8::/32", "2001::2"));
        assert_eq!(fibr.len(), 3);

        let reader = factory.handle();
        let hit = reader.lpm(&"10.1.2.3".parse().unwrap()).unwrap();
        assert_eq!(hit.prefix, "10.1.0.0/16".parse().unwrap());
        let hit = reader.lpm(&"10.2.2.3".parse().unwrap()).unwrap();
        assert_eq!(hit.prefix, "10.0.0.0/8".parse().unwrap());
        assert!(reader.lpm(&"11.0.0.1".parse().unwrap()).is_none());

        fibw.del_route("10.1.0.0/16".parse().unwrap());
        assert!(reader.get(&"10.1.0.0/16".parse().unwrap()).is_none());
        let fib = fibr.enter().unwrap();
        assert_eq!(fib.len_v4(), 1);
        assert_eq!(fib.len_v6(), 1);
        assert_eq!(fib.vrfid(), 0);
        assert!(fib.version() >= 4);
    }
}
