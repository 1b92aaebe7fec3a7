// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Connected routes: the subnets of the addresses configured on interfaces

use crate::interfaces::interface::{IfIndex, Interface};
use crate::prefix::Prefix;
use crate::rib::nexthop::NextHop;
use crate::rib::route::{RouteEntry, RouteOrigin};
use crate::rib::vrf::VrfId;
use ipnet::IpNet;

/// The connected route for an address of an interface. Each interface contributes its
/// own instance, so that a subnet configured on several interfaces yields ECMP.
#[must_use]
pub fn connected_entry(vrfid: VrfId, ifname: &str, ifindex: IfIndex, address: &IpNet) -> RouteEntry {
    RouteEntry::new(vrfid, Prefix::from(*address), RouteOrigin::Connected)
        .with_instance(ifindex)
        .with_nexthop(NextHop::interface(ifname))
}

/// The connected routes of an interface
#[must_use]
pub fn connected_entries(iface: &Interface) -> Vec<RouteEntry> {
    iface
        .addresses
        .iter()
        .map(|address| connected_entry(iface.vrfid, &iface.name, iface.ifindex, address))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::interface::IfKind;

    #[test]
    fn test_connected_entries() {
        let mut iface = Interface::new("1", 1, IfKind::Ethernet);
        iface.addresses.insert("1.1.1.1/24".parse().unwrap());
        iface.addresses.insert("2001::1/64".parse().unwrap());
        let entries = connected_entries(&iface);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].prefix, "1.1.1.0/24".parse().unwrap());
        assert_eq!(entries[0].distance, 0);
        assert_eq!(entries[0].instance, 1);
        assert_eq!(entries[1].prefix, "2001::/64".parse().unwrap());
    }
}
