// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Textual renderings of the RIB and the FIB of a VRF, in the format of the
//! `show rib`, `show ip route` and `show ipv6 route` commands.

use crate::fib::fibtype::FibReader;
use crate::prefix::{AddressFamily, Prefix};
use crate::rib::route::{FibNextHop, FibRoute};
use crate::rib::table::{RibTable, RouteSet};
use crate::rib::vrf::Vrf;
use std::fmt::Display;

fn afi_name(afi: AddressFamily) -> &'static str {
    match afi {
        AddressFamily::Ipv4 => "ipv4",
        AddressFamily::Ipv6 => "ipv6",
    }
}

fn fmt_route_set(f: &mut std::fmt::Formatter<'_>, prefix: &Prefix, set: &RouteSet) -> std::fmt::Result {
    let mark = if set.installed().is_some() { "*" } else { "" };
    writeln!(f, "{mark}{prefix},  {} unicast next-hops", set.num_nexthops())?;
    for entry in set.entries() {
        for nh in &entry.next_hops {
            let mark = if entry.selected && nh.selected { "*" } else { "" };
            writeln!(
                f,
                "\t{mark}via  {},  [{}/{}],  {}",
                nh.kind, entry.distance, entry.metric, entry.origin
            )?;
        }
    }
    Ok(())
}

fn fmt_rib_table(f: &mut std::fmt::Formatter<'_>, table: &RibTable) -> std::fmt::Result {
    if table.is_empty() {
        return Ok(());
    }
    writeln!(f, "Displaying {} rib entries\n", afi_name(table.afi()))?;
    writeln!(f, "'*' denotes selected")?;
    writeln!(f, "'[x/y]' denotes [distance/metric]\n")?;
    for (prefix, set) in table.iter() {
        fmt_route_set(f, prefix, set)?;
    }
    writeln!(f)
}

/// The candidates of all protocols for every prefix of a VRF. Selected entries and
/// next-hops are marked.
pub struct ShowRib<'a>(pub &'a Vrf);
impl Display for ShowRib<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_rib_table(f, self.0.rib(AddressFamily::Ipv4))?;
        fmt_rib_table(f, self.0.rib(AddressFamily::Ipv6))
    }
}

fn fmt_fib_nexthop(f: &mut std::fmt::Formatter<'_>, nh: &FibNextHop) -> std::fmt::Result {
    match &nh.gateway {
        Some(address) => write!(f, "{address}"),
        None => write!(f, "{}", nh.ifname),
    }
}

impl Display for FibRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{},  {} unicast next-hops", self.prefix, self.num_nhops())?;
        for nh in &self.nhops {
            write!(f, "\tvia  ")?;
            fmt_fib_nexthop(f, nh)?;
            writeln!(f, ",  [{}/{}],  {}", self.distance, self.metric, self.origin)?;
        }
        Ok(())
    }
}

/// The routes of a VRF installed for forwarding, for one address family
pub struct ShowFib<'a>(pub &'a FibReader, pub AddressFamily);
impl Display for ShowFib<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(fib) = self.0.enter() else {
            return writeln!(f, "No FIB available");
        };
        let routes: Vec<&FibRoute> = match self.1 {
            AddressFamily::Ipv4 => fib.iter_v4().collect(),
            AddressFamily::Ipv6 => fib.iter_v6().collect(),
        };
        if routes.is_empty() {
            return Ok(());
        }
        writeln!(f, "Displaying {} routes selected for forwarding\n", afi_name(self.1))?;
        writeln!(f, "'[x/y]' denotes [distance/metric]\n")?;
        for route in routes {
            route.fmt(f)?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::kernel::MemKernel;
    use crate::fib::sync::RetryPolicy;
    use crate::rib::nexthop::tests::FakeResolver;
    use config::StaticRouteConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_show_rib_and_fib() {
        let resolver = FakeResolver::default()
            .with("1", 1, "1.1.1.1/24")
            .with("2", 2, "");
        let mut vrf = Vrf::new("vrf_default", 0, Box::new(MemKernel::new("default")), RetryPolicy::default());
        for route in ["123.0.0.1/32 1.1.1.2", "123.0.0.1/32 2", "123.0.0.1/32 9.9.9.9 5"] {
            let cfg: StaticRouteConfig = route.parse().unwrap();
            vrf.add_static_route(&cfg, &resolver);
        }

        let rib = ShowRib(&vrf).to_string();
        assert!(rib.contains("*123.0.0.1/32,  3 unicast next-hops\n"));
        assert!(rib.contains("\t*via  1.1.1.2,  [1/0],  static\n"));
        assert!(rib.contains("\t*via  2,  [1/0],  static\n"));
        assert!(rib.contains("\tvia  9.9.9.9,  [5/0],  static\n"));

        let fib = ShowFib(&vrf.fib_reader(), AddressFamily::Ipv4).to_string();
        let expected = "Displaying ipv4 routes selected for forwarding\n\n\
                        '[x/y]' denotes [distance/metric]\n\n\
                        123.0.0.1/32,  2 unicast next-hops\n\
                        \tvia  2,  [1/0],  static\n\
                        \tvia  1.1.1.2,  [1/0],  static\n\n";
        assert_eq!(fib, expected);
        assert_eq!(ShowFib(&vrf.fib_reader(), AddressFamily::Ipv6).to_string(), "");
    }
}
