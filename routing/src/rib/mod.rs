// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! RIB state: route candidates, best-path selection and VRFs

pub mod nexthop;
pub mod route;
pub mod table;
pub mod vrf;
pub mod vrftable;

use tracectl::trace_target;
trace_target!("rib", LevelFilter::INFO, &["rib"]);

// re-exports
pub use nexthop::{Egress, NextHop, NhKind, NhResolver};
pub use route::{FibNextHop, FibRoute, RibDelta, RouteEntry, RouteOrigin};
pub use table::{RibTable, RouteSet, SelectionPolicy};
pub use vrf::{RouteView, Vrf, VrfId};
pub use vrftable::VrfTable;
