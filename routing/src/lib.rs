// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The routing core of the rib daemon.
//!
//! A [`RibManager`] keeps, for every VRF, the routes that static configuration,
//! connected interfaces, OSPF and BGP announce. It selects the best of them per prefix,
//! builds ECMP groups out of the resolvable next-hops, and keeps a FIB and the kernel of
//! the VRF in sync with the selection. Interface and address changes are tracked so that
//! routes react to links going down, addresses going away or routing being disabled.

#![deny(
    unsafe_code,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

mod connected;
mod diag;
mod display;
mod errors;
pub mod event;
pub mod fib;
pub mod interfaces;
pub mod prefix;
pub mod pretty_utils;
pub mod rib;
mod ribmgr;
pub mod routerid;
pub mod statics;

// re-exports
pub use display::{ShowFib, ShowRib};
pub use errors::RouterError;
pub use event::{EventLog, RibEvent};
pub use fib::kernel::{KernelFactory, KernelRoute, KernelRoutes, MemKernel, MemKernelFactory};
pub use fib::netlink::{NetlinkKernel, NetlinkKernelFactory};
pub use fib::sync::RetryPolicy;
pub use interfaces::tracker::{IfChange, IfChangeKind};
pub use prefix::{AddressFamily, Prefix};
pub use rib::{NextHop, NhKind, RouteEntry, RouteOrigin, RouteView, VrfId};
pub use ribmgr::{RibManager, RibParams, RibParamsBuilder, Settled};
