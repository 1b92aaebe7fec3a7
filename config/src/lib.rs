// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed configuration for the rib daemon, and its validation.
//!
//! Configurations are plain serde structures, usually loaded from YAML with
//! [`RouterConfig::from_yaml`]. Nothing here reaches the routing core before being
//! validated: reserved prefixes and next-hops, conflicting BGP instances or an attempt
//! to disable ECMP are all rejected with a [`ConfigError`].

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
#![allow(clippy::struct_excessive_bools)]

pub mod addr;
pub mod bgp;
pub mod distance;
pub mod ecmp;
pub mod errors;
pub mod interface;
pub mod router;
pub mod staticroute;
pub mod tracecfg;
pub mod vrf;

pub use bgp::{BgpRouterConfig, EBGP_DEFAULT_DISTANCE, IBGP_DEFAULT_DISTANCE};
pub use distance::DistanceConfig;
pub use ecmp::EcmpConfig;
pub use errors::{ConfigError, ConfigResult, stringify}; // re-export
pub use interface::{InterfaceConfig, InterfaceConfigBuilder, InterfaceKind};
pub use router::RouterConfig;
pub use staticroute::{StaticNextHop, StaticRouteConfig};
pub use tracecfg::TracingConfig;
pub use vrf::{DEFAULT_VRF_ID, DEFAULT_VRF_NAME, VrfConfig};

use tracectl::trace_target;
trace_target!("config", LevelFilter::INFO, &["config"]);
