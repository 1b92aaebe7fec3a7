// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! VRF configuration

use crate::bgp::{BgpRouterConfig, check_bgp_instance};
use crate::distance::DistanceConfig;
use crate::errors::{ConfigError, ConfigResult};
use crate::staticroute::StaticRouteConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

pub const DEFAULT_VRF_NAME: &str = "vrf_default";
pub const DEFAULT_VRF_ID: u32 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfConfig {
    pub name: String,
    pub id: u32,
    /// Network namespace where the kernel routes of this VRF live
    #[serde(default)]
    pub netns: Option<String>,
    /// Statically configured router-id. Overrides the automatic selection.
    #[serde(default)]
    pub router_id: Option<Ipv4Addr>,
    #[serde(default)]
    pub bgp: Option<BgpRouterConfig>,
    #[serde(default)]
    pub distance: DistanceConfig,
    #[serde(default)]
    pub static_routes: Vec<StaticRouteConfig>,
}

impl VrfConfig {
    #[must_use]
    pub fn new(name: &str, id: u32) -> Self {
        Self {
            name: name.to_owned(),
            id,
            netns: None,
            router_id: None,
            bgp: None,
            distance: DistanceConfig::default(),
            static_routes: vec![],
        }
    }
    #[must_use]
    pub fn new_default() -> Self {
        Self::new(DEFAULT_VRF_NAME, DEFAULT_VRF_ID)
    }
    #[must_use]
    pub fn set_netns(mut self, netns: &str) -> Self {
        self.netns = Some(netns.to_owned());
        self
    }
    #[must_use]
    pub fn set_router_id(mut self, router_id: Ipv4Addr) -> Self {
        self.router_id = Some(router_id);
        self
    }
    #[must_use]
    pub fn set_distance(mut self, distance: DistanceConfig) -> Self {
        self.distance = distance;
        self
    }
    #[must_use]
    pub fn add_static_route(mut self, route: StaticRouteConfig) -> Self {
        self.static_routes.push(route);
        self
    }
    /// Configure the BGP router of this VRF. Fails if another ASN is configured.
    pub fn set_bgp(&mut self, bgp: BgpRouterConfig) -> ConfigResult {
        check_bgp_instance(self.bgp.as_ref(), &bgp)?;
        self.bgp = Some(bgp);
        Ok(())
    }

    /// Validate the VRF config given the addresses of its interfaces
    pub fn validate(&self, local_addresses: &[IpAddr]) -> ConfigResult {
        debug!("Validating config of VRF {}...", self.name);
        if let Some(rid) = self.router_id
            && (rid.is_unspecified() || rid.is_multicast() || rid.is_broadcast())
        {
            return Err(ConfigError::BadRouterId(IpAddr::V4(rid)));
        }
        if let Some(bgp) = &self.bgp {
            bgp.validate()?;
        }
        for distance in [self.distance.ospf, self.distance.bgp].into_iter().flatten() {
            if distance == 0 {
                return Err(ConfigError::BadDistance(0));
            }
        }
        for route in &self.static_routes {
            route.validate(local_addresses)?;
        }
        Ok(())
    }
}
