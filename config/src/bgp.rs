// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! BGP router configuration, as seen by the RIB

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Default administrative distance of routes learnt from external peers
pub const EBGP_DEFAULT_DISTANCE: u8 = 20;
/// Default administrative distance of routes learnt from internal peers
pub const IBGP_DEFAULT_DISTANCE: u8 = 200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpRouterConfig {
    pub asn: u32,
    #[serde(default)]
    pub router_id: Option<Ipv4Addr>,
    /// Max number of BGP paths installed for a prefix
    #[serde(default = "default_maximum_paths")]
    pub maximum_paths: u16,
    #[serde(default = "default_ebgp_distance")]
    pub distance_ebgp: u8,
    #[serde(default = "default_ibgp_distance")]
    pub distance_ibgp: u8,
}

fn default_maximum_paths() -> u16 {
    1
}
fn default_ebgp_distance() -> u8 {
    EBGP_DEFAULT_DISTANCE
}
fn default_ibgp_distance() -> u8 {
    IBGP_DEFAULT_DISTANCE
}

impl BgpRouterConfig {
    #[must_use]
    pub fn new(asn: u32) -> Self {
        Self {
            asn,
            router_id: None,
            maximum_paths: default_maximum_paths(),
            distance_ebgp: EBGP_DEFAULT_DISTANCE,
            distance_ibgp: IBGP_DEFAULT_DISTANCE,
        }
    }
    #[must_use]
    pub fn set_router_id(mut self, router_id: Ipv4Addr) -> Self {
        self.router_id = Some(router_id);
        self
    }
    #[must_use]
    pub fn set_maximum_paths(mut self, maximum_paths: u16) -> Self {
        self.maximum_paths = maximum_paths;
        self
    }
    #[must_use]
    pub fn set_distances(mut self, ebgp: u8, ibgp: u8) -> Self {
        self.distance_ebgp = ebgp;
        self.distance_ibgp = ibgp;
        self
    }
    /// The distance of a route learnt from an internal or an external peer
    #[must_use]
    pub fn distance(&self, ibgp: bool) -> u8 {
        if ibgp {
            self.distance_ibgp
        } else {
            self.distance_ebgp
        }
    }
    pub fn validate(&self) -> ConfigResult {
        if self.asn == 0 {
            return Err(ConfigError::BadAsn(self.asn));
        }
        if self.maximum_paths == 0 {
            return Err(ConfigError::BadMaxPaths);
        }
        if self.distance_ebgp == 0 || self.distance_ibgp == 0 {
            return Err(ConfigError::BadDistance(0));
        }
        if let Some(rid) = self.router_id
            && (rid.is_unspecified() || rid.is_multicast() || rid.is_broadcast())
        {
            return Err(ConfigError::BadRouterId(IpAddr::V4(rid)));
        }
        Ok(())
    }
}

/// Only one BGP instance (ASN) may exist per VRF. Reconfiguring the same ASN is allowed.
pub fn check_bgp_instance(
    existing: Option<&BgpRouterConfig>,
    new: &BgpRouterConfig,
) -> ConfigResult {
    match existing {
        Some(current) if current.asn != new.asn => Err(ConfigError::DuplicateBgpAsn(current.asn)),
        _ => new.validate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_asn_per_vrf() {
        let bgp1 = BgpRouterConfig::new(1);
        assert_eq!(check_bgp_instance(None, &bgp1), Ok(()));
        assert_eq!(check_bgp_instance(Some(&bgp1), &bgp1.clone().set_maximum_paths(4)), Ok(()));

        let err = check_bgp_instance(Some(&bgp1), &BgpRouterConfig::new(2)).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateBgpAsn(1));
        assert_eq!(err.to_string(), "Another BGP with ASN 1 already exists");
    }

    #[test]
    fn test_bgp_validation() {
        assert!(BgpRouterConfig::new(0).validate().is_err());
        assert!(BgpRouterConfig::new(65000).set_maximum_paths(0).validate().is_err());
        assert!(
            BgpRouterConfig::new(65000)
                .set_router_id(Ipv4Addr::UNSPECIFIED)
                .validate()
                .is_err()
        );
        assert!(
            BgpRouterConfig::new(65000)
                .set_router_id(Ipv4Addr::new(9, 0, 0, 1))
                .validate()
                .is_ok()
        );
        assert_eq!(
            BgpRouterConfig::new(65000).set_distances(0, 200).validate(),
            Err(ConfigError::BadDistance(0))
        );
    }

    #[test]
    fn test_bgp_distances() {
        let bgp = BgpRouterConfig::new(65000);
        assert_eq!(bgp.distance(false), EBGP_DEFAULT_DISTANCE);
        assert_eq!(bgp.distance(true), IBGP_DEFAULT_DISTANCE);

        let bgp: BgpRouterConfig = serde_yaml_ng::from_str("asn: 65000\ndistance_ibgp: 150\n").unwrap();
        assert_eq!((bgp.distance(false), bgp.distance(true)), (20, 150));
        assert_eq!(bgp.maximum_paths, 1);
    }
}
