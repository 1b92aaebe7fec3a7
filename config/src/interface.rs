// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Interface configuration

use crate::errors::{ConfigError, ConfigResult};
use crate::vrf::DEFAULT_VRF_NAME;
use derive_builder::Builder;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    #[default]
    Ethernet,
    Loopback,
    Lag,
    Subinterface,
}

/// The configuration of an interface. N.B. we derive a builder type `InterfaceConfigBuilder`
/// that provides defaults for everything but the name and ifindex.
#[derive(Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    #[builder(setter(into))]
    pub name: String,

    pub ifindex: u32,

    #[builder(default)]
    #[serde(default)]
    pub kind: InterfaceKind,

    /// The LAG this interface is a member of
    #[builder(setter(into, strip_option), default)]
    #[serde(default)]
    pub lag: Option<String>,

    #[builder(default = true)]
    #[serde(default = "yes")]
    pub admin_up: bool,

    /// Routing (L3) mode. When false, the interface is bridged ("no routing").
    #[builder(default = true)]
    #[serde(default = "yes")]
    pub routing: bool,

    #[builder(setter(each(name = "address")), default)]
    #[serde(default)]
    pub addresses: Vec<IpNet>,

    #[builder(setter(into), default = DEFAULT_VRF_NAME.to_string())]
    #[serde(default = "default_vrf")]
    pub vrf: String,
}

fn yes() -> bool {
    true
}
fn default_vrf() -> String {
    DEFAULT_VRF_NAME.to_owned()
}

impl InterfaceConfig {
    /// Validate the addresses of this interface
    pub fn validate(&self) -> ConfigResult {
        for address in &self.addresses {
            check_interface_address(&self.name, address)?;
        }
        Ok(())
    }
}

/// Check that an address may be configured on an interface
pub fn check_interface_address(ifname: &str, address: &IpNet) -> ConfigResult {
    let reason = match address.addr() {
        IpAddr::V4(a) if a.is_multicast() => Some("multicast"),
        IpAddr::V4(a) if a.is_broadcast() => Some("broadcast"),
        IpAddr::V6(a) if a.is_multicast() => Some("multicast"),
        a if a.is_unspecified() => Some("unspecified"),
        _ => None,
    };
    match reason {
        Some(reason) => Err(ConfigError::BadInterfaceAddress(
            *address,
            ifname.to_owned(),
            reason,
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_builder() {
        let cfg = InterfaceConfigBuilder::default()
            .name("1")
            .ifindex(1)
            .address("1.1.1.1/24".parse::<IpNet>().unwrap())
            .address("2001::1/64".parse::<IpNet>().unwrap())
            .build()
            .unwrap();
        assert!(cfg.admin_up);
        assert!(cfg.routing);
        assert_eq!(cfg.kind, InterfaceKind::Ethernet);
        assert_eq!(cfg.vrf, DEFAULT_VRF_NAME);
        assert_eq!(cfg.addresses.len(), 2);
        assert_eq!(cfg.validate(), Ok(()));

        let bad = InterfaceConfigBuilder::default()
            .name("2")
            .ifindex(2)
            .address("224.0.0.1/24".parse::<IpNet>().unwrap())
            .build()
            .unwrap();
        assert!(bad.validate().is_err());

        assert!(InterfaceConfigBuilder::default().name("3").build().is_err());
    }
}
