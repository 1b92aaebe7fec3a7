// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The top-level configuration of the rib daemon

use crate::ecmp::EcmpConfig;
use crate::errors::{ConfigError, ConfigResult};
use crate::interface::{InterfaceConfig, InterfaceKind};
use crate::tracecfg::TracingConfig;
use crate::vrf::{DEFAULT_VRF_ID, DEFAULT_VRF_NAME, VrfConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use tracing::{debug, error};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub vrfs: Vec<VrfConfig>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    #[serde(default)]
    pub ecmp: EcmpConfig,
    #[serde(default)]
    pub tracing: Option<TracingConfig>,
}

impl RouterConfig {
    /// Load a configuration from YAML. The result is not validated.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The addresses of the interfaces attached to a VRF
    #[must_use]
    pub fn local_addresses(&self, vrf: &str) -> Vec<IpAddr> {
        self.interfaces
            .iter()
            .filter(|i| i.vrf == vrf)
            .flat_map(|i| i.addresses.iter().map(ipnet::IpNet::addr))
            .collect()
    }

    fn validate_vrfs(&self) -> ConfigResult {
        let mut names = BTreeSet::new();
        let mut ids = BTreeSet::new();
        for vrf in &self.vrfs {
            if !names.insert(vrf.name.as_str()) {
                return Err(ConfigError::DuplicateVrfName(vrf.name.clone()));
            }
            if !ids.insert(vrf.id) {
                return Err(ConfigError::DuplicateVrfId(vrf.id));
            }
            // the default VRF always exists and is the only one with id 0
            let is_default = vrf.name == DEFAULT_VRF_NAME;
            if is_default != (vrf.id == DEFAULT_VRF_ID) {
                return Err(if is_default {
                    ConfigError::DuplicateVrfName(vrf.name.clone())
                } else {
                    ConfigError::DuplicateVrfId(vrf.id)
                });
            }
            vrf.validate(&self.local_addresses(&vrf.name))?;
        }
        Ok(())
    }

    fn validate_interfaces(&self) -> ConfigResult {
        let mut names = BTreeMap::new();
        let mut ifindexes = BTreeSet::new();
        for iface in &self.interfaces {
            if names.insert(iface.name.as_str(), iface.kind).is_some() {
                return Err(ConfigError::DuplicateInterfaceName(iface.name.clone()));
            }
            if !ifindexes.insert(iface.ifindex) {
                return Err(ConfigError::DuplicateIfindex(iface.ifindex));
            }
            if iface.vrf != DEFAULT_VRF_NAME && !self.vrfs.iter().any(|v| v.name == iface.vrf) {
                return Err(ConfigError::NoSuchVrf(iface.vrf.clone()));
            }
            iface.validate()?;
        }
        for iface in &self.interfaces {
            if let Some(lag) = &iface.lag
                && names.get(lag.as_str()) != Some(&InterfaceKind::Lag)
            {
                return Err(ConfigError::NoSuchLag(iface.name.clone(), lag.clone()));
            }
        }
        Ok(())
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> ConfigResult {
        debug!("Validating router configuration...");
        let result = self
            .ecmp
            .validate()
            .and_then(|()| self.validate_interfaces())
            .and_then(|()| self.validate_vrfs())
            .and_then(|()| self.tracing.as_ref().map_or(Ok(()), TracingConfig::validate));
        if let Err(e) = &result {
            error!("Configuration is invalid: {e}");
        }
        result
    }
}
