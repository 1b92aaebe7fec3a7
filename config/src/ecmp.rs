// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! System-wide ECMP settings

use crate::errors::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcmpConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Upper bound on the next-hops installed for a prefix. None means no limit.
    #[serde(default)]
    pub max_paths: Option<u16>,
}

fn enabled() -> bool {
    true
}

impl Default for EcmpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_paths: None,
        }
    }
}

impl EcmpConfig {
    pub fn validate(&self) -> ConfigResult {
        if !self.enabled {
            return Err(ConfigError::EcmpDisabled);
        }
        if self.max_paths == Some(0) {
            return Err(ConfigError::BadMaxPaths);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecmp_cannot_be_disabled() {
        assert_eq!(EcmpConfig::default().validate(), Ok(()));
        let disabled = EcmpConfig {
            enabled: false,
            max_paths: None,
        };
        let err = disabled.validate().unwrap_err();
        assert_eq!(err.to_string(), "ECMP cannot be disabled");

        let zero = EcmpConfig {
            enabled: true,
            max_paths: Some(0),
        };
        assert_eq!(zero.validate(), Err(ConfigError::BadMaxPaths));
    }
}
