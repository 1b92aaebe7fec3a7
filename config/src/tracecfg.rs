// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing configuration

use crate::{ConfigError, ConfigResult};
use ordermap::OrderMap;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracectl::{DEFAULT_DEFAULT_LOGLEVEL, LevelFilter, get_trace_ctl, parse_levels};
use tracing::debug;

/// Default log level and per-tag levels. It (de)serializes as a string of the form
/// `default=info,rib=debug,kernel=warn`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TracingConfig {
    pub default: LevelFilter,
    pub tags: OrderMap<String, LevelFilter>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default: DEFAULT_DEFAULT_LOGLEVEL,
            tags: OrderMap::new(),
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new(default: LevelFilter) -> Self {
        Self {
            default,
            tags: OrderMap::new(),
        }
    }
    pub fn add_tag(&mut self, tag: &str, level: LevelFilter) {
        let _ = self.tags.insert(tag.to_string(), level);
    }
    /// Check that all tags are known to the tracing control
    pub fn validate(&self) -> ConfigResult {
        debug!("Validating tracing configuration..");
        let tags: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        Ok(get_trace_ctl().check_tags(&tags)?)
    }
    /// Apply this configuration
    pub fn apply(&self) -> ConfigResult {
        let tctl = get_trace_ctl();
        tctl.set_default_level(self.default)?;
        tctl.setup(self.tags.iter().map(|(tag, level)| (tag.as_str(), *level)))?;
        Ok(())
    }
}

impl TryFrom<String> for TracingConfig {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut levels = parse_levels(&value)?;
        let default = levels.remove("default").unwrap_or(DEFAULT_DEFAULT_LOGLEVEL);
        Ok(Self {
            default,
            tags: levels,
        })
    }
}

impl From<TracingConfig> for String {
    fn from(value: TracingConfig) -> Self {
        value.to_string()
    }
}

impl Display for TracingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "default={}", self.default)?;
        for (tag, level) in &self.tags {
            write!(f, ",{tag}={level}")?;
        }
        Ok(())
    }
}
