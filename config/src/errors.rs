// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Type for configuration / validation failures.
//! Any validation performed in this crate reports a `ConfigError`.

use ipnet::IpNet;
use std::net::IpAddr;
use thiserror::Error;
use tracectl::TraceCtlError;

/// The reasons why we may reject a configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    // prefixes and next-hops
    #[error("Prefix '{0}' has no mask length")]
    MissingMask(String),
    #[error("Malformed prefix '{0}'")]
    BadPrefix(String),
    #[error("Malformed next-hop '{0}'")]
    BadNextHop(String),
    #[error("Prefix {0} is a {1} address")]
    ReservedPrefix(IpNet, &'static str),
    #[error("Next-hop {0} is a {1} address")]
    ReservedNextHop(IpAddr, &'static str),
    #[error("Next-hop {0} is a local address")]
    LocalNextHop(IpAddr),
    #[error("Next-hop {0} and prefix {1} belong to different address families")]
    FamilyMismatch(IpAddr, IpNet),
    #[error("Link-local next-hop {0} requires an interface")]
    LinkLocalWithoutInterface(IpAddr),
    #[error("Administrative distance {0} out of range [1, 255]")]
    BadDistance(u16),

    // conflicts
    #[error("Another BGP with ASN {0} already exists")]
    DuplicateBgpAsn(u32),
    #[error("Invalid ASN {0}")]
    BadAsn(u32),
    #[error("ECMP cannot be disabled")]
    EcmpDisabled,
    #[error("Maximum paths must be at least 1")]
    BadMaxPaths,
    #[error("A VRF with name '{0}' already exists")]
    DuplicateVrfName(String),
    #[error("A VRF with id {0} already exists")]
    DuplicateVrfId(u32),
    #[error("No VRF named '{0}'")]
    NoSuchVrf(String),
    #[error("An interface with name '{0}' already exists")]
    DuplicateInterfaceName(String),
    #[error("An interface with ifindex {0} already exists")]
    DuplicateIfindex(u32),
    #[error("Interface '{0}' refers to unknown LAG '{1}'")]
    NoSuchLag(String, String),
    #[error("Address {0} of interface '{1}' is invalid: {2}")]
    BadInterfaceAddress(IpNet, String, &'static str),
    #[error("Router-id {0} is invalid")]
    BadRouterId(IpAddr),

    // others
    #[error("Tracing: {0}")]
    Tracing(#[from] TraceCtlError),
    #[error("Could not parse configuration: {0}")]
    Parse(String),
}

/// Result-like type for configurations
pub type ConfigResult = Result<(), ConfigError>;

#[must_use]
pub fn stringify(conf_result: &ConfigResult) -> String {
    match conf_result {
        Ok(()) => "Ok".to_string(),
        Err(e) => format!("FAILED: {e}"),
    }
}
