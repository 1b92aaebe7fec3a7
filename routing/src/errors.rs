// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by this library.

use crate::fib::kernel::KernelError;
use crate::prefix::{Prefix, PrefixError};
use crate::rib::vrf::VrfId;
use config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RouterError {
    #[error("No interface named '{0}'")]
    NoSuchInterface(String),

    #[error("An interface named '{0}' already exists")]
    InterfaceExists(String),

    #[error("No such VRF: {0}")]
    NoSuchVrf(String),

    #[error("A VRF with id {0} already exists")]
    VrfExists(VrfId),

    #[error("A VRF named '{0}' already exists")]
    VrfNameExists(String),

    #[error("The default VRF cannot be removed")]
    DefaultVrf,

    #[error("VRF {0} has interfaces attached")]
    VrfBusy(String),

    #[error("No such route: {0}")]
    NoSuchRoute(Prefix),

    #[error("Route for {0} does not belong to VRF {1}")]
    VrfMismatch(Prefix, VrfId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Invalid prefix: {0}")]
    InvalidPrefix(#[from] PrefixError),

    #[error("Failed to sync {0} to kernel: {1}")]
    KernelSync(Prefix, KernelError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),

    #[error("Internal error: {0}")]
    Internal(&'static str),
}
