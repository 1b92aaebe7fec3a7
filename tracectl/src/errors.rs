// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Errors when controlling tracing

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceCtlError {
    #[error("Invalid syntax '{0}': expected tag=level")]
    Syntax(String),

    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("Unknown tag '{0}'")]
    UnknownTag(String),

    #[error("Tracing control is unavailable: {0}")]
    Unavailable(&'static str),
}
