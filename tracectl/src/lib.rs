// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Runtime control of the tracing targets declared by the rib daemon crates.
//!
//! Every module declares its target with [`trace_target!`], optionally with a set of tags
//! (e.g. `rib`, `fib`, `kernel`). Targets are collected at link time and their levels can
//! be changed at runtime, by tag, through the [`TracingControl`] singleton.

pub mod control;
pub mod display;
pub mod errors;
pub mod targets;

// re-exports
pub use control::DEFAULT_DEFAULT_LOGLEVEL;
pub use control::TracingControl;
pub use control::get_trace_ctl;
pub use control::parse_levels;
pub use errors::TraceCtlError;
pub use tracing_subscriber::filter::LevelFilter;
