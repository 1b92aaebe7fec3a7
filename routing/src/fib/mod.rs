// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The Fib module

pub mod fibtype;
pub mod kernel;
pub mod netlink;
pub mod sync;

use tracectl::trace_target;
trace_target!("fib", LevelFilter::INFO, &["fib", "kernel"]);
