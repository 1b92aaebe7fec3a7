// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Interfaces module

pub mod iftable;
pub mod interface;
pub mod tracker;

use tracectl::trace_target;
trace_target!("interfaces", LevelFilter::INFO, &["interfaces"]);
