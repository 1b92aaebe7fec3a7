// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Link-time registry of tracing targets.
//!
//! Targets are declared where they are used, with [`trace_target!`] (the target is the
//! module path) or [`named_target!`] (the target is an arbitrary string). Declarations
//! end up in the [`TARGETS`] distributed slice, regardless of the crate they live in.

use crate::LevelFilter;
use linkme::distributed_slice;

/// A statically declared tracing target
pub struct TargetDecl {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
}
impl TargetDecl {
    #[must_use]
    pub const fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

#[distributed_slice]
pub static TARGETS: [TargetDecl];

#[doc(hidden)]
#[macro_export]
macro_rules! __target_imports {
    () => {
        use linkme::distributed_slice;
        use $crate::LevelFilter;
        use $crate::targets::{TARGETS, TargetDecl};
    };
}

/// Declare the tracing target of the current module, giving it a name,
/// a default level and a set of tags.
#[macro_export]
macro_rules! trace_target {
    // The anonymous const scope lets every invocation use the same static name
    // and keeps the imports local.
    ($name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            $crate::__target_imports!();

            #[distributed_slice(TARGETS)]
            static TARGET: TargetDecl = TargetDecl::new(module_path!(), $name, $level, $tags);
        };
    };
}

/// Declare a tracing target whose name is not a module path.
#[macro_export]
macro_rules! named_target {
    ($target:expr, $level:expr, $tags:expr) => {
        const _: () = {
            $crate::__target_imports!();

            #[distributed_slice(TARGETS)]
            static TARGET: TargetDecl = TargetDecl::new($target, $target, $level, $tags);
        };
    };
}
