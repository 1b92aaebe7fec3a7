// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Display implementations

use crate::control::{TargetCfg, TargetDb};
use std::fmt::Display;

macro_rules! TARGET_FMT {
    () => {
        " {:<40} │ {:>6} │ {}"
    };
}

impl Display for TargetCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            TARGET_FMT!(),
            self.target,
            self.level.to_string(),
            self.tags.join(",")
        )
    }
}

impl Display for TargetDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n ──────── Tracing targets ────────")?;
        writeln!(f, TARGET_FMT!(), "TARGET", "LEVEL", "TAGS")?;
        for tcfg in self.targets.values() {
            writeln!(f, "{tcfg}")?;
        }
        write!(f, TARGET_FMT!(), "(default)", self.default.to_string(), "--")
    }
}

pub(crate) struct TargetsByTag<'a>(pub(crate) &'a TargetDb);
impl Display for TargetsByTag<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let db = self.0;
        writeln!(f, "\n ──────── Tracing targets by tag ────────")?;
        for (tag, members) in &db.tags {
            writeln!(f, " {tag}:")?;
            for tcfg in db.targets.values().filter(|t| members.contains(t.target)) {
                writeln!(f, "     {:<40} : {}", tcfg.target, tcfg.level)?;
            }
        }
        Ok(())
    }
}
