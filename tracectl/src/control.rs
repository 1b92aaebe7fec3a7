// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing runtime control.

use ordermap::OrderMap;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::display::TargetsByTag;
use crate::errors::TraceCtlError;
use crate::targets::TARGETS;
use crate::trace_target;

trace_target!("tracectl", LevelFilter::INFO, &["config"]);

/// Level applied to targets without an explicit one
pub const DEFAULT_DEFAULT_LOGLEVEL: LevelFilter = LevelFilter::INFO;

/// Runtime configuration of a tracing target
#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub(crate) target: &'static str,
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: Vec<&'static str>,
}
impl TargetCfg {
    fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        // a target is always reachable by its own name
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        Self {
            target,
            name,
            level,
            tags,
        }
    }
    #[must_use]
    pub fn target(&self) -> &'static str {
        self.target
    }
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }
    #[must_use]
    pub fn tags(&self) -> &[&'static str] {
        &self.tags
    }
}

#[derive(Debug)]
pub(crate) struct TargetDb {
    pub(crate) default: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
    pub(crate) tags: OrderMap<&'static str, BTreeSet<&'static str>>,
}

impl TargetDb {
    fn new(default: LevelFilter) -> Self {
        let mut db = Self {
            default,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for decl in TARGETS {
            db.register(TargetCfg::new(decl.target, decl.name, decl.level, decl.tags));
        }
        db
    }
    fn register(&mut self, tcfg: TargetCfg) {
        let target = tcfg.target;
        for tag in &tcfg.tags {
            self.tags.entry(*tag).or_default().insert(target);
        }
        if self.targets.insert(target, tcfg).is_some() {
            warn!("Tracing target {target} is declared more than once");
        }
    }
    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(self.default.to_string());
        for tcfg in self.targets.values() {
            match format!("{}={}", tcfg.target, tcfg.level).parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => warn!("Skipping target {}: {e}", tcfg.target),
            }
        }
        filter
    }
    fn tagged_mut(&mut self, tag: &str) -> impl Iterator<Item = &mut TargetCfg> {
        let members = self.tags.get(tag).cloned().unwrap_or_default();
        self.targets
            .values_mut()
            .filter(move |tcfg| members.contains(tcfg.target))
    }
    fn tagged(&self, tag: &str) -> impl Iterator<Item = &TargetCfg> {
        let members = self.tags.get(tag);
        self.targets
            .values()
            .filter(move |tcfg| members.is_some_and(|m| m.contains(tcfg.target)))
    }
    /// A config string that, if applied, would produce the current levels
    fn as_config_string(&self) -> String {
        let mut out = format!("default={}", self.default);
        for tcfg in self.targets.values() {
            out += &format!(",{}={}", tcfg.name, tcfg.level);
        }
        out
    }
}

/// Parse a comma-separated list of `tag=level` items
pub fn parse_levels(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
    let mut levels = OrderMap::new();
    for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let Some((tag, level)) = item.split_once('=') else {
            return Err(TraceCtlError::Syntax(item.to_owned()));
        };
        let level = LevelFilter::from_str(level.trim())
            .map_err(|_| TraceCtlError::InvalidLevel(level.trim().to_owned()))?;
        levels.insert(tag.trim().to_owned(), level);
    }
    Ok(levels)
}

/// Owner of the tracing subscriber filter. Use [`get_trace_ctl`] to access it.
#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetDb>,
    reload: Option<reload::Handle<EnvFilter, Registry>>,
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the process-wide [`TracingControl`], installing the subscriber on first use
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(TracingControl::new)
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetDb::new(DEFAULT_DEFAULT_LOGLEVEL);
        let (filter, handle) = reload::Layer::new(db.env_filter());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_level(true);

        // somebody else may own the global subscriber (e.g. in tests)
        let reload = match tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
        {
            Ok(()) => Some(handle),
            Err(e) => {
                eprintln!("Tracing subscriber not installed: {e}");
                None
            }
        };
        Self {
            db: Mutex::new(db),
            reload,
        }
    }
    fn lock(&self) -> Result<MutexGuard<'_, TargetDb>, TraceCtlError> {
        self.db
            .lock()
            .map_err(|_| TraceCtlError::Unavailable("target database lock poisoned"))
    }
    fn reload(&self, db: &TargetDb) {
        if let Some(handle) = &self.reload
            && let Err(e) = handle.reload(db.env_filter())
        {
            error!("Failed to reload tracing filter: {e}");
        }
    }

    pub fn init() {
        get_trace_ctl();
    }

    /// Set the level of all targets carrying the given tag. Returns the number of targets changed.
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> Result<usize, TraceCtlError> {
        let mut db = self.lock()?;
        if !db.tags.contains_key(tag) {
            return Err(TraceCtlError::UnknownTag(tag.to_owned()));
        }
        let mut changed = 0;
        for tcfg in db.tagged_mut(tag).filter(|t| t.level != level) {
            tcfg.level = level;
            changed += 1;
        }
        if changed > 0 {
            self.reload(&db);
            info!("Log level for tag '{tag}' set to {level} ({changed} targets)");
        }
        Ok(changed)
    }
    pub fn set_level_all(&self, level: LevelFilter) -> Result<(), TraceCtlError> {
        let mut db = self.lock()?;
        db.targets.values_mut().for_each(|t| t.level = level);
        self.reload(&db);
        Ok(())
    }
    pub fn set_default_level(&self, level: LevelFilter) -> Result<(), TraceCtlError> {
        let mut db = self.lock()?;
        if db.default != level {
            db.default = level;
            info!("Default log level set to {level}");
            self.reload(&db);
        }
        Ok(())
    }
    pub fn default_level(&self) -> Result<LevelFilter, TraceCtlError> {
        Ok(self.lock()?.default)
    }

    /// Apply a string of comma-separated `tag=level` items. `default` sets the default level
    /// and `all` sets every target; other keys are tags and are applied last, in order.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let levels = parse_levels(input)?;
        self.setup(levels.iter().map(|(tag, level)| (tag.as_str(), *level)))
    }

    /// Apply levels from (tag, level) pairs, following the rules of [`Self::setup_from_string`]
    pub fn setup<'a>(
        &self,
        levels: impl IntoIterator<Item = (&'a str, LevelFilter)>,
    ) -> Result<(), TraceCtlError> {
        let levels: Vec<_> = levels.into_iter().collect();
        if let Some((_, level)) = levels.iter().find(|(tag, _)| *tag == "default") {
            self.set_default_level(*level)?;
        }
        if let Some((_, level)) = levels.iter().find(|(tag, _)| *tag == "all") {
            self.set_level_all(*level)?;
        }
        for (tag, level) in levels
            .iter()
            .filter(|(tag, _)| *tag != "default" && *tag != "all")
        {
            self.set_tag_level(tag, *level)?;
        }
        Ok(())
    }

    /// Check that all the given tags are known. `default` and `all` are always accepted.
    pub fn check_tags(&self, tags: &[&str]) -> Result<(), TraceCtlError> {
        let db = self.lock()?;
        match tags
            .iter()
            .find(|t| **t != "default" && **t != "all" && !db.tags.contains_key(**t))
        {
            Some(unknown) => Err(TraceCtlError::UnknownTag((*unknown).to_owned())),
            None => Ok(()),
        }
    }
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.lock().is_ok_and(|db| db.tags.contains_key(tag))
    }
    #[must_use]
    pub fn get_target(&self, target: &str) -> Option<TargetCfg> {
        self.lock().ok()?.targets.get(target).cloned()
    }
    #[must_use]
    pub fn get_targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        self.lock()
            .map(|db| db.tagged(tag).cloned().collect())
            .unwrap_or_default()
    }
    #[must_use]
    pub fn as_config_string(&self) -> String {
        self.lock()
            .map(|db| db.as_config_string())
            .unwrap_or_default()
    }
    /// Render the target table
    #[must_use]
    pub fn show(&self) -> String {
        self.lock().map(|db| db.to_string()).unwrap_or_default()
    }
    /// Render the targets grouped by tag
    #[must_use]
    pub fn show_by_tag(&self) -> String {
        self.lock()
            .map(|db| TargetsByTag(&db).to_string())
            .unwrap_or_default()
    }
}
