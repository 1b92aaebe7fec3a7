// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bounded event logs. The routing manager keeps one to record the things that
//! an operator may want to know about after the fact.

use crate::interfaces::tracker::IfChange;
use crate::prefix::Prefix;
use crate::rib::vrf::VrfId;
use chrono::DateTime;
use chrono::Local;
use std::fmt::Display;
use std::net::Ipv4Addr;

/// An `Event` is a wrapper over a generic type T that represents something that happened.
/// The only requirement for T is to implement `Display`.
pub struct Event<T>
where
    T: Display,
{
    code: T,
    ord: usize,
    time: DateTime<Local>,
}
impl<T: Display> Event<T> {
    pub(crate) fn new(code: T, ord: usize) -> Self {
        Self {
            code,
            ord,
            time: Local::now(),
        }
    }
    #[must_use]
    pub fn code(&self) -> &T {
        &self.code
    }
    #[must_use]
    pub fn ord(&self) -> usize {
        self.ord
    }
}

/// A structure to orderly store `Events`.
/// An `EventLog` has a maximum capacity (it's a circular buffer) and automatically
/// timestamps `Events`, preserving the order in which they were added.
pub struct EventLog<T: Display> {
    name: String,
    items: Vec<Event<T>>,
    count: usize,
    next: usize,
    max: usize,
    ord: usize,
}
impl<T: Display> EventLog<T> {
    #[must_use]
    pub fn new(name: &str, max: usize) -> Self {
        let max = max.max(1);
        Self {
            name: name.to_owned(),
            items: Vec::with_capacity(max),
            max,
            count: 0,
            next: 0,
            ord: 0,
        }
    }
    pub fn add(&mut self, code: T) {
        let event = Event::new(code, self.ord);
        if self.count < self.max {
            self.count += 1;
            self.items.push(event);
        } else {
            self.items[self.next] = event;
            self.next = (self.next + 1) % self.max;
        }
        self.ord += 1;
    }
    /// Number of events ever added
    #[must_use]
    pub fn generated(&self) -> usize {
        self.ord
    }
    /// Number of events stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
    /// The stored events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Event<T>> {
        (0..self.count).map(|num| &self.items[(self.next + num) % self.max])
    }
}
impl<T: Display> Display for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fmt_simple = "%Y-%m-%dT %H:%M:%S";
        let time = self.time.format(fmt_simple).to_string();
        write!(f, " {:<4} {}: {}", self.ord, time, self.code)
    }
}

impl<T: Display> Display for EventLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, " {}", self.name)?;
        writeln!(
            f,
            " generated: {} stored: {} capacity: {}",
            self.ord, self.count, self.max
        )?;
        writeln!(f, " ━━━━━━━━━━━━━")?;
        for event in self.iter() {
            writeln!(f, "{event}")?;
        }
        Ok(())
    }
}

/// The events recorded by the routing manager
#[derive(Clone, Debug, PartialEq)]
pub enum RibEvent {
    /// Some configuration was refused
    ConfigRejected(String),
    /// A prefix could not be synced to the kernel
    KernelSyncFailed { vrfid: VrfId, prefix: Prefix, error: String },
    /// Some interface changed in a way that matters to routing
    Interface(IfChange),
    RouterIdChanged { vrfid: VrfId, router_id: Option<Ipv4Addr> },
    VrfAdded(String),
    VrfRemoved(String),
}

impl Display for RibEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RibEvent::ConfigRejected(reason) => write!(f, "configuration rejected: {reason}"),
            RibEvent::KernelSyncFailed { vrfid, prefix, error } => {
                write!(f, "vrf {vrfid}: failed to sync {prefix}: {error}")
            }
            RibEvent::Interface(change) => write!(f, "{change}"),
            RibEvent::RouterIdChanged { vrfid, router_id } => match router_id {
                Some(rid) => write!(f, "vrf {vrfid}: router-id is now {rid}"),
                None => write!(f, "vrf {vrfid}: no router-id"),
            },
            RibEvent::VrfAdded(name) => write!(f, "vrf {name} added"),
            RibEvent::VrfRemoved(name) => write!(f, "vrf {name} removed"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_event_log_string() {
        let mut log = EventLog::new("TEST", 100);
        log.add("The system booted".to_string());
        log.add("A cable was unplugged".to_string());
        log.add("That thing got configured successfully".to_string());
        assert_eq!(log.len(), 3);
        assert_eq!(log.generated(), 3);
        let out = log.to_string();
        assert!(out.contains(" generated: 3 stored: 3 capacity: 100"));
        assert!(out.contains("A cable was unplugged"));
        println!("{log}");
    }

    #[test]
    fn test_event_log_with_loss() {
        let mut log = EventLog::new("TEST", 5);
        for n in 0..12 {
            log.add(format!("event {n}"));
        }
        assert_eq!(log.len(), 5);
        assert_eq!(log.generated(), 12);
        let kept: Vec<usize> = log.iter().map(Event::ord).collect();
        assert_eq!(kept, vec![7, 8, 9, 10, 11]);
        assert_eq!(log.iter().next().map(|e| e.code().as_str()), Some("event 7"));
    }

    #[test]
    fn test_rib_event_display() {
        let event = RibEvent::KernelSyncFailed {
            vrfid: 0,
            prefix: "10.0.0.0/8".parse().unwrap(),
            error: "EPERM".to_owned(),
        };
        assert_eq!(event.to_string(), "vrf 0: failed to sync 10.0.0.0/8: EPERM");
        let event = RibEvent::RouterIdChanged {
            vrfid: 1,
            router_id: None,
        };
        assert_eq!(event.to_string(), "vrf 1: no router-id");
    }
}
