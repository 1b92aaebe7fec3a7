// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Selection of the active router-id of a VRF

use std::fmt::Display;
use std::net::Ipv4Addr;
use tracectl::trace_target;
use tracing::{debug, info};

trace_target!("router-id", LevelFilter::INFO, &["router-id"]);

/// An address that may become the router-id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RidCandidate {
    pub ifname: String,
    pub address: Ipv4Addr,
    pub loopback: bool,
}
impl RidCandidate {
    fn rank(&self) -> (bool, Ipv4Addr) {
        (self.loopback, self.address)
    }
}

/// Where the active router-id comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouterIdSource {
    Configured,
    Interface(String),
}

/// The router-id of a VRF. The automatic selection is sticky: once chosen, an address
/// remains the router-id while it is usable, unless a loopback address shows up and
/// the current one is not a loopback. A configured router-id overrides everything.
#[derive(Clone, Debug, Default)]
pub struct RouterIdSelector {
    configured: Option<Ipv4Addr>,
    active: Option<RidCandidate>,
}

impl RouterIdSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the configured router-id. Returns true if the router-id changed.
    pub fn set_configured(&mut self, router_id: Option<Ipv4Addr>) -> bool {
        let before = self.router_id();
        self.configured = router_id;
        before != self.router_id()
    }

    #[must_use]
    pub fn configured(&self) -> Option<Ipv4Addr> {
        self.configured
    }

    /// The automatically selected candidate
    #[must_use]
    pub fn active(&self) -> Option<&RidCandidate> {
        self.active.as_ref()
    }

    /// The router-id in use
    #[must_use]
    pub fn router_id(&self) -> Option<Ipv4Addr> {
        self.configured.or(self.active.as_ref().map(|c| c.address))
    }

    #[must_use]
    pub fn source(&self) -> Option<RouterIdSource> {
        if self.configured.is_some() {
            Some(RouterIdSource::Configured)
        } else {
            self.active
                .as_ref()
                .map(|c| RouterIdSource::Interface(c.ifname.clone()))
        }
    }

    /// Re-evaluate the automatic selection given the current candidates.
    /// Returns true if the router-id in use changed.
    pub fn update(&mut self, candidates: &[RidCandidate]) -> bool {
        let before = self.router_id();
        let still_there = self
            .active
            .as_ref()
            .is_some_and(|active| candidates.contains(active));
        let loopback_arrived = self.active.as_ref().is_some_and(|a| !a.loopback)
            && candidates.iter().any(|c| c.loopback);

        if !still_there || loopback_arrived {
            let best = candidates.iter().max_by_key(|c| c.rank()).cloned();
            if best != self.active {
                debug!(
                    "Automatic router-id: {} -> {}",
                    self.active
                        .as_ref()
                        .map_or("none".to_string(), |c| c.address.to_string()),
                    best.as_ref()
                        .map_or("none".to_string(), |c| c.address.to_string())
                );
            }
            self.active = best;
        }
        let changed = before != self.router_id();
        if changed {
            info!(
                "Active router-id is now {}",
                self.router_id()
                    .map_or("none".to_string(), |a| a.to_string())
            );
        }
        changed
    }
}

impl Display for RouterIdSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.router_id(), self.source()) {
            (Some(rid), Some(RouterIdSource::Configured)) => write!(f, "{rid} (configured)"),
            (Some(rid), Some(RouterIdSource::Interface(ifname))) => write!(f, "{rid} ({ifname})"),
            _ => write!(f, "none"),
        }
    }
}
