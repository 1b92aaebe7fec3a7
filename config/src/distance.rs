// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Administrative distance overrides

use serde::{Deserialize, Serialize};

/// Per-VRF overrides of the distance assigned by dynamic protocols to their routes.
/// Static routes carry their own distance and connected routes always use 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceConfig {
    #[serde(default)]
    pub ospf: Option<u8>,
    #[serde(default)]
    pub bgp: Option<u8>,
}

impl DistanceConfig {
    #[must_use]
    pub fn set_ospf(mut self, distance: u8) -> Self {
        self.ospf = Some(distance);
        self
    }
    #[must_use]
    pub fn set_bgp(mut self, distance: u8) -> Self {
        self.bgp = Some(distance);
        self
    }
}
