// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Vrf table module that stores multiple vrfs. Every vrf is uniquely identified by a vrfid
//! and by its name.

use super::vrf::{Vrf, VrfId};
use crate::errors::RouterError;
use ahash::RandomState;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

pub struct VrfTable {
    by_id: HashMap<VrfId, Arc<RwLock<Vrf>>, RandomState>,
    by_name: HashMap<String, VrfId, RandomState>,
}

#[allow(clippy::new_without_default)]
#[allow(clippy::len_without_is_empty)]
impl VrfTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: HashMap::with_hasher(RandomState::with_seed(0)),
            by_name: HashMap::with_hasher(RandomState::with_seed(0)),
        }
    }

    //////////////////////////////////////////////////////////////////
    /// Store a [`Vrf`]. Its id and name must not be in use.
    //////////////////////////////////////////////////////////////////
    pub fn add_vrf(&mut self, vrf: Vrf) -> Result<Arc<RwLock<Vrf>>, RouterError> {
        if self.by_id.contains_key(&vrf.vrfid) {
            error!("Failed to add VRF with id {}: a VRF with that id already exists", vrf.vrfid);
            return Err(RouterError::VrfExists(vrf.vrfid));
        }
        if self.by_name.contains_key(&vrf.name) {
            error!("Failed to add VRF {}: a VRF with that name already exists", vrf.name);
            return Err(RouterError::VrfNameExists(vrf.name.clone()));
        }
        debug!("Adding VRF {} with id {}", vrf.name, vrf.vrfid);
        self.by_name.insert(vrf.name.clone(), vrf.vrfid);
        let vrfid = vrf.vrfid;
        let vrf = Arc::new(RwLock::new(vrf));
        self.by_id.insert(vrfid, vrf.clone());
        Ok(vrf)
    }

    //////////////////////////////////////////////////////////////////
    /// Remove the [`Vrf`] with the given id
    //////////////////////////////////////////////////////////////////
    pub fn remove_vrf(&mut self, vrfid: VrfId) -> Result<Arc<RwLock<Vrf>>, RouterError> {
        let vrf = self
            .by_id
            .remove(&vrfid)
            .ok_or(RouterError::NoSuchVrf(vrfid.to_string()))?;
        self.by_name.retain(|_, id| *id != vrfid);
        debug!("Removed VRF with id {vrfid}");
        Ok(vrf)
    }

    //////////////////////////////////////////////////////////////////
    /// Get the [`Vrf`] with the given id
    //////////////////////////////////////////////////////////////////
    pub fn get_vrf(&self, vrfid: VrfId) -> Result<&Arc<RwLock<Vrf>>, RouterError> {
        self.by_id
            .get(&vrfid)
            .ok_or(RouterError::NoSuchVrf(vrfid.to_string()))
    }

    //////////////////////////////////////////////////////////////////
    /// Get the id of the [`Vrf`] with the given name
    //////////////////////////////////////////////////////////////////
    pub fn get_vrfid_by_name(&self, name: &str) -> Result<VrfId, RouterError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RouterError::NoSuchVrf(name.to_owned()))
    }

    pub fn get_vrf_by_name(&self, name: &str) -> Result<&Arc<RwLock<Vrf>>, RouterError> {
        self.get_vrf(self.get_vrfid_by_name(name)?)
    }

    #[must_use]
    pub fn contains(&self, vrfid: VrfId) -> bool {
        self.by_id.contains_key(&vrfid)
    }

    //////////////////////////////////////////////////////////////////
    /// Ids of all the [`Vrf`]s, sorted
    //////////////////////////////////////////////////////////////////
    #[must_use]
    pub fn vrfids(&self) -> Vec<VrfId> {
        let mut ids: Vec<VrfId> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    //////////////////////////////////////////////////////////////////
    /// Iterate over all the [`Vrf`]s, sorted by id
    //////////////////////////////////////////////////////////////////
    pub fn values(&self) -> impl Iterator<Item = &Arc<RwLock<Vrf>>> {
        self.vrfids().into_iter().filter_map(|id| self.by_id.get(&id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}
