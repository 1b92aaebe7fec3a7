// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! A table of interfaces

use crate::errors::RouterError;
use crate::interfaces::interface::{IfIndex, Interface};
use ahash::RandomState;
use std::collections::HashMap;
use tracing::{debug, error};

#[derive(Clone, Debug)]
/// A table of network interface objects, keyed by name
pub struct IfTable {
    by_name: HashMap<String, Interface, RandomState>,
}

#[allow(clippy::new_without_default)]
impl IfTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: HashMap::with_hasher(RandomState::with_seed(0)),
        }
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
    #[must_use]
    pub fn contains(&self, ifname: &str) -> bool {
        self.by_name.contains_key(ifname)
    }
    pub fn values(&self) -> impl Iterator<Item = &Interface> {
        self.by_name.values()
    }
    /// The interfaces sorted by name
    #[must_use]
    pub fn sorted(&self) -> Vec<&Interface> {
        let mut ifaces: Vec<&Interface> = self.by_name.values().collect();
        ifaces.sort_by(|a, b| a.name.cmp(&b.name));
        ifaces
    }

    /// Add an [`Interface`] to the table
    pub fn add_interface(&mut self, iface: Interface) -> Result<(), RouterError> {
        if self.contains(&iface.name) {
            error!("Failed to add interface {}: already exists!", iface.name);
            return Err(RouterError::InterfaceExists(iface.name));
        }
        if let Some(other) = self.get_by_index(iface.ifindex) {
            error!(
                "Failed to add interface {}: ifindex {} is used by {}",
                iface.name, iface.ifindex, other.name
            );
            return Err(RouterError::InterfaceExists(iface.name));
        }
        debug!(
            "Added interface {} with ifindex {} to the interface table",
            iface.name, iface.ifindex
        );
        self.by_name.insert(iface.name.clone(), iface);
        Ok(())
    }

    /// Remove an [`Interface`] from the table
    pub fn del_interface(&mut self, ifname: &str) -> Result<Interface, RouterError> {
        let iface = self
            .by_name
            .remove(ifname)
            .ok_or_else(|| RouterError::NoSuchInterface(ifname.to_owned()))?;
        debug!("Removed interface {ifname} from the interface table");
        Ok(iface)
    }

    #[must_use]
    pub fn get(&self, ifname: &str) -> Option<&Interface> {
        self.by_name.get(ifname)
    }
    pub fn get_mut(&mut self, ifname: &str) -> Result<&mut Interface, RouterError> {
        self.by_name
            .get_mut(ifname)
            .ok_or_else(|| RouterError::NoSuchInterface(ifname.to_owned()))
    }
    #[must_use]
    pub fn get_by_index(&self, ifindex: IfIndex) -> Option<&Interface> {
        self.by_name.values().find(|i| i.ifindex == ifindex)
    }
    /// The members of a LAG
    pub fn lag_members<'a>(&'a self, lag: &'a str) -> impl Iterator<Item = &'a Interface> + 'a {
        self.by_name
            .values()
            .filter(move |i| i.lag.as_deref() == Some(lag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::interface::IfKind;

    #[test]
    fn test_iftable_api() {
        let mut iftable = IfTable::new();
        iftable
            .add_interface(Interface::new("eth0", 2, IfKind::Ethernet))
            .unwrap();
        assert!(matches!(
            iftable.add_interface(Interface::new("eth0", 3, IfKind::Ethernet)),
            Err(RouterError::InterfaceExists(_))
        ));
        assert!(
            iftable
                .add_interface(Interface::new("eth1", 2, IfKind::Ethernet))
                .is_err()
        );
        let mut member = Interface::new("eth1", 3, IfKind::Ethernet);
        member.lag = Some("lag1".to_string());
        iftable.add_interface(member).unwrap();
        iftable
            .add_interface(Interface::new("lag1", 4, IfKind::Lag))
            .unwrap();

        assert_eq!(iftable.len(), 3);
        assert_eq!(iftable.get_by_index(3).map(|i| i.name.as_str()), Some("eth1"));
        assert_eq!(iftable.lag_members("lag1").count(), 1);
        let names: Vec<&str> = iftable.sorted().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eth0", "eth1", "lag1"]);

        iftable.del_interface("eth0").unwrap();
        assert_eq!(
            iftable.del_interface("eth0"),
            Err(RouterError::NoSuchInterface("eth0".to_string()))
        );
        assert!(iftable.get_mut("eth0").is_err());
    }
}
