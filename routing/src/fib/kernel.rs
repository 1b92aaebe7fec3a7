// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Kernel routing table backends. A backend manages the routes of one network namespace.

use crate::prefix::Prefix;
use crate::rib::route::{FibNextHop, FibRoute, RouteOrigin};
use nix::errno::Errno;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

/// The operations on kernel routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KernelOp {
    Open,
    Observe,
    Install,
    Replace,
    Delete,
}
impl Display for KernelOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelOp::Open => write!(f, "open"),
            KernelOp::Observe => write!(f, "observe"),
            KernelOp::Install => write!(f, "install"),
            KernelOp::Replace => write!(f, "replace"),
            KernelOp::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("kernel route {op} failed: {errno}")]
pub struct KernelError {
    pub op: KernelOp,
    pub errno: Errno,
}

impl KernelError {
    #[must_use]
    pub fn new(op: KernelOp, errno: Errno) -> Self {
        Self { op, errno }
    }
    /// Tell if the failed operation is worth retrying right away
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.errno,
            Errno::EAGAIN | Errno::EINTR | Errno::EBUSY | Errno::ENOBUFS
        )
    }
}

/// A route as known to the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelRoute {
    pub prefix: Prefix,
    pub protocol: RouteOrigin,
    pub nexthops: Vec<FibNextHop>,
}

impl KernelRoute {
    /// Tell if two routes program the same forwarding. The kernel does not keep the
    /// order in which multipath next-hops were given.
    #[must_use]
    pub fn matches(&self, other: &KernelRoute) -> bool {
        if self.prefix != other.prefix
            || self.protocol != other.protocol
            || self.nexthops.len() != other.nexthops.len()
        {
            return false;
        }
        let mut mine: Vec<&FibNextHop> = self.nexthops.iter().collect();
        let mut theirs: Vec<&FibNextHop> = other.nexthops.iter().collect();
        mine.sort();
        theirs.sort();
        mine == theirs
    }
}

impl From<&FibRoute> for KernelRoute {
    fn from(route: &FibRoute) -> Self {
        Self {
            prefix: route.prefix,
            protocol: route.origin,
            nexthops: route.nhops.clone(),
        }
    }
}

fn fmt_nexthop(f: &mut std::fmt::Formatter<'_>, nh: &FibNextHop) -> std::fmt::Result {
    if let Some(gw) = nh.gateway {
        write!(f, "via {gw} ")?;
    }
    write!(f, "dev {}", nh.ifname)
}

impl Display for KernelRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.prefix.is_root() {
            write!(f, "default")?;
        } else if self.prefix.is_host() {
            write!(f, "{}", self.prefix.as_address())?;
        } else {
            write!(f, "{}", self.prefix)?;
        }
        match self.nexthops.as_slice() {
            [nh] => {
                write!(f, " ")?;
                fmt_nexthop(f, nh)?;
                write!(f, " proto {}", self.protocol)?;
                if nh.gateway.is_none() {
                    write!(f, " scope link")?;
                }
                Ok(())
            }
            nhops => {
                write!(f, " proto {}", self.protocol)?;
                for nh in nhops {
                    write!(f, "\n\tnexthop ")?;
                    fmt_nexthop(f, nh)?;
                    write!(f, " weight 1")?;
                }
                Ok(())
            }
        }
    }
}

/// The operations a kernel routing table backend provides. Mutations have
/// `ip route add|replace|del` semantics.
pub trait KernelRoutes: Send {
    /// The network namespace this backend operates in
    fn netns(&self) -> &str;
    /// Read the route for a prefix, if any
    fn observe(&self, prefix: &Prefix) -> Result<Option<KernelRoute>, KernelError>;
    /// Add a route. Fails with `EEXIST` if a route for the prefix exists.
    fn install(&mut self, route: &KernelRoute) -> Result<(), KernelError>;
    /// Atomically replace or create the route for a prefix
    fn replace(&mut self, route: &KernelRoute) -> Result<(), KernelError>;
    /// Delete the route for a prefix. Fails with `ESRCH` if there is none.
    fn delete(&mut self, prefix: &Prefix) -> Result<(), KernelError>;
    /// Read all routes
    fn routes(&self) -> Result<Vec<KernelRoute>, KernelError>;
}

/// Builds the kernel backends for the VRFs
pub trait KernelFactory: Send + Sync {
    fn kernel(&self, netns: &str) -> Result<Box<dyn KernelRoutes>, KernelError>;
}

#[derive(Debug, Default)]
struct MemKernelState {
    routes: BTreeMap<Prefix, KernelRoute>,
    mutations: u64,
    faults: BTreeMap<KernelOp, (Errno, usize)>,
}

impl MemKernelState {
    fn check_fault(&mut self, op: KernelOp) -> Result<(), KernelError> {
        let Some((errno, count)) = self.faults.get_mut(&op) else {
            return Ok(());
        };
        let errno = *errno;
        *count -= 1;
        if *count == 0 {
            self.faults.remove(&op);
        }
        warn!("Injected failure on kernel route {op}: {errno}");
        Err(KernelError::new(op, errno))
    }
}

/// An in-memory kernel routing table. Clones share the same table.
#[derive(Debug, Clone)]
pub struct MemKernel {
    netns: String,
    state: Arc<Mutex<MemKernelState>>,
}

impl MemKernel {
    #[must_use]
    pub fn new(netns: &str) -> Self {
        Self {
            netns: netns.to_owned(),
            state: Arc::new(Mutex::new(MemKernelState::default())),
        }
    }
    fn state(&self) -> std::sync::MutexGuard<'_, MemKernelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
    /// The number of successful mutations so far
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.state().mutations
    }
    /// Make the next `count` operations of some type fail with some error
    pub fn inject(&self, op: KernelOp, errno: Errno, count: usize) {
        if count > 0 {
            self.state().faults.insert(op, (errno, count));
        }
    }
    /// Number of routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().routes.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().routes.is_empty()
    }
    #[must_use]
    pub fn get(&self, prefix: &Prefix) -> Option<KernelRoute> {
        self.state().routes.get(prefix).cloned()
    }
}

impl KernelRoutes for MemKernel {
    fn netns(&self) -> &str {
        &self.netns
    }
    fn observe(&self, prefix: &Prefix) -> Result<Option<KernelRoute>, KernelError> {
        let mut state = self.state();
        state.check_fault(KernelOp::Observe)?;
        Ok(state.routes.get(prefix).cloned())
    }
    fn install(&mut self, route: &KernelRoute) -> Result<(), KernelError> {
        let mut state = self.state();
        state.check_fault(KernelOp::Install)?;
        if state.routes.contains_key(&route.prefix) {
            return Err(KernelError::new(KernelOp::Install, Errno::EEXIST));
        }
        debug!("[{}] ip route add {route}", self.netns);
        state.routes.insert(route.prefix, route.clone());
        state.mutations += 1;
        Ok(())
    }
    fn replace(&mut self, route: &KernelRoute) -> Result<(), KernelError> {
        let mut state = self.state();
        state.check_fault(KernelOp::Replace)?;
        debug!("[{}] ip route replace {route}", self.netns);
        state.routes.insert(route.prefix, route.clone());
        state.mutations += 1;
        Ok(())
    }
    fn delete(&mut self, prefix: &Prefix) -> Result<(), KernelError> {
        let mut state = self.state();
        state.check_fault(KernelOp::Delete)?;
        if state.routes.remove(prefix).is_none() {
            return Err(KernelError::new(KernelOp::Delete, Errno::ESRCH));
        }
        debug!("[{}] ip route del {prefix}", self.netns);
        state.mutations += 1;
        Ok(())
    }
    fn routes(&self) -> Result<Vec<KernelRoute>, KernelError> {
        Ok(self.state().routes.values().cloned().collect())
    }
}

/// Hands out in-memory kernels, one per network namespace. Asking twice for
/// the same namespace returns handles to the same table.
#[derive(Debug, Default)]
pub struct MemKernelFactory {
    kernels: Mutex<BTreeMap<String, MemKernel>>,
}

impl MemKernelFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Get the kernel of a namespace, creating it if needed
    #[must_use]
    pub fn get(&self, netns: &str) -> MemKernel {
        self.kernels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(netns.to_owned())
            .or_insert_with(|| MemKernel::new(netns))
            .clone()
    }
}

impl KernelFactory for MemKernelFactory {
    fn kernel(&self, netns: &str) -> Result<Box<dyn KernelRoutes>, KernelError> {
        Ok(Box::new(self.get(netns)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(prefix: &str, nhops: &[(Option<&str>, &str, u32)]) -> KernelRoute {
        KernelRoute {
            prefix: prefix.parse().unwrap(),
            protocol: RouteOrigin::Static,
            nexthops: nhops
                .iter()
                .map(|(gw, ifname, ifindex)| FibNextHop {
                    gateway: gw.map(|a| a.parse().unwrap()),
                    ifname: (*ifname).to_owned(),
                    ifindex: *ifindex,
                })
                .collect(),
        }
    }

    #[test]
    fn test_kernel_route_display() {
        let single = route("123.0.0.1/32", &[(Some("1.1.1.2"), "1", 1)]);
        assert_eq!(single.to_string(), "123.0.0.1 via 1.1.1.2 dev 1 proto static");

        let direct = route("10.0.0.0/8", &[(None, "2", 2)]);
        assert_eq!(direct.to_string(), "10.0.0.0/8 dev 2 proto static scope link");

        let multi = route("0.0.0.0/0", &[(Some("1.1.1.2"), "1", 1), (None, "2", 2)]);
        assert_eq!(
            multi.to_string(),
            "default proto static\n\tnexthop via 1.1.1.2 dev 1 weight 1\n\tnexthop dev 2 weight 1"
        );
    }

    #[test]
    fn test_mem_kernel() {
        let factory = MemKernelFactory::new();
        let mut kernel = factory.kernel("red").unwrap();
        let watcher = factory.get("red");
        let r = route("123.0.0.1/32", &[(Some("1.1.1.2"), "1", 1)]);

        assert_eq!(kernel.netns(), "red");
        assert_eq!(kernel.install(&r), Ok(()));
        assert_eq!(
            kernel.install(&r),
            Err(KernelError::new(KernelOp::Install, Errno::EEXIST))
        );
        assert_eq!(kernel.observe(&r.prefix), Ok(Some(r.clone())));
        assert_eq!(watcher.mutations(), 1);

        watcher.inject(KernelOp::Delete, Errno::EAGAIN, 1);
        let err = kernel.delete(&r.prefix).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(kernel.delete(&r.prefix), Ok(()));
        assert_eq!(
            kernel.delete(&r.prefix),
            Err(KernelError::new(KernelOp::Delete, Errno::ESRCH))
        );
        assert!(!KernelError::new(KernelOp::Delete, Errno::ESRCH).is_transient());
        assert_eq!(watcher.mutations(), 2);
        assert!(watcher.is_empty());
    }

    #[test]
    fn test_kernel_route_matches() {
        let r = route("0.0.0.0/0", &[(Some("1.1.1.2"), "1", 1), (None, "2", 2)]);
        let reordered = route("0.0.0.0/0", &[(None, "2", 2), (Some("1.1.1.2"), "1", 1)]);
        assert!(r.matches(&reordered));
        assert_ne!(r, reordered);

        let fewer = route("0.0.0.0/0", &[(None, "2", 2)]);
        assert!(!r.matches(&fewer));
        let mut other_proto = reordered.clone();
        other_proto.protocol = RouteOrigin::Bgp;
        assert!(!r.matches(&other_proto));
    }
}
