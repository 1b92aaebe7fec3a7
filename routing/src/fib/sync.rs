// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Synchronization of the routes selected in a RIB into the kernel and the FIB mirror

use crate::errors::RouterError;
use crate::fib::fibtype::{FibReaderFactory, FibWriter};
use crate::fib::kernel::{KernelError, KernelOp, KernelRoute, KernelRoutes};
use crate::prefix::Prefix;
use crate::rib::route::{FibRoute, RibDelta};
use crate::rib::vrf::VrfId;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How transient kernel errors are retried: up to `attempts` tries, doubling the
/// delay between consecutive tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(1),
        }
    }
}

/// What was done to the kernel to apply a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Noop,
    Installed,
    Replaced,
    Deleted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub installed: u64,
    pub replaced: u64,
    pub deleted: u64,
    pub noops: u64,
    pub retries: u64,
    pub failures: u64,
}

/// Keeps the kernel routes of a VRF and its FIB in line with the routes selected in its RIB.
/// The FIB only reflects what the kernel accepted. Prefixes that could not be synced stay
/// pending, with the state they should have, until some later sync succeeds.
pub struct FibSync {
    vrfid: VrfId,
    kernel: Box<dyn KernelRoutes>,
    fibw: FibWriter,
    pending: BTreeMap<Prefix, Option<FibRoute>>,
    retry: RetryPolicy,
    stats: SyncStats,
}

impl FibSync {
    #[must_use]
    pub fn new(vrfid: VrfId, kernel: Box<dyn KernelRoutes>, retry: RetryPolicy) -> Self {
        let (fibw, _) = FibWriter::new(vrfid);
        Self {
            vrfid,
            kernel,
            fibw,
            pending: BTreeMap::new(),
            retry,
            stats: SyncStats::default(),
        }
    }
    #[must_use]
    pub fn netns(&self) -> &str {
        self.kernel.netns()
    }
    #[must_use]
    pub fn reader_factory(&self) -> FibReaderFactory {
        self.fibw.factory()
    }
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }
    /// The prefixes that failed to sync, with their desired state
    pub fn pending(&self) -> impl Iterator<Item = (&Prefix, &Option<FibRoute>)> {
        self.pending.iter()
    }
    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }

    /// Run a kernel operation, retrying it on transient errors
    fn with_retry<T, F>(&mut self, op: KernelOp, mut f: F) -> Result<T, KernelError>
    where
        F: FnMut(&mut dyn KernelRoutes) -> Result<T, KernelError>,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;
        loop {
            match f(self.kernel.as_mut()) {
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    debug!("Kernel {op} attempt {attempt} failed: {e}. Retrying in {delay:?}");
                    self.stats.retries += 1;
                    std::thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Make the kernel route for a prefix match the desired one, comparing against
    /// what the kernel has so that nothing is done if it already matches.
    fn sync_kernel(
        &mut self,
        prefix: Prefix,
        desired: Option<&FibRoute>,
    ) -> Result<SyncOutcome, KernelError> {
        let observed = self.with_retry(KernelOp::Observe, |k| k.observe(&prefix))?;
        let wanted = desired.map(KernelRoute::from);
        match (observed, wanted) {
            (None, None) => Ok(SyncOutcome::Noop),
            (Some(observed), Some(wanted)) if observed.matches(&wanted) => Ok(SyncOutcome::Noop),
            (None, Some(wanted)) => {
                self.with_retry(KernelOp::Install, |k| k.install(&wanted))?;
                Ok(SyncOutcome::Installed)
            }
            (Some(_), Some(wanted)) => {
                self.with_retry(KernelOp::Replace, |k| k.replace(&wanted))?;
                Ok(SyncOutcome::Replaced)
            }
            (Some(_), None) => {
                self.with_retry(KernelOp::Delete, |k| k.delete(&prefix))?;
                Ok(SyncOutcome::Deleted)
            }
        }
    }

    fn update_fib(&mut self, prefix: Prefix, desired: Option<FibRoute>) {
        let current = self
            .fibw
            .enter()
            .and_then(|fib| fib.get(&prefix).cloned());
        if current == desired {
            return;
        }
        match desired {
            Some(route) => self.fibw.add_route(route),
            None => self.fibw.del_route(prefix),
        }
    }

    fn sync(&mut self, prefix: Prefix, desired: Option<FibRoute>) -> Result<SyncOutcome, RouterError> {
        match self.sync_kernel(prefix, desired.as_ref()) {
            Ok(outcome) => {
                match outcome {
                    SyncOutcome::Noop => self.stats.noops += 1,
                    SyncOutcome::Installed => self.stats.installed += 1,
                    SyncOutcome::Replaced => self.stats.replaced += 1,
                    SyncOutcome::Deleted => self.stats.deleted += 1,
                }
                self.pending.remove(&prefix);
                self.update_fib(prefix, desired);
                Ok(outcome)
            }
            Err(e) => {
                error!("Vrf {}: failed to sync {prefix} to kernel: {e}", self.vrfid);
                self.stats.failures += 1;
                self.pending.insert(prefix, desired);
                Err(RouterError::KernelSync(prefix, e))
            }
        }
    }

    fn retry_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        info!("Vrf {}: retrying {} pending prefixes", self.vrfid, self.pending.len());
        for (prefix, desired) in std::mem::take(&mut self.pending) {
            if let Err(e) = self.sync(prefix, desired) {
                warn!("{e}");
            }
        }
    }

    /// Apply a delta to the kernel and the FIB. Pending prefixes are retried first.
    pub fn apply(&mut self, delta: &RibDelta) -> Result<SyncOutcome, RouterError> {
        self.retry_pending();
        if delta.is_unchanged() {
            return Ok(SyncOutcome::Noop);
        }
        debug!("Vrf {}: applying {delta}", self.vrfid);
        // a pending entry for this prefix is superseded by the delta
        self.pending.remove(&delta.prefix());
        self.sync(delta.prefix(), delta.desired().cloned())
    }

    /// Retry the pending prefixes. Returns how many remain pending.
    pub fn resync(&mut self) -> usize {
        self.retry_pending();
        self.pending.len()
    }

    /// Read back the kernel routes
    pub fn dump(&self) -> Result<Vec<KernelRoute>, KernelError> {
        self.kernel.routes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fib::kernel::MemKernel;
    use crate::rib::route::{FibNextHop, RouteOrigin};
    use nix::errno::Errno;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn route(nhops: &[&str]) -> FibRoute {
        FibRoute {
            prefix: "123.0.0.1/32".parse().unwrap(),
            origin: RouteOrigin::Static,
            distance: 1,
            metric: 0,
            nhops: nhops
                .iter()
                .map(|gw| FibNextHop {
                    gateway: Some(gw.parse().unwrap()),
                    ifname: "1".to_string(),
                    ifindex: 1,
                })
                .collect(),
        }
    }

    fn fibsync() -> (FibSync, MemKernel) {
        let kernel = MemKernel::new("default");
        let sync = FibSync::new(0, Box::new(kernel.clone()), RetryPolicy::default());
        (sync, kernel)
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (mut sync, kernel) = fibsync();
        let reader = sync.reader_factory().handle();
        let delta = RibDelta::Add(route(&["1.1.1.2", "1.1.1.3"]));

        assert_eq!(sync.apply(&delta), Ok(SyncOutcome::Installed));
        assert_eq!(kernel.mutations(), 1);
        assert_eq!(sync.apply(&delta), Ok(SyncOutcome::Noop));
        assert_eq!(kernel.mutations(), 1);
        assert_eq!(reader.get(&delta.prefix()), Some(route(&["1.1.1.2", "1.1.1.3"])));

        let remove = RibDelta::Remove(route(&["1.1.1.2", "1.1.1.3"]));
        assert_eq!(sync.apply(&remove), Ok(SyncOutcome::Deleted));
        assert_eq!(sync.apply(&remove), Ok(SyncOutcome::Noop));
        assert_eq!(kernel.mutations(), 2);
        assert!(reader.is_empty());
        assert_eq!(sync.stats().noops, 2);
    }

    #[test]
    fn test_nexthop_subset_replaced_in_place() {
        let (mut sync, kernel) = fibsync();
        let old = route(&["1.1.1.2", "1.1.1.3", "1.1.1.4"]);
        let new = route(&["1.1.1.2", "1.1.1.4"]);
        sync.apply(&RibDelta::Add(old.clone())).unwrap();

        // deleting the route would fail: a replace must not delete
        kernel.inject(KernelOp::Delete, Errno::EPERM, 1);
        let delta = RibDelta::Replace { old, new: new.clone() };
        assert_eq!(sync.apply(&delta), Ok(SyncOutcome::Replaced));
        assert_eq!(kernel.get(&new.prefix), Some(KernelRoute::from(&new)));
        assert_eq!(kernel.mutations(), 2);
    }

    #[test]
    #[traced_test]
    fn test_transient_errors_are_retried() {
        let (mut sync, kernel) = fibsync();
        kernel.inject(KernelOp::Install, Errno::EAGAIN, 2);
        let delta = RibDelta::Add(route(&["1.1.1.2"]));
        assert_eq!(sync.apply(&delta), Ok(SyncOutcome::Installed));
        assert_eq!(sync.stats().retries, 2);
        assert_eq!(sync.num_pending(), 0);
        assert!(logs_contain("Retrying"));
    }

    #[test]
    #[traced_test]
    fn test_persistent_errors_stay_pending() {
        let (mut sync, kernel) = fibsync();
        let reader = sync.reader_factory().handle();
        let delta = RibDelta::Add(route(&["1.1.1.2"]));

        // retries are bounded
        kernel.inject(KernelOp::Install, Errno::ENOBUFS, 5);
        assert!(matches!(
            sync.apply(&delta),
            Err(RouterError::KernelSync(_, KernelError { errno: Errno::ENOBUFS, .. }))
        ));
        assert_eq!(sync.stats().retries, 2);
        assert_eq!(sync.num_pending(), 1);
        assert!(reader.is_empty());
        assert!(logs_contain("failed to sync 123.0.0.1/32"));

        // 2 injected failures left, absorbed by the retries
        assert_eq!(sync.resync(), 0);
        assert_eq!(sync.stats().retries, 4);
        assert_eq!(kernel.len(), 1);
        assert_eq!(reader.len(), 1);

        // a pending prefix is retried on the next apply
        kernel.inject(KernelOp::Delete, Errno::EPERM, 1);
        let remove = RibDelta::Remove(route(&["1.1.1.2"]));
        assert!(sync.apply(&remove).is_err());
        let other = RibDelta::Add(FibRoute {
            prefix: "10.0.0.0/8".parse().unwrap(),
            ..route(&["1.1.1.2"])
        });
        assert_eq!(sync.apply(&other), Ok(SyncOutcome::Installed));
        assert_eq!(sync.num_pending(), 0);
        assert_eq!(kernel.get(&remove.prefix()), None);
        assert_eq!(sync.dump().unwrap().len(), 1);
    }
}
