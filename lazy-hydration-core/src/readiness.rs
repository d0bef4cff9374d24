//! Subtree Readiness
//!
//! A region is only "hydrated" once the async components nested inside it
//! have settled. Async descendants announce themselves on the region's
//! [`SubtreeReadiness`] and settle through the returned handle. When
//! hydration is triggered the region takes a single snapshot of the
//! descendants still pending and waits for exactly those.
//!
//! # Rules
//!
//! - Discovery happens once, at trigger time. Descendants registered later
//!   are not waited for, nor tracked.
//! - A registry that will never be discovered (server pass, disposed
//!   region) is closed and stops tracking registrations too.
//! - A rejected (or dropped) descendant counts as settled. The failure is
//!   logged and reported but never holds up the region.
//! - No timeout is imposed here; callers that want one can race
//!   [`ReadinessWait::wait`] against a timer.

use std::fmt;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::HydrationError;

type Settlement = Result<(), String>;

const DROPPED: &str = "handle dropped before settling";

/// Something that can report which async descendants are still pending.
pub trait ReadinessSource: Send + Sync {
    /// Snapshots the pending descendants.
    fn discover(&self) -> ReadinessWait;

    /// Called when no discovery will ever happen again.
    fn close(&self) {}
}

/// Registry of the async descendants inside one region.
#[derive(Clone, Default)]
pub struct SubtreeReadiness {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    closed: bool,
    pending: IndexMap<u64, Pending>,
}

struct Pending {
    name: String,
    settled: oneshot::Receiver<Settlement>,
}

impl SubtreeReadiness {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces an async descendant.
    ///
    /// The descendant keeps the region waiting until the handle is resolved,
    /// rejected or dropped. Once the registry is closed the handle is
    /// detached: settling it does nothing.
    pub fn register(&self, name: impl Into<String>) -> DescendantHandle {
        let name = name.into();
        let mut registry = self.inner.lock();
        if registry.closed {
            tracing::trace!(descendant = %name, "readiness closed; not tracking");
            return DescendantHandle { name, tx: None };
        }

        let (tx, rx) = oneshot::channel();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.pending.insert(
            id,
            Pending {
                name: name.clone(),
                settled: rx,
            },
        );

        DescendantHandle { name, tx: Some(tx) }
    }

    /// Number of descendants tracked and not yet snapshotted.
    pub fn registered_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Returns true once no further registration is tracked.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Stops tracking registrations and forgets the ones not yet
    /// snapshotted.
    pub fn close(&self) {
        let mut registry = self.inner.lock();
        registry.closed = true;
        registry.pending.clear();
    }

    /// Takes the snapshot hydration waits on, then closes the registry.
    ///
    /// Descendants that already settled are not waited for; ones that
    /// already failed are reported immediately.
    pub fn snapshot(&self) -> ReadinessWait {
        let drained: Vec<Pending> = {
            let mut registry = self.inner.lock();
            registry.closed = true;
            registry.pending.drain(..).map(|(_, pending)| pending).collect()
        };

        let mut wait = ReadinessWait::ready();
        for Pending { name, mut settled } in drained {
            match settled.try_recv() {
                Ok(Ok(())) => wait.settled_early += 1,
                Ok(Err(reason)) => wait.early_errors.push(rejection(name, reason)),
                Err(TryRecvError::Closed) => {
                    wait.early_errors.push(rejection(name, DROPPED.to_string()))
                }
                Err(TryRecvError::Empty) => {
                    let future = async move {
                        settled
                            .await
                            .unwrap_or_else(|_| Err(DROPPED.to_string()))
                    };
                    wait.pending.push((name, future.boxed()));
                }
            }
        }
        wait
    }
}

impl ReadinessSource for SubtreeReadiness {
    fn discover(&self) -> ReadinessWait {
        self.snapshot()
    }

    fn close(&self) {
        SubtreeReadiness::close(self)
    }
}

impl fmt::Debug for SubtreeReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubtreeReadiness")
            .field("registered", &self.registered_count())
            .finish()
    }
}

/// Settles one async descendant.
#[must_use = "dropping the handle settles the descendant as failed"]
pub struct DescendantHandle {
    name: String,
    tx: Option<oneshot::Sender<Settlement>>,
}

impl DescendantHandle {
    /// Name the descendant registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descendant resolved.
    pub fn resolve(mut self) {
        self.settle(Ok(()));
    }

    /// The descendant failed to resolve.
    pub fn reject(mut self, reason: impl Into<String>) {
        self.settle(Err(reason.into()));
    }

    fn settle(&mut self, settlement: Settlement) {
        if let Some(tx) = self.tx.take() {
            // The region may already be gone; nobody is left to tell.
            let _ = tx.send(settlement);
        }
    }
}

impl fmt::Debug for DescendantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescendantHandle")
            .field("name", &self.name)
            .field("settled", &self.tx.is_none())
            .finish()
    }
}

/// The descendants one hydration is waiting on.
pub struct ReadinessWait {
    pending: Vec<(String, BoxFuture<'static, Settlement>)>,
    settled_early: usize,
    early_errors: Vec<HydrationError>,
}

impl ReadinessWait {
    /// A wait with nothing to wait for.
    pub fn ready() -> Self {
        Self {
            pending: Vec::new(),
            settled_early: 0,
            early_errors: Vec::new(),
        }
    }

    /// Builds a wait from arbitrary descendant futures.
    pub fn from_futures<I>(descendants: I) -> Self
    where
        I: IntoIterator<Item = (String, BoxFuture<'static, Result<(), String>>)>,
    {
        Self {
            pending: descendants.into_iter().collect(),
            ..Self::ready()
        }
    }

    /// Returns true when no descendant is still pending.
    pub fn is_ready(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of descendants still pending.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Finishes a wait that has nothing pending without awaiting.
    ///
    /// Hands the wait back if descendants are still pending.
    pub fn try_finish(self) -> Result<ReadinessReport, Self> {
        if !self.is_ready() {
            return Err(self);
        }
        let report = ReadinessReport {
            settled: self.settled_early + self.early_errors.len(),
            errors: self.early_errors,
        };
        report.log();
        Ok(report)
    }

    /// Waits until every pending descendant settled.
    pub async fn wait(self) -> ReadinessReport {
        let (names, futures): (Vec<_>, Vec<_>) = self.pending.into_iter().unzip();
        let outcomes = join_all(futures).await;

        let mut report = ReadinessReport {
            settled: self.settled_early + self.early_errors.len() + outcomes.len(),
            errors: self.early_errors,
        };
        for (name, outcome) in names.into_iter().zip(outcomes) {
            if let Err(reason) = outcome {
                report.errors.push(rejection(name, reason));
            }
        }
        report.log();
        report
    }
}

impl fmt::Debug for ReadinessWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessWait")
            .field("pending", &self.pending.len())
            .field("settled_early", &self.settled_early)
            .field("early_errors", &self.early_errors.len())
            .finish()
    }
}

/// Outcome of a readiness wait.
#[derive(Debug, Default)]
pub struct ReadinessReport {
    /// Descendants that settled, successfully or not.
    pub settled: usize,
    /// Descendants that rejected or were dropped.
    pub errors: Vec<HydrationError>,
}

impl ReadinessReport {
    fn log(&self) {
        for error in &self.errors {
            tracing::warn!(%error, "async descendant failed; hydrating anyway");
        }
    }
}

fn rejection(descendant: String, reason: String) -> HydrationError {
    HydrationError::Readiness { descendant, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_is_ready() {
        let readiness = SubtreeReadiness::new();
        let wait = readiness.snapshot();
        assert!(wait.is_ready());

        let report = wait.try_finish().unwrap();
        assert_eq!(report.settled, 0);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn settled_descendants_are_not_waited_for() {
        let readiness = SubtreeReadiness::new();
        readiness.register("chart").resolve();
        readiness.register("map").reject("tiles unavailable");

        let report = readiness.snapshot().try_finish().unwrap();
        assert_eq!(report.settled, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].to_string().contains("map"));
    }

    #[test]
    fn snapshot_is_taken_once() {
        let readiness = SubtreeReadiness::new();
        let _pending = readiness.register("comments");

        let wait = readiness.snapshot();
        assert_eq!(wait.pending_count(), 1);

        let _late = readiness.register("late");
        assert_eq!(wait.pending_count(), 1);
        assert_eq!(readiness.registered_count(), 0);
        assert!(readiness.is_closed());
    }

    #[test]
    fn closed_registry_does_not_grow() {
        let readiness = SubtreeReadiness::new();
        let _early = readiness.register("early");
        readiness.close();
        assert_eq!(readiness.registered_count(), 0);

        for i in 0..1000 {
            let handle = readiness.register(format!("item-{i}"));
            assert_eq!(handle.name(), format!("item-{i}"));
        }
        assert_eq!(readiness.registered_count(), 0);
        assert!(readiness.snapshot().is_ready());
    }

    #[tokio::test]
    async fn wait_resolves_after_all_descendants() {
        let readiness = SubtreeReadiness::new();
        let a = readiness.register("a");
        let b = readiness.register("b");

        let wait = readiness.snapshot();
        let task = tokio::spawn(wait.wait());

        a.resolve();
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        b.reject("network");
        let report = task.await.unwrap();
        assert_eq!(report.settled, 2);
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn dropped_handle_counts_as_rejection() {
        let readiness = SubtreeReadiness::new();
        let handle = readiness.register("lazy-image");

        let wait = readiness.snapshot();
        drop(handle);

        let report = wait.wait().await;
        assert!(matches!(
            &report.errors[0],
            HydrationError::Readiness { descendant, .. } if descendant == "lazy-image"
        ));
    }
}
