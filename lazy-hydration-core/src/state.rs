//! Hydration State
//!
//! The state machine behind every lazy region. It answers one question,
//! "has this region hydrated yet?", and guarantees the answer changes at
//! most once.
//!
//! # Phases
//!
//! ```text
//! ServerPass                                   (terminal, nothing ever runs)
//! ClientPending ──trigger──▶ Triggered ──▶ ReadinessWaiting ──▶ Hydrated
//!        │                        │                │
//!        └────────dispose─────────┴────────────────┴──────────▶ Disposed
//! ```
//!
//! # Ordering
//!
//! When triggered, the registered cleanups run first, in registration
//! order, and tear down every armed strategy. The async descendants pending
//! at that moment are then awaited, and only after they settle do the
//! hydrated callbacks run, again in registration order. The phase is
//! already [`Phase::Hydrated`] when they run.
//!
//! # Re-entrancy
//!
//! Callbacks are always moved out of the lock before they run. A cleanup
//! that calls [`HydrationState::hydrate`] again, or a hydrated callback that
//! registers another one, sees a consistent phase and is ignored.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, HydrationError};
use crate::readiness::{ReadinessReport, ReadinessSource, ReadinessWait};

type Callback = Box<dyn FnOnce() + Send>;
type Cleanup = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

/// Where a region is in its hydration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Hydration never happens in this execution context.
    ServerPass,
    /// Waiting for a strategy (or a manual call) to trigger hydration.
    ClientPending,
    /// Triggered; cleanups are running.
    Triggered,
    /// Waiting for async descendants to settle.
    ReadinessWaiting,
    /// Hydration completed and hydrated callbacks ran.
    Hydrated,
    /// The region unmounted before hydration completed.
    Disposed,
}

impl Phase {
    /// Returns true for phases that never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ServerPass | Self::Hydrated | Self::Disposed)
    }
}

/// The execution context a region is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderContext {
    /// Server-side rendering; markup only.
    Server,
    /// A client render pass.
    Client {
        /// The host already knows this region hydrated in an earlier pass.
        already_hydrated: bool,
    },
}

impl RenderContext {
    /// A client pass over freshly server-rendered markup.
    pub fn client() -> Self {
        Self::Client {
            already_hydrated: false,
        }
    }

    /// Whether a region created in this context may hydrate.
    pub fn will_perform_hydration(&self) -> bool {
        matches!(
            self,
            Self::Client {
                already_hydrated: false
            }
        )
    }
}

/// Result of a call to [`HydrationState::hydrate`].
#[derive(Debug)]
pub enum TriggerOutcome {
    /// Nothing happened: already triggered, disposed, or a server pass.
    Ignored,
    /// This call triggered hydration.
    Triggered {
        /// Cleanup failures and scheduling problems. None of them stopped
        /// the transition.
        errors: Vec<HydrationError>,
    },
}

impl TriggerOutcome {
    /// Returns true if this call performed the transition.
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered { .. })
    }

    /// Errors collected while triggering.
    pub fn errors(&self) -> &[HydrationError] {
        match self {
            Self::Ignored => &[],
            Self::Triggered { errors } => errors,
        }
    }
}

#[derive(Default)]
struct Callbacks {
    cleanup: Vec<Cleanup>,
    hydrated: Vec<Callback>,
}

struct Shared {
    will_perform: bool,
    phase: watch::Sender<Phase>,
    callbacks: Mutex<Callbacks>,
    readiness: Option<Arc<dyn ReadinessSource>>,
    lifetime: CancellationToken,
}

/// One region's hydration state.
///
/// Cloning yields another handle to the same state; strategies hold such a
/// handle to trigger hydration and to register their teardown.
#[derive(Clone)]
pub struct HydrationState {
    shared: Arc<Shared>,
}

impl HydrationState {
    /// Creates the state. `will_perform_hydration` is fixed for its lifetime.
    pub fn new(will_perform_hydration: bool) -> Self {
        Self::build(will_perform_hydration, None)
    }

    /// Creates the state with a source of async descendants to wait for.
    pub fn with_readiness(
        will_perform_hydration: bool,
        readiness: Arc<dyn ReadinessSource>,
    ) -> Self {
        Self::build(will_perform_hydration, Some(readiness))
    }

    fn build(will_perform: bool, readiness: Option<Arc<dyn ReadinessSource>>) -> Self {
        let initial = if will_perform {
            Phase::ClientPending
        } else {
            Phase::ServerPass
        };
        let (phase, _) = watch::channel(initial);
        if let (false, Some(source)) = (will_perform, &readiness) {
            source.close();
        }

        Self {
            shared: Arc::new(Shared {
                will_perform,
                phase,
                callbacks: Mutex::new(Callbacks::default()),
                readiness,
                lifetime: CancellationToken::new(),
            }),
        }
    }

    /// False in a server pass or when hydration is not applicable.
    pub fn will_perform_hydration(&self) -> bool {
        self.shared.will_perform
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.shared.phase.borrow()
    }

    /// Returns true once hydration has been triggered.
    ///
    /// Hydrated callbacks may still be waiting for async descendants.
    pub fn is_hydrated(&self) -> bool {
        matches!(
            self.phase(),
            Phase::Triggered | Phase::ReadinessWaiting | Phase::Hydrated
        )
    }

    /// Returns true while strategies may still trigger hydration.
    pub fn is_pending(&self) -> bool {
        self.phase() == Phase::ClientPending
    }

    /// Receiver that observes every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.shared.phase.subscribe()
    }

    /// Waits until the region hydrated.
    ///
    /// Returns false instead if the region is a server pass or was disposed
    /// before hydrating.
    pub async fn hydrated(&self) -> bool {
        let mut phase = self.watch_phase();
        let result = phase
            .wait_for(|p| matches!(p, Phase::Hydrated | Phase::ServerPass | Phase::Disposed))
            .await;
        matches!(result.as_deref(), Ok(Phase::Hydrated))
    }

    /// Token cancelled when the state is disposed.
    pub fn lifetime(&self) -> &CancellationToken {
        &self.shared.lifetime
    }

    /// Registers a callback to run once hydration completed.
    ///
    /// Ignored unless the state is still pending; returns whether the
    /// callback was registered.
    pub fn on_hydrated<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self.shared.callbacks.lock();
        if self.phase() != Phase::ClientPending {
            tracing::debug!(phase = ?self.phase(), "ignoring late on_hydrated registration");
            return false;
        }
        callbacks.hydrated.push(Box::new(callback));
        true
    }

    /// Registers a cleanup to run when hydration is triggered or the state
    /// is disposed.
    ///
    /// Ignored unless the state is still pending; returns whether the
    /// callback was registered.
    pub fn on_cleanup<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_on_cleanup(move || {
            callback();
            Ok::<(), BoxError>(())
        })
    }

    /// Registers a fallible cleanup.
    ///
    /// A failure is reported but does not stop the other cleanups.
    pub fn try_on_cleanup<F, E>(&self, callback: F) -> bool
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        let mut callbacks = self.shared.callbacks.lock();
        if self.phase() != Phase::ClientPending {
            tracing::debug!(phase = ?self.phase(), "ignoring late on_cleanup registration");
            return false;
        }
        callbacks
            .cleanup
            .push(Box::new(move || callback().map_err(Into::into)));
        true
    }

    /// Triggers hydration.
    ///
    /// Idempotent: only the first call on a pending state does anything.
    /// Runs the cleanups, then waits for async descendants, then runs the
    /// hydrated callbacks. Waiting for descendants needs a tokio runtime;
    /// when nothing is pending the callbacks run before this returns.
    pub fn hydrate(&self) -> TriggerOutcome {
        let cleanups = {
            let mut callbacks = self.shared.callbacks.lock();
            let phase = self.phase();
            if phase != Phase::ClientPending {
                tracing::trace!(?phase, "hydrate ignored");
                return TriggerOutcome::Ignored;
            }
            self.shared.phase.send_replace(Phase::Triggered);
            std::mem::take(&mut callbacks.cleanup)
        };

        tracing::debug!(cleanups = cleanups.len(), "hydration triggered");
        let mut errors = run_cleanups(cleanups);

        if let Err(error) = self.await_readiness() {
            errors.push(error);
        }
        TriggerOutcome::Triggered { errors }
    }

    /// Alias of [`hydrate`](Self::hydrate).
    pub fn trigger(&self) -> TriggerOutcome {
        self.hydrate()
    }

    /// Tears the state down.
    ///
    /// Cancels pending readiness waits and armed strategies, runs cleanups
    /// that have not run yet and drops the hydrated callbacks. A state that
    /// has not hydrated becomes [`Phase::Disposed`]. Idempotent.
    pub fn dispose(&self) {
        self.shared.lifetime.cancel();

        let cleanups = {
            let mut callbacks = self.shared.callbacks.lock();
            let phase = self.phase();
            if matches!(
                phase,
                Phase::ClientPending | Phase::Triggered | Phase::ReadinessWaiting
            ) {
                tracing::debug!(?phase, "disposing lazy region before hydration");
                self.shared.phase.send_replace(Phase::Disposed);
            }
            callbacks.hydrated.clear();
            std::mem::take(&mut callbacks.cleanup)
        };

        if let Some(source) = &self.shared.readiness {
            source.close();
        }
        run_cleanups(cleanups);
    }

    fn await_readiness(&self) -> Result<(), HydrationError> {
        let wait = match &self.shared.readiness {
            Some(source) => source.discover(),
            None => ReadinessWait::ready(),
        };

        let wait = match wait.try_finish() {
            Ok(report) => {
                self.finish(report);
                return Ok(());
            }
            Err(wait) => wait,
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("async descendants pending but no tokio runtime is running");
            self.transition(Phase::Triggered, Phase::ReadinessWaiting);
            return Err(HydrationError::NoRuntime);
        };

        tracing::debug!(pending = wait.pending_count(), "waiting for async descendants");
        self.transition(Phase::Triggered, Phase::ReadinessWaiting);

        let state = self.clone();
        let lifetime = self.shared.lifetime.clone();
        runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = lifetime.cancelled() => {
                    tracing::debug!("readiness wait cancelled");
                }
                report = wait.wait() => state.finish(report),
            }
        });
        Ok(())
    }

    fn finish(&self, report: ReadinessReport) {
        let hydrated = {
            let mut callbacks = self.shared.callbacks.lock();
            if !matches!(self.phase(), Phase::Triggered | Phase::ReadinessWaiting) {
                return;
            }
            // Hydrated is reached before any callback can observe or dispose.
            self.shared.phase.send_replace(Phase::Hydrated);
            std::mem::take(&mut callbacks.hydrated)
        };

        for callback in hydrated {
            callback();
        }

        tracing::debug!(
            settled = report.settled,
            failed = report.errors.len(),
            "lazy region hydrated"
        );
    }

    fn transition(&self, from: Phase, to: Phase) -> bool {
        let _callbacks = self.shared.callbacks.lock();
        self.shared.phase.send_if_modified(|phase| {
            if *phase == from {
                *phase = to;
                true
            } else {
                false
            }
        })
    }
}

impl fmt::Debug for HydrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrationState")
            .field("will_perform_hydration", &self.shared.will_perform)
            .field("phase", &self.phase())
            .finish()
    }
}

fn run_cleanups(cleanups: Vec<Cleanup>) -> Vec<HydrationError> {
    let mut errors = Vec::new();
    for (index, cleanup) in cleanups.into_iter().enumerate() {
        if let Err(source) = cleanup() {
            let error = HydrationError::Cleanup { index, source };
            tracing::warn!(%error, "lazy hydration cleanup failed");
            errors.push(error);
        }
    }
    errors
}

/// Creates the hydration state for a region rendered in `context`.
pub fn use_lazy_hydration(context: RenderContext) -> HydrationState {
    HydrationState::new(context.will_perform_hydration())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readiness::SubtreeReadiness;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce() + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let record = move |label: &str| -> Box<dyn FnOnce() + Send> {
            let log = log_clone.clone();
            let label = label.to_string();
            Box::new(move || log.lock().push(label))
        };
        (log, record)
    }

    #[test]
    fn server_pass_never_hydrates() {
        let state = use_lazy_hydration(RenderContext::Server);
        assert!(!state.will_perform_hydration());
        assert_eq!(state.phase(), Phase::ServerPass);

        assert!(!state.on_hydrated(|| panic!("must not run")));
        assert!(!state.hydrate().is_triggered());
        assert_eq!(state.phase(), Phase::ServerPass);
    }

    #[test]
    fn already_hydrated_client_pass_is_inert() {
        let state = use_lazy_hydration(RenderContext::Client {
            already_hydrated: true,
        });
        assert!(!state.will_perform_hydration());
        assert!(!state.hydrate().is_triggered());
    }

    #[test]
    fn hydrate_is_idempotent() {
        let state = use_lazy_hydration(RenderContext::client());
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        state.on_hydrated(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(state.hydrate().is_triggered());
        for _ in 0..5 {
            assert!(!state.hydrate().is_triggered());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[test]
    fn cleanups_run_before_hydrated_callbacks_in_order() {
        let state = HydrationState::new(true);
        let (log, record) = recorder();

        state.on_hydrated(record("h1"));
        state.on_cleanup(record("c1"));
        state.on_hydrated(record("h2"));
        state.on_cleanup(record("c2"));

        state.hydrate();
        assert_eq!(*log.lock(), vec!["c1", "c2", "h1", "h2"]);
    }

    #[test]
    fn failing_cleanup_does_not_stop_the_others() {
        let state = HydrationState::new(true);
        let (log, record) = recorder();

        state.on_cleanup(record("c1"));
        state.try_on_cleanup(|| Err("observer already disconnected"));
        state.on_cleanup(record("c3"));
        state.on_hydrated(record("h1"));

        let outcome = state.hydrate();
        assert_eq!(outcome.errors().len(), 1);
        assert!(matches!(
            outcome.errors()[0],
            HydrationError::Cleanup { index: 1, .. }
        ));
        assert_eq!(*log.lock(), vec!["c1", "c3", "h1"]);
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[test]
    fn hydrated_is_final_when_callbacks_run() {
        let state = HydrationState::new(true);
        let inner = state.clone();
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        state.on_hydrated(move || {
            *seen_clone.lock() = Some(inner.phase());
            inner.dispose();
        });
        state.hydrate();

        assert_eq!(*seen.lock(), Some(Phase::Hydrated));
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[tokio::test]
    async fn dispose_from_hydrated_callback_keeps_hydrated() {
        let readiness = SubtreeReadiness::new();
        let state = HydrationState::with_readiness(true, Arc::new(readiness.clone()));
        let inner = state.clone();
        state.on_hydrated(move || inner.dispose());

        let chart = readiness.register("chart");
        state.hydrate();
        chart.resolve();

        assert!(state.hydrated().await);
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[test]
    fn late_registrations_are_ignored() {
        let state = HydrationState::new(true);
        state.hydrate();

        assert!(!state.on_cleanup(|| panic!("must not run")));
        assert!(!state.on_hydrated(|| panic!("must not run")));
        state.dispose();
    }

    #[test]
    fn reentrant_hydrate_from_cleanup_is_ignored() {
        let state = HydrationState::new(true);
        let inner = state.clone();
        let nested = Arc::new(Mutex::new(None));
        let nested_clone = nested.clone();

        state.on_cleanup(move || {
            *nested_clone.lock() = Some(inner.hydrate().is_triggered());
        });

        assert!(state.hydrate().is_triggered());
        assert_eq!(*nested.lock(), Some(false));
    }

    #[test]
    fn dispose_runs_cleanups_and_drops_hydrated_callbacks() {
        let state = HydrationState::new(true);
        let (log, record) = recorder();
        state.on_cleanup(record("c1"));
        state.on_hydrated(record("h1"));

        state.dispose();
        assert_eq!(*log.lock(), vec!["c1"]);
        assert_eq!(state.phase(), Phase::Disposed);
        assert!(state.lifetime().is_cancelled());

        assert!(!state.hydrate().is_triggered());
        assert_eq!(*log.lock(), vec!["c1"]);
    }

    #[tokio::test]
    async fn hydrated_callbacks_wait_for_descendants() {
        let readiness = SubtreeReadiness::new();
        let state = HydrationState::with_readiness(true, Arc::new(readiness.clone()));
        let (log, record) = recorder();
        state.on_cleanup(record("cleanup"));
        state.on_hydrated(record("hydrated"));

        let chart = readiness.register("chart");
        state.hydrate();
        assert_eq!(state.phase(), Phase::ReadinessWaiting);
        assert_eq!(*log.lock(), vec!["cleanup"]);

        chart.resolve();
        assert!(state.hydrated().await);
        assert_eq!(*log.lock(), vec!["cleanup", "hydrated"]);
    }

    #[tokio::test]
    async fn dispose_cancels_readiness_wait() {
        let readiness = SubtreeReadiness::new();
        let state = HydrationState::with_readiness(true, Arc::new(readiness.clone()));
        state.on_hydrated(|| panic!("must not run"));

        let _pending = readiness.register("comments");
        state.hydrate();
        state.dispose();

        assert!(!state.hydrated().await);
        assert_eq!(state.phase(), Phase::Disposed);
    }

    #[test]
    fn server_pass_and_dispose_close_readiness() {
        let server = SubtreeReadiness::new();
        let _state = HydrationState::with_readiness(false, Arc::new(server.clone()));
        let _ignored = server.register("chart");
        assert_eq!(server.registered_count(), 0);

        let client = SubtreeReadiness::new();
        let state = HydrationState::with_readiness(true, Arc::new(client.clone()));
        let _pending = client.register("chart");
        assert_eq!(client.registered_count(), 1);

        state.dispose();
        let _late = client.register("late");
        assert_eq!(client.registered_count(), 0);
    }

    #[test]
    fn pending_descendants_without_runtime_are_reported() {
        let readiness = SubtreeReadiness::new();
        let state = HydrationState::with_readiness(true, Arc::new(readiness.clone()));
        let _pending = readiness.register("comments");

        let outcome = state.hydrate();
        assert!(outcome.is_triggered());
        assert!(matches!(outcome.errors()[0], HydrationError::NoRuntime));
        assert_eq!(state.phase(), Phase::ReadinessWaiting);
    }
}
