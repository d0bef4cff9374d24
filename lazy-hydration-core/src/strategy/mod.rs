//! Trigger Strategies
//!
//! Each strategy decides when a region hydrates. They all follow the same
//! shape:
//!
//! 1. Do nothing unless the state is still pending.
//! 2. Register a platform request (idle future, observer stream, listener
//!    streams or flag subscription) that resolves when the condition holds.
//! 3. Spawn a task racing that condition against a cancellation token, and
//!    register a cleanup that cancels the token.
//!
//! Whichever strategy fires first calls `hydrate`, which runs every cleanup
//! and thereby disarms the others. Cancelling a task drops its platform
//! request, so the idle callback, observer or listeners go away with it.
//! Unmounting disposes the state, which cancels every token as well.

mod idle;
mod interaction;
mod triggered;
mod visible;

pub use idle::use_hydrate_when_idle;
pub use interaction::use_hydrate_on_interaction;
pub use triggered::use_hydrate_when_triggered;
pub use visible::use_hydrate_when_visible;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::HydrationError;
use crate::state::HydrationState;

/// Handle to one armed (or inert) strategy.
///
/// Dropping the handle does not disarm the strategy; the hydration state
/// owns its teardown.
#[derive(Clone)]
pub struct StrategyHandle {
    name: &'static str,
    armed: Arc<AtomicBool>,
    token: CancellationToken,
}

impl StrategyHandle {
    fn armed(name: &'static str, token: CancellationToken) -> Self {
        Self {
            name,
            armed: Arc::new(AtomicBool::new(true)),
            token,
        }
    }

    /// A handle for a strategy that never armed.
    pub(crate) fn inert(name: &'static str) -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self {
            name,
            armed: Arc::new(AtomicBool::new(false)),
            token,
        }
    }

    /// Strategy name, as used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true while the strategy may still fire.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Disarms the strategy and releases its platform request.
    pub fn cancel(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.token.cancel();
    }

    /// Fires at most once.
    fn fire(&self, state: &HydrationState) {
        if self.armed.swap(false, Ordering::SeqCst) {
            tracing::debug!(strategy = self.name, "strategy fired");
            state.hydrate();
        }
    }
}

impl fmt::Debug for StrategyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyHandle")
            .field("name", &self.name)
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Arms a strategy whose condition is `condition`.
///
/// The condition future owns the platform request; it is dropped as soon as
/// the strategy fires or is cancelled.
fn arm<F>(
    state: &HydrationState,
    name: &'static str,
    condition: F,
) -> Result<StrategyHandle, HydrationError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| HydrationError::NoRuntime)?;

    let handle = StrategyHandle::armed(name, state.lifetime().child_token());
    let teardown = handle.clone();
    if !state.on_cleanup(move || teardown.cancel()) {
        return Ok(StrategyHandle::inert(name));
    }

    let task = handle.clone();
    let state = state.clone();
    runtime.spawn(async move {
        tokio::select! {
            biased;
            _ = task.token.cancelled() => {
                tracing::trace!(strategy = task.name, "strategy disarmed");
            }
            _ = condition => task.fire(&state),
        }
    });

    tracing::debug!(strategy = name, "strategy armed");
    Ok(handle)
}

/// Hydrates right away because a platform capability is missing.
fn hydrate_now(state: &HydrationState, name: &'static str, reason: &str) -> StrategyHandle {
    tracing::debug!(strategy = name, reason, "hydrating immediately");
    state.hydrate();
    StrategyHandle::inert(name)
}

/// Reports a strategy that cannot observe anything.
fn empty_roots(name: &'static str) -> HydrationError {
    let error = HydrationError::EmptyRootSet { strategy: name };
    tracing::error!(%error, "lazy region will not hydrate through this strategy");
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inert_handle_is_not_armed() {
        let handle = StrategyHandle::inert("idle");
        assert!(!handle.is_armed());
        assert_eq!(handle.name(), "idle");
    }

    #[test]
    fn arming_requires_a_runtime() {
        let state = HydrationState::new(true);
        let err = arm(&state, "idle", async {}).unwrap_err();
        assert!(matches!(err, HydrationError::NoRuntime));
    }

    #[tokio::test]
    async fn arming_after_hydration_is_inert() {
        let state = HydrationState::new(true);
        state.hydrate();

        let handle = arm(&state, "idle", async {}).unwrap();
        assert!(!handle.is_armed());
    }

    #[tokio::test]
    async fn fired_strategy_disarms_siblings() {
        let state = HydrationState::new(true);
        let never = arm(&state, "never", std::future::pending()).unwrap();
        let now = arm(&state, "now", async {}).unwrap();

        assert!(state.hydrated().await);
        assert!(!never.is_armed());
        assert!(!now.is_armed());
    }
}
