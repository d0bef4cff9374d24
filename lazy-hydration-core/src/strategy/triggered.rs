//! Signal strategy: hydrate when a reactive flag turns true.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{arm, StrategyHandle};
use crate::error::HydrationError;
use crate::reactive::ReactiveFlag;
use crate::state::HydrationState;

const NAME: &str = "triggered";

/// Hydrates when `flag` becomes true.
///
/// A flag that is already true hydrates during this call. Otherwise the
/// flag is watched until its first true value; later changes are ignored.
pub fn use_hydrate_when_triggered(
    state: &HydrationState,
    flag: Arc<dyn ReactiveFlag>,
) -> Result<StrategyHandle, HydrationError> {
    if !state.is_pending() {
        return Ok(StrategyHandle::inert(NAME));
    }
    if flag.is_set() {
        tracing::debug!(strategy = NAME, "flag already set");
        state.hydrate();
        return Ok(StrategyHandle::inert(NAME));
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watched = Arc::downgrade(&flag);
    let subscription = flag.watch(Box::new(move || {
        if watched.upgrade().is_some_and(|flag| flag.is_set()) {
            let _ = tx.send(());
        }
    }));

    // The flag may have flipped between the first check and subscribing.
    if flag.is_set() {
        drop(subscription);
        state.hydrate();
        return Ok(StrategyHandle::inert(NAME));
    }

    arm(state, NAME, async move {
        let _subscription = subscription;
        let _flag = flag;
        if rx.recv().await.is_none() {
            std::future::pending::<()>().await
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use crate::state::Phase;
    use std::sync::atomic::{AtomicI32, Ordering};

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn already_set_flag_hydrates_immediately() {
        let signal = Signal::new(true);
        let state = HydrationState::new(true);

        let handle = use_hydrate_when_triggered(&state, Arc::new(signal.clone())).unwrap();

        assert!(!handle.is_armed());
        assert_eq!(state.phase(), Phase::Hydrated);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn hydrates_on_first_true_only() {
        let signal = Signal::new(false);
        let state = HydrationState::new(true);
        let hydrated = Arc::new(AtomicI32::new(0));
        let hydrated_clone = hydrated.clone();
        state.on_hydrated(move || {
            hydrated_clone.fetch_add(1, Ordering::SeqCst);
        });

        use_hydrate_when_triggered(&state, Arc::new(signal.clone())).unwrap();
        assert_eq!(signal.subscriber_count(), 1);

        signal.set(false);
        settle().await;
        assert!(state.is_pending());

        signal.set(true);
        settle().await;
        assert_eq!(state.phase(), Phase::Hydrated);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(false);
        signal.set(true);
        settle().await;
        assert_eq!(hydrated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dispose_stops_watching() {
        let signal = Signal::new(false);
        let state = HydrationState::new(true);

        use_hydrate_when_triggered(&state, Arc::new(signal.clone())).unwrap();
        state.dispose();
        settle().await;

        assert_eq!(signal.subscriber_count(), 0);
        signal.set(true);
        settle().await;
        assert_eq!(state.phase(), Phase::Disposed);
    }
}
