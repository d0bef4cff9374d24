//! Idle strategy: hydrate once the platform has nothing better to do.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use super::{arm, StrategyHandle};
use crate::config::IdleOptions;
use crate::error::HydrationError;
use crate::platform::Platform;
use crate::state::HydrationState;

const NAME: &str = "idle";

/// Roughly 30 years; stands in for deadlines the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Hydrates when the platform reports idle time, or when the timeout
/// elapses, whichever comes first.
///
/// Without an idle scheduler the timeout alone decides; with neither an
/// idle scheduler nor a timeout, hydration happens on the next scheduler
/// turn.
pub fn use_hydrate_when_idle(
    state: &HydrationState,
    platform: &Platform,
    options: IdleOptions,
) -> Result<StrategyHandle, HydrationError> {
    if !state.is_pending() {
        return Ok(StrategyHandle::inert(NAME));
    }

    let deadline = options.timeout.map(|timeout| {
        let now = Instant::now();
        now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
    });
    let idle = platform.idle().map(|scheduler| scheduler.idle(options.timeout));

    arm(state, NAME, async move {
        match (idle, deadline) {
            (Some(idle), Some(deadline)) => {
                tokio::select! {
                    _ = idle => {}
                    _ = sleep_until(deadline) => {
                        tracing::trace!("idle timeout elapsed");
                    }
                }
            }
            (Some(idle), None) => idle.await,
            (None, Some(deadline)) => sleep_until(deadline).await,
            (None, None) => tokio::task::yield_now().await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::manual::ManualIdle;
    use crate::state::Phase;
    use std::sync::Arc;

    fn idle_platform() -> (ManualIdle, Platform) {
        let idle = ManualIdle::new();
        let platform = Platform::new().with_idle(Arc::new(idle.clone()));
        (idle, platform)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_signal_hydrates_before_timeout() {
        let (idle, platform) = idle_platform();
        let state = HydrationState::new(true);

        use_hydrate_when_idle(&state, &platform, IdleOptions::default()).unwrap();
        assert_eq!(idle.requested_timeouts(), vec![Some(Duration::from_millis(2000))]);

        idle.fire();
        settle().await;
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_hydrates_after_two_seconds() {
        let (idle, platform) = idle_platform();
        let state = HydrationState::new(true);

        use_hydrate_when_idle(&state, &platform, IdleOptions::default()).unwrap();

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(state.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(state.phase(), Phase::Hydrated);
        assert_eq!(idle.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_timeout_is_honoured_without_idle_support() {
        let state = HydrationState::new(true);
        let options = IdleOptions::with_timeout(Duration::from_millis(4000));

        use_hydrate_when_idle(&state, &Platform::new(), options).unwrap();

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(state.is_pending());

        tokio::time::sleep(Duration::from_millis(1001)).await;
        settle().await;
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_waits_for_idle() {
        let (idle, platform) = idle_platform();
        let state = HydrationState::new(true);
        let options = IdleOptions::with_timeout(Duration::MAX);

        use_hydrate_when_idle(&state, &platform, options).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(state.is_pending());

        idle.fire();
        settle().await;
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_without_idle_support_stays_pending() {
        let state = HydrationState::new(true);
        let options = IdleOptions::with_timeout(Duration::MAX);

        let handle = use_hydrate_when_idle(&state, &Platform::new(), options).unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert!(handle.is_armed());
        assert!(state.is_pending());
    }

    #[tokio::test]
    async fn no_timeout_and_no_idle_support_hydrates_next_turn() {
        let state = HydrationState::new(true);

        use_hydrate_when_idle(&state, &Platform::new(), IdleOptions::without_timeout()).unwrap();
        assert!(state.is_pending());

        settle().await;
        assert_eq!(state.phase(), Phase::Hydrated);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_idle_request() {
        let (idle, platform) = idle_platform();
        let state = HydrationState::new(true);

        let handle = use_hydrate_when_idle(&state, &platform, IdleOptions::default()).unwrap();
        assert_eq!(idle.pending(), 1);

        state.dispose();
        settle().await;
        assert!(!handle.is_armed());
        assert_eq!(idle.pending(), 0);

        assert_eq!(idle.fire(), 0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(state.phase(), Phase::Disposed);
    }

    #[tokio::test]
    async fn server_pass_does_not_request_idle_time() {
        let (idle, platform) = idle_platform();
        let state = HydrationState::new(false);

        let handle = use_hydrate_when_idle(&state, &platform, IdleOptions::default()).unwrap();
        assert!(!handle.is_armed());
        assert_eq!(idle.pending(), 0);
    }
}
