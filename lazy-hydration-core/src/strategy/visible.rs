//! Visible strategy: hydrate once any root element scrolls into view.

use futures_util::StreamExt;

use super::{arm, empty_roots, hydrate_now, StrategyHandle};
use crate::config::VisibleOptions;
use crate::error::HydrationError;
use crate::locator::RootElementSet;
use crate::platform::Platform;
use crate::state::HydrationState;

const NAME: &str = "visible";

/// Hydrates the first time any of `roots` intersects the viewport.
///
/// One observer covers every root and is disconnected as soon as the
/// strategy fires or is cleaned up. An empty `roots` set cannot be
/// observed and is rejected with [`HydrationError::EmptyRootSet`]. When the
/// platform has no intersection observer the region hydrates immediately.
pub fn use_hydrate_when_visible(
    state: &HydrationState,
    platform: &Platform,
    roots: &RootElementSet,
    options: VisibleOptions,
) -> Result<StrategyHandle, HydrationError> {
    if !state.is_pending() {
        return Ok(StrategyHandle::inert(NAME));
    }
    options.validate()?;
    if roots.is_empty() {
        return Err(empty_roots(NAME));
    }
    let Some(observer) = platform.visibility() else {
        return Ok(hydrate_now(state, NAME, "no intersection observer"));
    };

    let min_threshold = options.min_threshold();
    let mut entries = observer.observe(roots, &options);

    arm(state, NAME, async move {
        while let Some(batch) = entries.next().await {
            if batch.iter().any(|entry| entry.is_visible(min_threshold)) {
                return;
            }
        }
        // The platform disconnected the observer; nothing can fire anymore.
        std::future::pending::<()>().await
    })
}
