//! Interaction strategy: hydrate on the first matching event on a root.

use futures_util::stream::{select_all, StreamExt};

use super::{arm, empty_roots, hydrate_now, StrategyHandle};
use crate::config::InteractionEvents;
use crate::error::HydrationError;
use crate::locator::RootElementSet;
use crate::platform::Platform;
use crate::state::HydrationState;

const NAME: &str = "interaction";

/// Hydrates on the first of `events` dispatched to any of `roots`.
///
/// One listener is attached per event per root element; all of them are
/// removed when the strategy fires or is cleaned up. Disabled events arm
/// nothing. An empty `roots` set is rejected with
/// [`HydrationError::EmptyRootSet`]. Without an event source the region
/// hydrates immediately.
pub fn use_hydrate_on_interaction(
    state: &HydrationState,
    platform: &Platform,
    roots: &RootElementSet,
    events: impl Into<InteractionEvents>,
) -> Result<StrategyHandle, HydrationError> {
    let events = events.into();
    if !state.is_pending() || events.is_disabled() {
        return Ok(StrategyHandle::inert(NAME));
    }
    if roots.is_empty() {
        return Err(empty_roots(NAME));
    }
    let Some(source) = platform.events() else {
        return Ok(hydrate_now(state, NAME, "no event source"));
    };

    let listeners = roots
        .iter()
        .flat_map(|root| events.names().iter().map(move |event| (root, event)))
        .map(|(root, event)| source.listen(root, event))
        .collect::<Vec<_>>();
    tracing::trace!(listeners = listeners.len(), "interaction listeners attached");
    let mut dispatched = select_all(listeners);

    arm(state, NAME, async move {
        match dispatched.next().await {
            Some(event) => tracing::trace!(event = %event.name, "interaction observed"),
            None => std::future::pending::<()>().await,
        }
    })
}
