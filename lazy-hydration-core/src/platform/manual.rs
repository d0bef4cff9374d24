//! Manual Platform
//!
//! Capability implementations driven by the host instead of a browser.
//! Headless hosts use them to decide for themselves when the page is idle,
//! what is on screen and which events happened; tests use them to simulate
//! the platform deterministically.
//!
//! Every registration is tracked, so callers can check that a strategy
//! really let go of its idle request, observer or listeners.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{DomEvent, EventSource, IdleScheduler, IntersectionEntry, Platform, VisibilityObserver};
use crate::config::VisibleOptions;
use crate::dom::{Element, ElementId};
use crate::locator::RootElementSet;

/// Runs a closure when dropped.
struct Deregister(Option<Box<dyn FnOnce() + Send>>);

impl Deregister {
    fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self(Some(Box::new(f)))
    }
}

impl Drop for Deregister {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Turns a channel into a stream that deregisters when dropped.
fn guarded_stream<T: Send + 'static>(
    rx: mpsc::UnboundedReceiver<T>,
    guard: Deregister,
) -> BoxStream<'static, T> {
    stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv().await.map(|item| (item, (rx, guard)))
    })
    .boxed()
}

/// Registrations keyed by a monotonically increasing id.
struct Registry<T> {
    next_id: u64,
    entries: IndexMap<u64, T>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: IndexMap::new(),
        }
    }
}

impl<T> Registry<T> {
    fn insert(&mut self, entry: T) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }
}

fn deregister<T: Send + 'static>(registry: &Arc<Mutex<Registry<T>>>, id: u64) -> Deregister {
    let registry = Arc::clone(registry);
    Deregister::new(move || {
        registry.lock().entries.shift_remove(&id);
    })
}

// ----------------------------------------------------------------------------
// Idle
// ----------------------------------------------------------------------------

struct IdleRequest {
    timeout: Option<Duration>,
    ready: oneshot::Sender<()>,
}

/// Idle scheduler resolved by [`ManualIdle::fire`].
#[derive(Clone, Default)]
pub struct ManualIdle {
    requests: Arc<Mutex<Registry<IdleRequest>>>,
}

impl ManualIdle {
    /// Creates a scheduler with no pending requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the platform idle, resolving every pending request.
    ///
    /// Returns the number of requests resolved.
    pub fn fire(&self) -> usize {
        let requests: Vec<IdleRequest> = self
            .requests
            .lock()
            .entries
            .drain(..)
            .map(|(_, request)| request)
            .collect();

        let count = requests.len();
        for request in requests {
            let _ = request.ready.send(());
        }
        count
    }

    /// Number of idle requests still waiting.
    pub fn pending(&self) -> usize {
        self.requests.lock().entries.len()
    }

    /// Timeout hints of the pending requests, in request order.
    pub fn requested_timeouts(&self) -> Vec<Option<Duration>> {
        self.requests
            .lock()
            .entries
            .values()
            .map(|request| request.timeout)
            .collect()
    }
}

impl IdleScheduler for ManualIdle {
    fn idle(&self, timeout: Option<Duration>) -> BoxFuture<'static, ()> {
        let (ready, rx) = oneshot::channel();
        let id = self.requests.lock().insert(IdleRequest { timeout, ready });
        let guard = deregister(&self.requests, id);

        async move {
            let _guard = guard;
            let _ = rx.await;
        }
        .boxed()
    }
}

impl fmt::Debug for ManualIdle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualIdle")
            .field("pending", &self.pending())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Visibility
// ----------------------------------------------------------------------------

struct Observer {
    targets: RootElementSet,
    options: VisibleOptions,
    entries: mpsc::UnboundedSender<Vec<IntersectionEntry>>,
}

/// Visibility observer fed by [`ManualVisibility::report`].
#[derive(Clone, Default)]
pub struct ManualVisibility {
    observers: Arc<Mutex<Registry<Observer>>>,
}

impl ManualVisibility {
    /// Creates an observer factory with no live observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `element` intersecting the viewport at `ratio`.
    ///
    /// Returns the number of observers the entry was delivered to.
    pub fn intersect(&self, element: &Element, ratio: f64) -> usize {
        self.report(vec![IntersectionEntry {
            target: element.clone(),
            is_intersecting: ratio > 0.0,
            ratio,
        }])
    }

    /// Delivers a batch of entries.
    ///
    /// Each observer receives the entries for the targets it observes, as
    /// one batch. Returns the number of observers that received a batch.
    pub fn report(&self, entries: Vec<IntersectionEntry>) -> usize {
        let observers = self.observers.lock();
        let mut delivered = 0;

        for observer in observers.entries.values() {
            let batch: Vec<_> = entries
                .iter()
                .filter(|entry| observer.targets.contains(&entry.target))
                .cloned()
                .collect();
            if !batch.is_empty() && observer.entries.send(batch).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().entries.len()
    }

    /// Options of the connected observers, in connection order.
    pub fn observed_options(&self) -> Vec<VisibleOptions> {
        self.observers
            .lock()
            .entries
            .values()
            .map(|observer| observer.options.clone())
            .collect()
    }
}

impl VisibilityObserver for ManualVisibility {
    fn observe(
        &self,
        targets: &RootElementSet,
        options: &VisibleOptions,
    ) -> BoxStream<'static, Vec<IntersectionEntry>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.observers.lock().insert(Observer {
            targets: targets.clone(),
            options: options.clone(),
            entries: tx,
        });
        guarded_stream(rx, deregister(&self.observers, id))
    }
}

impl fmt::Debug for ManualVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualVisibility")
            .field("observers", &self.observer_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Events
// ----------------------------------------------------------------------------

struct Listener {
    target: Element,
    event: String,
    events: mpsc::UnboundedSender<DomEvent>,
}

/// Event source fed by [`ManualEvents::dispatch`].
#[derive(Clone, Default)]
pub struct ManualEvents {
    listeners: Arc<Mutex<Registry<Listener>>>,
}

impl ManualEvents {
    /// Creates an event source with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatches `event` on `target`.
    ///
    /// Returns the number of listeners that received it.
    pub fn dispatch(&self, target: &Element, event: &str) -> usize {
        let listeners = self.listeners.lock();
        listeners
            .entries
            .values()
            .filter(|listener| listener.target == *target && listener.event == event)
            .filter(|listener| {
                listener
                    .events
                    .send(DomEvent {
                        target: target.clone(),
                        name: event.to_string(),
                    })
                    .is_ok()
            })
            .count()
    }

    /// Number of attached listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    /// Event names listened for on `target`.
    pub fn listened_events(&self, target: ElementId) -> Vec<String> {
        self.listeners
            .lock()
            .entries
            .values()
            .filter(|listener| listener.target.id() == target)
            .map(|listener| listener.event.clone())
            .collect()
    }
}

impl EventSource for ManualEvents {
    fn listen(&self, target: &Element, event: &str) -> BoxStream<'static, DomEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.listeners.lock().insert(Listener {
            target: target.clone(),
            event: event.to_string(),
            events: tx,
        });
        guarded_stream(rx, deregister(&self.listeners, id))
    }
}

impl fmt::Debug for ManualEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualEvents")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Bundle
// ----------------------------------------------------------------------------

/// All three manual capabilities, sharing state with the [`Platform`] they
/// produce.
#[derive(Debug, Clone, Default)]
pub struct ManualPlatform {
    /// Idle scheduling.
    pub idle: ManualIdle,
    /// Intersection observation.
    pub visibility: ManualVisibility,
    /// Event listening.
    pub events: ManualEvents,
}

impl ManualPlatform {
    /// Creates a manual platform with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform backed by all three manual capabilities.
    pub fn platform(&self) -> Platform {
        Platform::new()
            .with_idle(Arc::new(self.idle.clone()))
            .with_visibility(Arc::new(self.visibility.clone()))
            .with_events(Arc::new(self.events.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_request_resolves_on_fire() {
        let idle = ManualIdle::new();
        let request = idle.idle(Some(Duration::from_millis(100)));
        assert_eq!(idle.pending(), 1);
        assert_eq!(idle.requested_timeouts(), vec![Some(Duration::from_millis(100))]);

        assert_eq!(idle.fire(), 1);
        request.await;
        assert_eq!(idle.pending(), 0);
    }

    #[test]
    fn dropping_idle_request_cancels_it() {
        let idle = ManualIdle::new();
        let request = idle.idle(None);
        assert_eq!(idle.pending(), 1);

        drop(request);
        assert_eq!(idle.pending(), 0);
        assert_eq!(idle.fire(), 0);
    }

    #[tokio::test]
    async fn observer_receives_only_its_targets() {
        let visibility = ManualVisibility::new();
        let watched = Element::new("div");
        let other = Element::new("div");
        let targets: RootElementSet = [watched.clone()].into_iter().collect();

        let mut entries = visibility.observe(&targets, &VisibleOptions::default());
        assert_eq!(visibility.intersect(&other, 1.0), 0);
        assert_eq!(visibility.intersect(&watched, 0.25), 1);

        let batch = entries.next().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].target, watched);

        drop(entries);
        assert_eq!(visibility.observer_count(), 0);
    }

    #[tokio::test]
    async fn listener_filters_by_event_and_detaches_on_drop() {
        let events = ManualEvents::new();
        let button = Element::new("button");

        let mut focus = events.listen(&button, "focus");
        assert_eq!(events.listened_events(button.id()), vec!["focus".to_string()]);
        assert_eq!(events.dispatch(&button, "click"), 0);
        assert_eq!(events.dispatch(&button, "focus"), 1);
        assert_eq!(focus.next().await.unwrap().name, "focus");

        drop(focus);
        assert_eq!(events.listener_count(), 0);
        assert_eq!(events.dispatch(&button, "focus"), 0);
    }
}
