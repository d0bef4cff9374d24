//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! notifies subscribers when the value is replaced.
//!
//! # How Signals Work
//!
//! 1. Subscribers register a notification callback under a
//!    [`SubscriberId`].
//!
//! 2. When a signal's value is set, every registered callback runs.
//!
//! 3. Subscribers read the new value themselves; the notification carries
//!    no payload.
//!
//! # Thread Safety
//!
//! Signals are thread-safe. The value and the notifier list are each behind
//! their own lock, and notifiers are cloned out of the lock before they run,
//! so a callback may freely read the signal or unsubscribe itself.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::flag::{FlagSubscription, ReactiveFlag};
use super::subscriber::SubscriberId;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Notifier = Arc<dyn Fn() + Send + Sync>;

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use lazy_hydration_core::reactive::Signal;
///
/// let open = Signal::new(false);
/// open.set(true);
/// assert!(open.get());
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Notification callbacks keyed by subscriber.
    notifiers: Arc<RwLock<Vec<(SubscriberId, Notifier)>>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_signal_id(),
            value: Arc::new(RwLock::new(value)),
            notifiers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.notify_subscribers();
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.value.read());
        self.set(new_value);
    }

    /// Register a notification callback for a subscriber.
    ///
    /// The callback will be invoked when the signal's value changes.
    pub fn subscribe<F>(&self, subscriber_id: SubscriberId, notify: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifiers.write().push((subscriber_id, Arc::new(notify)));
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.notifiers.write().retain(|(id, _)| *id != subscriber_id);
    }

    /// Notify all subscribers that the value has changed.
    fn notify_subscribers(&self) {
        let notifiers: Vec<Notifier> = self
            .notifiers
            .read()
            .iter()
            .map(|(_, notify)| Arc::clone(notify))
            .collect();

        for notify in notifiers {
            notify();
        }
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.notifiers.read().len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            notifiers: Arc::clone(&self.notifiers),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl ReactiveFlag for Signal<bool> {
    fn is_set(&self) -> bool {
        self.get()
    }

    fn watch(&self, notify: Box<dyn Fn() + Send + Sync>) -> FlagSubscription {
        let id = SubscriberId::new();
        self.subscribe(id, notify);

        let signal = self.clone();
        FlagSubscription::new(move || signal.unsubscribe(id))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_unsubscribe_stops_notifications() {
        let signal = Signal::new(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let subscriber_id = SubscriberId::new();
        signal.subscribe(subscriber_id, move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.unsubscribe(subscriber_id);
        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn notifier_may_unsubscribe_itself() {
        let signal = Signal::new(0);
        let id = SubscriberId::new();
        let signal_clone = signal.clone();

        signal.subscribe(id, move || signal_clone.unsubscribe(id));
        signal.set(1);

        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn bool_signal_watch_drops_subscription() {
        let signal = Signal::new(false);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let subscription = signal.watch(Box::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(signal.subscriber_count(), 1);

        signal.set(true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(signal.is_set());

        drop(subscription);
        assert_eq!(signal.subscriber_count(), 0);
        signal.set(false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
