//! Reactive Flags
//!
//! The signal strategy does not care which reactive system a flag comes
//! from. Anything that can report a boolean and call back when it may have
//! changed implements [`ReactiveFlag`]; [`Signal<bool>`](super::Signal)
//! does so out of the box.

/// A boolean-like reactive value.
pub trait ReactiveFlag: Send + Sync {
    /// Current value of the flag.
    fn is_set(&self) -> bool;

    /// Calls `notify` whenever the flag may have changed.
    ///
    /// Observation stops when the returned subscription is dropped.
    fn watch(&self, notify: Box<dyn Fn() + Send + Sync>) -> FlagSubscription;
}

/// Keeps a [`ReactiveFlag::watch`] registration alive.
#[must_use = "dropping the subscription stops observing the flag"]
pub struct FlagSubscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl FlagSubscription {
    /// Creates a subscription that runs `unsubscribe` when dropped.
    pub fn new<F>(unsubscribe: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for FlagSubscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for FlagSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagSubscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
