//! Reactive Primitives
//!
//! The hydration core needs very little from a reactive system: a value it
//! can read and a way to hear that the value changed. This module provides
//! a small thread-safe [`Signal`] for hosts without their own reactivity,
//! and the [`ReactiveFlag`] trait through which the signal strategy observes
//! any boolean-like source.

mod flag;
mod signal;
mod subscriber;

pub use flag::{FlagSubscription, ReactiveFlag};
pub use signal::Signal;
pub use subscriber::SubscriberId;
