//! Platform Capabilities
//!
//! The strategies never talk to a browser directly. Each platform feature
//! they rely on is a small trait returning a future or stream, and the
//! registration lives exactly as long as that future or stream:
//!
//! - [`IdleScheduler`]: resolves once the platform is idle;
//! - [`VisibilityObserver`]: yields intersection batches for a set of
//!   targets;
//! - [`EventSource`]: yields the events dispatched to one element.
//!
//! Dropping the future or stream must cancel the underlying idle request,
//! disconnect the observer or remove the listener. Strategies rely on that
//! to clean up after themselves.
//!
//! A [`Platform`] bundles whichever capabilities the host has. Missing ones
//! are feature-detected by the strategies, which then fall back.

pub mod manual;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

use crate::config::VisibleOptions;
use crate::dom::Element;
use crate::locator::RootElementSet;

/// Idle-time scheduling.
pub trait IdleScheduler: Send + Sync {
    /// Resolves when the platform is idle.
    ///
    /// `timeout` is forwarded as a hint; the idle strategy enforces it on
    /// its own as well.
    fn idle(&self, timeout: Option<Duration>) -> BoxFuture<'static, ()>;
}

/// Intersection observation.
pub trait VisibilityObserver: Send + Sync {
    /// Observes `targets` with one observer and yields each batch of
    /// entries the observer reports.
    fn observe(
        &self,
        targets: &RootElementSet,
        options: &VisibleOptions,
    ) -> BoxStream<'static, Vec<IntersectionEntry>>;
}

/// DOM event listening.
pub trait EventSource: Send + Sync {
    /// Listens for `event` on `target`.
    fn listen(&self, target: &Element, event: &str) -> BoxStream<'static, DomEvent>;
}

/// One target's state as reported by a visibility observer.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    /// The observed element.
    pub target: Element,
    /// Whether the target intersects the root.
    pub is_intersecting: bool,
    /// Visible fraction of the target, `0.0..=1.0`.
    pub ratio: f64,
}

impl IntersectionEntry {
    /// Returns true if the entry counts as visible for `min_threshold`.
    pub fn is_visible(&self, min_threshold: f64) -> bool {
        (self.is_intersecting || self.ratio > 0.0) && self.ratio >= min_threshold
    }
}

/// An event delivered to a root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Element the listener was attached to.
    pub target: Element,
    /// Event name, e.g. `focus`.
    pub name: String,
}

/// The capabilities available to the strategies.
#[derive(Clone, Default)]
pub struct Platform {
    idle: Option<Arc<dyn IdleScheduler>>,
    visibility: Option<Arc<dyn VisibilityObserver>>,
    events: Option<Arc<dyn EventSource>>,
}

impl Platform {
    /// A platform with no capabilities.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds idle scheduling.
    pub fn with_idle(mut self, idle: Arc<dyn IdleScheduler>) -> Self {
        self.idle = Some(idle);
        self
    }

    /// Adds intersection observation.
    pub fn with_visibility(mut self, visibility: Arc<dyn VisibilityObserver>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Adds event listening.
    pub fn with_events(mut self, events: Arc<dyn EventSource>) -> Self {
        self.events = Some(events);
        self
    }

    /// Idle scheduling, if supported.
    pub fn idle(&self) -> Option<&Arc<dyn IdleScheduler>> {
        self.idle.as_ref()
    }

    /// Intersection observation, if supported.
    pub fn visibility(&self) -> Option<&Arc<dyn VisibilityObserver>> {
        self.visibility.as_ref()
    }

    /// Event listening, if supported.
    pub fn events(&self) -> Option<&Arc<dyn EventSource>> {
        self.events.as_ref()
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("idle", &self.idle.is_some())
            .field("visibility", &self.visibility.is_some())
            .field("events", &self.events.is_some())
            .finish()
    }
}
