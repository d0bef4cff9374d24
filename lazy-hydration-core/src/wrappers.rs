//! Import Wrappers
//!
//! Factories that wrap a component so it ships server-rendered and hydrates
//! lazily. The wrapper renders exactly what the component renders, with the
//! same props; the only addition is the [`LazyRegion`] it builds around the
//! component, configured with the chosen trigger.

use std::fmt;
use std::sync::Arc;

use crate::config::{IdleOptions, InteractionEvents, TriggerSpec, VisibleOptions};
use crate::error::HydrationError;
use crate::reactive::ReactiveFlag;
use crate::region::{LazyRegion, RegionEnv};

/// A renderable component.
pub trait Component: Send + Sync + 'static {
    /// Props the component renders from.
    type Props;
    /// What rendering produces.
    type Output;

    /// Renders the component from `props`.
    fn render(&self, props: &Self::Props) -> Self::Output;
}

impl<C: Component> Component for Arc<C> {
    type Props = C::Props;
    type Output = C::Output;

    fn render(&self, props: &Self::Props) -> Self::Output {
        C::render(self, props)
    }
}

/// A component wrapped in a lazy region.
pub struct LazyComponent<C> {
    component: Arc<C>,
    trigger: TriggerSpec,
}

impl<C: Component> LazyComponent<C> {
    fn new(component: C, trigger: TriggerSpec) -> Self {
        Self {
            component: Arc::new(component),
            trigger,
        }
    }

    /// The wrapped component.
    pub fn inner(&self) -> &C {
        &self.component
    }

    /// Trigger the region is built with.
    pub fn trigger(&self) -> &TriggerSpec {
        &self.trigger
    }

    /// Builds the region that hosts one instance of the component.
    pub fn region(&self, env: &RegionEnv) -> Result<LazyRegion<Arc<C>>, HydrationError> {
        LazyRegion::builder(Arc::clone(&self.component))
            .trigger(self.trigger.clone())
            .env(env)
            .build()
    }
}

impl<C: Component> Component for LazyComponent<C> {
    type Props = C::Props;
    type Output = C::Output;

    fn render(&self, props: &Self::Props) -> Self::Output {
        self.component.render(props)
    }
}

impl<C> Clone for LazyComponent<C> {
    fn clone(&self) -> Self {
        Self {
            component: Arc::clone(&self.component),
            trigger: self.trigger.clone(),
        }
    }
}

impl<C> fmt::Debug for LazyComponent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyComponent")
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Never hydrates on its own; only an explicit `hydrate()` does.
pub fn wrap_never<C: Component>(component: C) -> LazyComponent<C> {
    LazyComponent::new(component, TriggerSpec::Never)
}

/// Hydrates when the platform is idle, or after the timeout.
pub fn wrap_when_idle<C: Component>(
    component: C,
    options: impl Into<IdleOptions>,
) -> LazyComponent<C> {
    LazyComponent::new(component, TriggerSpec::Idle(options.into()))
}

/// Hydrates when a root element becomes visible.
pub fn wrap_when_visible<C: Component>(
    component: C,
    options: VisibleOptions,
) -> LazyComponent<C> {
    LazyComponent::new(component, TriggerSpec::Visible(options))
}

/// Hydrates on the first of `events` on a root element.
pub fn wrap_on_interaction<C: Component>(
    component: C,
    events: impl Into<InteractionEvents>,
) -> LazyComponent<C> {
    LazyComponent::new(component, TriggerSpec::Interaction(events.into()))
}

/// Hydrates when `flag` turns true.
pub fn wrap_when_triggered<C: Component>(
    component: C,
    flag: Arc<dyn ReactiveFlag>,
) -> LazyComponent<C> {
    LazyComponent::new(component, TriggerSpec::Signal(flag))
}
