//! Lazy Region
//!
//! The renderless wrapper hosts put around server-rendered markup. It always
//! renders its children; what it adds is the hydration lifecycle:
//!
//! 1. Build the region with one trigger (or props that normalise to one).
//! 2. After the children are in the document, call [`LazyRegion::mount`]
//!    with what they rendered. The region locates its root elements and
//!    arms its strategy.
//! 3. Before the children leave the document, call
//!    [`LazyRegion::unmount`] (dropping the region does the same).
//!
//! # Example
//!
//! ```rust
//! use lazy_hydration_core::dom::{Element, RenderedNode};
//! use lazy_hydration_core::platform::manual::ManualPlatform;
//! use lazy_hydration_core::region::{LazyRegion, RegionEnv};
//! use lazy_hydration_core::config::{InteractionEvents, TriggerSpec};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), lazy_hydration_core::error::HydrationError> {
//! let platform = ManualPlatform::new();
//! let mut region = LazyRegion::builder("<button>Buy</button>")
//!     .trigger(TriggerSpec::Interaction(InteractionEvents::default()))
//!     .env(&RegionEnv::client(platform.platform()))
//!     .build()?;
//!
//! let button = Element::new("button");
//! region.mount(&[RenderedNode::from(button.clone())])?;
//!
//! platform.events.dispatch(&button, "focus");
//! assert!(region.hydrated().await);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::config::{LazyRegionProps, TriggerSpec};
use crate::dom::RenderedNode;
use crate::error::HydrationError;
use crate::locator::{RootElementLocator, RootElementSet};
use crate::platform::Platform;
use crate::readiness::SubtreeReadiness;
use crate::state::{HydrationState, Phase, RenderContext, TriggerOutcome};
use crate::strategy::{
    use_hydrate_on_interaction, use_hydrate_when_idle, use_hydrate_when_triggered,
    use_hydrate_when_visible, StrategyHandle,
};

/// Where a region renders and what the platform offers it.
#[derive(Debug, Clone)]
pub struct RegionEnv {
    /// Render context the region is created in.
    pub context: RenderContext,
    /// Platform capabilities available to strategies.
    pub platform: Platform,
}

impl RegionEnv {
    /// A server render: nothing is ever armed.
    pub fn server() -> Self {
        Self {
            context: RenderContext::Server,
            platform: Platform::new(),
        }
    }

    /// A client render of server markup that still needs hydrating.
    pub fn client(platform: Platform) -> Self {
        Self {
            context: RenderContext::client(),
            platform,
        }
    }
}

/// Builder for [`LazyRegion`].
pub struct LazyRegionBuilder<C> {
    children: C,
    trigger: Result<TriggerSpec, HydrationError>,
    context: RenderContext,
    platform: Platform,
    disabled: bool,
}

impl<C> LazyRegionBuilder<C> {
    /// Sets the trigger directly.
    pub fn trigger(mut self, trigger: TriggerSpec) -> Self {
        self.trigger = Ok(trigger);
        self
    }

    /// Sets the trigger from declarative props.
    ///
    /// Invalid props surface from [`build`](Self::build).
    pub fn props(mut self, props: LazyRegionProps) -> Self {
        self.trigger = props.into_trigger();
        self
    }

    /// Sets the render context. Defaults to a client render.
    pub fn context(mut self, context: RenderContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the platform capabilities strategies may use.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Takes context and platform from `env`.
    pub fn env(self, env: &RegionEnv) -> Self {
        self.context(env.context).platform(env.platform.clone())
    }

    /// Renders the children without ever hydrating them.
    pub fn disable_hydration(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Builds the region. Nothing is armed until it is mounted.
    pub fn build(self) -> Result<LazyRegion<C>, HydrationError> {
        let trigger = self.trigger?;
        if let TriggerSpec::Visible(options) = &trigger {
            options.validate()?;
        }

        let will_perform = !self.disabled && self.context.will_perform_hydration();
        let readiness = SubtreeReadiness::new();
        let state = HydrationState::with_readiness(will_perform, Arc::new(readiness.clone()));
        tracing::trace!(trigger = trigger.name(), will_perform, "lazy region created");

        Ok(LazyRegion {
            children: self.children,
            state,
            trigger,
            platform: self.platform,
            readiness,
            locator: RootElementLocator::new(),
            strategy: None,
            mounted: false,
        })
    }
}

/// A server-rendered region that hydrates lazily.
pub struct LazyRegion<C> {
    children: C,
    state: HydrationState,
    trigger: TriggerSpec,
    platform: Platform,
    readiness: SubtreeReadiness,
    locator: RootElementLocator,
    strategy: Option<StrategyHandle>,
    mounted: bool,
}

impl<C> LazyRegion<C> {
    /// Starts building a region around `children`.
    ///
    /// Defaults to a client render with no platform capabilities and no
    /// trigger.
    pub fn builder(children: C) -> LazyRegionBuilder<C> {
        LazyRegionBuilder {
            children,
            trigger: Ok(TriggerSpec::Never),
            context: RenderContext::client(),
            platform: Platform::new(),
            disabled: false,
        }
    }

    /// The children, unchanged. Rendering never depends on hydration.
    pub fn render(&self) -> &C {
        &self.children
    }

    /// The underlying hydration state.
    pub fn state(&self) -> &HydrationState {
        &self.state
    }

    /// Current hydration phase.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// False for a server pass or a region with hydration disabled.
    pub fn will_perform_hydration(&self) -> bool {
        self.state.will_perform_hydration()
    }

    /// The configured trigger.
    pub fn trigger(&self) -> &TriggerSpec {
        &self.trigger
    }

    /// The armed strategy, if mounting armed one.
    pub fn strategy(&self) -> Option<&StrategyHandle> {
        self.strategy.as_ref()
    }

    /// Registry async descendants announce themselves on.
    pub fn readiness(&self) -> &SubtreeReadiness {
        &self.readiness
    }

    /// Root elements located at mount.
    pub fn root_elements(&self) -> Option<&RootElementSet> {
        self.locator.get()
    }

    /// See [`HydrationState::on_hydrated`].
    pub fn on_hydrated<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.state.on_hydrated(callback)
    }

    /// See [`HydrationState::on_cleanup`].
    pub fn on_cleanup<F>(&self, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.state.on_cleanup(callback)
    }

    /// Hydrates now, regardless of the trigger.
    pub fn hydrate(&self) -> TriggerOutcome {
        self.state.hydrate()
    }

    /// Waits until the region hydrated. See [`HydrationState::hydrated`].
    pub async fn hydrated(&self) -> bool {
        self.state.hydrated().await
    }

    /// Locates the root elements in `rendered` and arms the trigger.
    ///
    /// Mounting twice is a no-op. A server pass or a region that already
    /// hydrated arms nothing.
    pub fn mount(&mut self, rendered: &[RenderedNode]) -> Result<(), HydrationError> {
        if self.mounted {
            return Ok(());
        }
        self.mounted = true;

        let roots = self.locator.locate(rendered);
        if !self.state.is_pending() {
            return Ok(());
        }

        let state = &self.state;
        let platform = &self.platform;
        let handle = match &self.trigger {
            TriggerSpec::Never => return Ok(()),
            TriggerSpec::Idle(options) => use_hydrate_when_idle(state, platform, *options)?,
            TriggerSpec::Visible(options) => {
                use_hydrate_when_visible(state, platform, roots, options.clone())?
            }
            TriggerSpec::Interaction(events) => {
                use_hydrate_on_interaction(state, platform, roots, events.clone())?
            }
            TriggerSpec::Signal(flag) => use_hydrate_when_triggered(state, Arc::clone(flag))?,
        };
        self.strategy = Some(handle);
        Ok(())
    }

    /// Tears the region down, cancelling whatever is still armed.
    pub fn unmount(&mut self) {
        if self.mounted {
            tracing::trace!(phase = ?self.phase(), "lazy region unmounted");
        }
        self.mounted = false;
        self.state.dispose();
    }
}

impl<C> Drop for LazyRegion<C> {
    fn drop(&mut self) {
        self.state.dispose();
    }
}

impl<C> fmt::Debug for LazyRegion<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRegion")
            .field("phase", &self.phase())
            .field("trigger", &self.trigger)
            .field("mounted", &self.mounted)
            .field("roots", &self.root_elements().map(RootElementSet::len))
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
