//! Lazy Hydration Core
//!
//! This crate delays the hydration of server-rendered UI regions until they
//! are actually needed. It implements:
//!
//! - A hydration state machine with cleanup and hydrated callbacks
//! - Trigger strategies (idle, visible, interaction, reactive flag)
//! - Waiting for async descendants before a region counts as hydrated
//! - A renderless `LazyRegion` wrapper and component wrap factories
//!
//! The host supplies the platform (idle scheduling, intersection
//! observation, DOM events) through the traits in [`platform`]; the
//! [`platform::manual`] implementations let a headless host or a test drive
//! it by hand.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `state`: Hydration phases, callbacks and the trigger operation
//! - `strategy`: When to trigger, backed by tokio tasks and cancellation tokens
//! - `readiness`: Async descendants a region waits for
//! - `locator`: Root elements of a region's rendered output
//! - `region`: The `LazyRegion` wrapper tying the above together
//! - `wrappers`: `wrap_*` factories for components
//! - `reactive`: Signals usable as hydration triggers
//!
//! # Example
//!
//! ```rust
//! use lazy_hydration_core::{use_lazy_hydration, RenderContext};
//!
//! let state = use_lazy_hydration(RenderContext::client());
//! state.on_hydrated(|| println!("hydrated"));
//!
//! // Nothing is pending inside the region, so this hydrates right away.
//! assert!(state.hydrate().is_triggered());
//! assert!(state.is_hydrated());
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod locator;
pub mod platform;
pub mod reactive;
pub mod readiness;
pub mod region;
pub mod state;
pub mod strategy;
pub mod wrappers;

pub use config::{
    IdleOptions, InteractionEvents, LazyRegionProps, TriggerSpec, VisibleOptions,
};
pub use error::HydrationError;
pub use region::{LazyRegion, RegionEnv};
pub use state::{use_lazy_hydration, HydrationState, Phase, RenderContext, TriggerOutcome};
pub use strategy::{
    use_hydrate_on_interaction, use_hydrate_when_idle, use_hydrate_when_triggered,
    use_hydrate_when_visible, StrategyHandle,
};
pub use wrappers::{
    wrap_never, wrap_on_interaction, wrap_when_idle, wrap_when_triggered, wrap_when_visible,
    Component, LazyComponent,
};
