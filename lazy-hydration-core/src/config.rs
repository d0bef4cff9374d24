//! Trigger Configuration
//!
//! Typed configuration for the four trigger strategies, the named defaults
//! they fall back to, and the serializable props a lazy region is declared
//! with in server-rendered markup.
//!
//! # Props
//!
//! Region props arrive loosely typed: `whenIdle` may be `false`, `true` or a
//! timeout in milliseconds; `whenVisible` may be `false`, `true` or an
//! observer options object; `onInteraction` may be `false`, `true`, one event
//! name or a list of names. The `*Prop` enums accept exactly those shapes and
//! [`LazyRegionProps::into_trigger`] normalises them into a single
//! [`TriggerSpec`], validating once at construction.
//!
//! ```rust,ignore
//! let props = LazyRegionProps::from_json(r#"{ "whenIdle": 4000 }"#)?;
//! let trigger = props.into_trigger()?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

use crate::error::HydrationError;
use crate::reactive::ReactiveFlag;

/// Timeout used by the idle strategy when none is given.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Events the interaction strategy listens for when none are given.
pub const DEFAULT_INTERACTION_EVENTS: &[&str] = &["focus"];

/// Root margin used by the visibility observer when none is given.
pub const DEFAULT_ROOT_MARGIN: &str = "0px";

// ----------------------------------------------------------------------------
// Idle
// ----------------------------------------------------------------------------

/// Options for the idle strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleOptions {
    /// Upper bound on how long to wait for the platform to become idle.
    ///
    /// `None` waits for the idle signal alone, or for the next scheduler
    /// turn when the platform cannot report idleness.
    pub timeout: Option<Duration>,
}

impl IdleOptions {
    /// Idle options with an explicit timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Idle options with no deadline.
    pub fn without_timeout() -> Self {
        Self { timeout: None }
    }
}

impl Default for IdleOptions {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_IDLE_TIMEOUT)
    }
}

impl From<Duration> for IdleOptions {
    fn from(timeout: Duration) -> Self {
        Self::with_timeout(timeout)
    }
}

// ----------------------------------------------------------------------------
// Visible
// ----------------------------------------------------------------------------

/// Options handed to the platform's intersection observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisibleOptions {
    /// CSS-style margin grown around the observer root.
    pub root_margin: String,

    /// Visibility ratios at which the observer reports.
    #[serde(deserialize_with = "one_or_many")]
    pub threshold: Vec<f64>,
}

impl Default for VisibleOptions {
    fn default() -> Self {
        Self {
            root_margin: DEFAULT_ROOT_MARGIN.to_string(),
            threshold: vec![0.0],
        }
    }
}

impl VisibleOptions {
    /// Sets the root margin.
    pub fn root_margin(mut self, margin: impl Into<String>) -> Self {
        self.root_margin = margin.into();
        self
    }

    /// Sets the thresholds.
    pub fn threshold(mut self, threshold: impl Into<Vec<f64>>) -> Self {
        self.threshold = threshold.into();
        self
    }

    /// Checks that every threshold lies within `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), HydrationError> {
        match self
            .threshold
            .iter()
            .find(|t| !(0.0..=1.0).contains(*t))
        {
            Some(bad) => Err(HydrationError::InvalidConfig(format!(
                "visibility threshold {bad} is outside 0.0..=1.0"
            ))),
            None => Ok(()),
        }
    }

    /// The smallest ratio that counts as visible.
    pub fn min_threshold(&self) -> f64 {
        self.threshold
            .iter()
            .copied()
            .reduce(f64::min)
            .unwrap_or(0.0)
            .clamp(0.0, 1.0)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(f64),
        Many(Vec<f64>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

// ----------------------------------------------------------------------------
// Interaction
// ----------------------------------------------------------------------------

/// Events the interaction strategy listens for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvents {
    /// Interaction never triggers hydration.
    Disabled,
    /// Any of these events on a root element triggers hydration.
    Events(SmallVec<[String; 2]>),
}

impl InteractionEvents {
    /// The configured event names; empty when disabled.
    pub fn names(&self) -> &[String] {
        match self {
            Self::Disabled => &[],
            Self::Events(events) => events,
        }
    }

    /// Returns true when no events are configured.
    pub fn is_disabled(&self) -> bool {
        self.names().is_empty()
    }
}

impl Default for InteractionEvents {
    fn default() -> Self {
        Self::Events(
            DEFAULT_INTERACTION_EVENTS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        )
    }
}

impl From<bool> for InteractionEvents {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::default()
        } else {
            Self::Disabled
        }
    }
}

impl From<&str> for InteractionEvents {
    fn from(event: &str) -> Self {
        Self::Events(SmallVec::from_iter([event.to_string()]))
    }
}

impl From<String> for InteractionEvents {
    fn from(event: String) -> Self {
        Self::Events(SmallVec::from_iter([event]))
    }
}

impl From<Vec<String>> for InteractionEvents {
    fn from(events: Vec<String>) -> Self {
        Self::Events(SmallVec::from_vec(events))
    }
}

impl From<&[&str]> for InteractionEvents {
    fn from(events: &[&str]) -> Self {
        Self::Events(events.iter().map(|e| e.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for InteractionEvents {
    fn from(events: [&str; N]) -> Self {
        Self::from(&events[..])
    }
}

// ----------------------------------------------------------------------------
// Trigger descriptor
// ----------------------------------------------------------------------------

/// The single trigger a lazy region arms at mount.
#[derive(Clone)]
pub enum TriggerSpec {
    /// No strategy; only an explicit `hydrate()` call hydrates.
    Never,
    /// Hydrate when the platform is idle.
    Idle(IdleOptions),
    /// Hydrate when a root element becomes visible.
    Visible(VisibleOptions),
    /// Hydrate on the first configured event on a root element.
    Interaction(InteractionEvents),
    /// Hydrate when the flag becomes true.
    Signal(Arc<dyn ReactiveFlag>),
}

impl TriggerSpec {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Idle(_) => "idle",
            Self::Visible(_) => "visible",
            Self::Interaction(_) => "interaction",
            Self::Signal(_) => "triggered",
        }
    }
}

impl Default for TriggerSpec {
    fn default() -> Self {
        Self::Never
    }
}

impl fmt::Debug for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("Never"),
            Self::Idle(options) => f.debug_tuple("Idle").field(options).finish(),
            Self::Visible(options) => f.debug_tuple("Visible").field(options).finish(),
            Self::Interaction(events) => f.debug_tuple("Interaction").field(events).finish(),
            Self::Signal(flag) => f.debug_tuple("Signal").field(&flag.is_set()).finish(),
        }
    }
}

// ----------------------------------------------------------------------------
// Props
// ----------------------------------------------------------------------------

/// `whenIdle` prop: `false`, `true` or a timeout in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdleProp {
    /// `true` uses the default timeout.
    Flag(bool),
    /// Timeout in milliseconds; `0` disables the prop.
    Timeout(u64),
}

/// `whenVisible` prop: `false`, `true` or observer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibleProp {
    /// `true` uses default observer options.
    Flag(bool),
    /// Explicit observer options.
    Options(VisibleOptions),
}

/// `onInteraction` prop: `false`, `true`, one event name or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteractionProp {
    /// `true` uses the default events.
    Flag(bool),
    /// A single event name.
    One(String),
    /// Several event names.
    Many(Vec<String>),
}

/// Props a lazy region is declared with.
///
/// The `whenTriggered` flag is a live reactive value and cannot come from
/// serialized markup; attach it with [`LazyRegionProps::when_triggered`].
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LazyRegionProps {
    /// `whenIdle` prop.
    #[serde(default)]
    pub when_idle: Option<IdleProp>,
    /// `whenVisible` prop.
    #[serde(default)]
    pub when_visible: Option<VisibleProp>,
    /// `onInteraction` prop.
    #[serde(default)]
    pub on_interaction: Option<InteractionProp>,
    /// `whenTriggered` prop.
    #[serde(skip)]
    pub when_triggered: Option<Arc<dyn ReactiveFlag>>,
}

impl LazyRegionProps {
    /// Parses props from their JSON form.
    pub fn from_json(json: &str) -> Result<Self, HydrationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Attaches the `whenTriggered` flag.
    pub fn when_triggered(mut self, flag: Arc<dyn ReactiveFlag>) -> Self {
        self.when_triggered = Some(flag);
        self
    }

    /// Normalises the props into the one trigger the region arms.
    ///
    /// Props that are absent or disabled (`false`, `0`) are ignored. No
    /// enabled prop yields [`TriggerSpec::Never`]; more than one is rejected.
    pub fn into_trigger(self) -> Result<TriggerSpec, HydrationError> {
        let mut enabled = Vec::with_capacity(1);

        match self.when_idle {
            Some(IdleProp::Flag(true)) => enabled.push(TriggerSpec::Idle(IdleOptions::default())),
            Some(IdleProp::Timeout(ms)) if ms > 0 => enabled.push(TriggerSpec::Idle(
                IdleOptions::with_timeout(Duration::from_millis(ms)),
            )),
            _ => {}
        }

        match self.when_visible {
            Some(VisibleProp::Flag(true)) => {
                enabled.push(TriggerSpec::Visible(VisibleOptions::default()))
            }
            Some(VisibleProp::Options(options)) => {
                options.validate()?;
                enabled.push(TriggerSpec::Visible(options));
            }
            _ => {}
        }

        let events = match self.on_interaction {
            Some(InteractionProp::Flag(flag)) => InteractionEvents::from(flag),
            Some(InteractionProp::One(event)) => InteractionEvents::from(event),
            Some(InteractionProp::Many(events)) => InteractionEvents::from(events),
            None => InteractionEvents::Disabled,
        };
        if !events.is_disabled() {
            enabled.push(TriggerSpec::Interaction(events));
        }

        if let Some(flag) = self.when_triggered {
            enabled.push(TriggerSpec::Signal(flag));
        }

        if enabled.len() > 1 {
            let names: Vec<_> = enabled.iter().map(TriggerSpec::name).collect();
            return Err(HydrationError::InvalidConfig(format!(
                "a lazy region accepts one trigger, got {}",
                names.join(", ")
            )));
        }

        Ok(enabled.pop().unwrap_or(TriggerSpec::Never))
    }
}

impl fmt::Debug for LazyRegionProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRegionProps")
            .field("when_idle", &self.when_idle)
            .field("when_visible", &self.when_visible)
            .field("on_interaction", &self.on_interaction)
            .field("when_triggered", &self.when_triggered.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
