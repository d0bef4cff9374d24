//! Rendered Node Model
//!
//! A host-neutral view of what a region rendered into the document. The
//! host maps its own DOM handles onto [`Element`]s, which only need a stable
//! identity for as long as the region stays mounted; observers and event
//! sources are keyed by that identity.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of a rendered element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    /// Generate a new unique element ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for ElementId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Handle to a rendered element.
///
/// Cloning the handle does not clone the element; two handles are equal
/// when they refer to the same element.
#[derive(Clone)]
pub struct Element {
    id: ElementId,
    tag: Arc<str>,
}

impl Element {
    /// Creates a handle for a freshly rendered element.
    pub fn new(tag: &str) -> Self {
        Self::with_id(ElementId::new(), tag)
    }

    /// Creates a handle for an element the host already identifies.
    pub fn with_id(id: ElementId, tag: &str) -> Self {
        Self {
            id,
            tag: Arc::from(tag),
        }
    }

    /// The element's identity.
    pub fn id(&self) -> ElementId {
        self.id
    }

    /// The element's tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.tag, self.id.0)
    }
}

/// One node of a region's rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedNode {
    /// An element. Its own children are irrelevant to hydration scheduling.
    Element(Element),
    /// A text node.
    Text(String),
    /// A comment, including placeholder comments left by the framework.
    Comment(String),
    /// A fragment or component wrapper whose children render in its place.
    Fragment(Vec<RenderedNode>),
}

impl RenderedNode {
    /// A text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A comment node.
    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment(text.into())
    }

    /// A fragment wrapping `children`.
    pub fn fragment(children: impl IntoIterator<Item = RenderedNode>) -> Self {
        Self::Fragment(children.into_iter().collect())
    }
}

impl From<Element> for RenderedNode {
    fn from(element: Element) -> Self {
        Self::Element(element)
    }
}
