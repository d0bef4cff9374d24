//! Root Element Locator
//!
//! Visibility and interaction strategies observe the elements a region
//! rendered at its top level. The locator walks the rendered output once,
//! after mount, and keeps the result for the rest of the region's life:
//!
//! - text and comment nodes are skipped;
//! - fragments are flattened into their children;
//! - repeated references to the same element are kept once, in first-seen
//!   order.

use std::sync::OnceLock;

use indexmap::IndexSet;

use crate::dom::{Element, RenderedNode};

/// Ordered, deduplicated top-level elements of a region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootElementSet {
    elements: IndexSet<Element>,
}

impl RootElementSet {
    /// Number of root elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true when the region rendered no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns true if `element` is one of the roots.
    pub fn contains(&self, element: &Element) -> bool {
        self.elements.contains(element)
    }

    /// Iterates the roots in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    /// Copies the roots into a vector.
    pub fn to_vec(&self) -> Vec<Element> {
        self.elements.iter().cloned().collect()
    }
}

impl FromIterator<Element> for RootElementSet {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RootElementSet {
    type Item = &'a Element;
    type IntoIter = indexmap::set::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Collects the top-level elements of `rendered`.
pub fn locate(rendered: &[RenderedNode]) -> RootElementSet {
    let mut elements = IndexSet::new();
    for node in rendered {
        collect(node, &mut elements);
    }
    RootElementSet { elements }
}

fn collect(node: &RenderedNode, elements: &mut IndexSet<Element>) {
    match node {
        RenderedNode::Element(element) => {
            elements.insert(element.clone());
        }
        RenderedNode::Fragment(children) => {
            for child in children {
                collect(child, elements);
            }
        }
        RenderedNode::Text(_) | RenderedNode::Comment(_) => {}
    }
}

/// Locates a region's root elements once and caches them.
#[derive(Debug, Default)]
pub struct RootElementLocator {
    roots: OnceLock<RootElementSet>,
}

impl RootElementLocator {
    /// Creates a locator that has not seen the region yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the region's roots, scanning `rendered` on the first call.
    ///
    /// Later calls return the cached set and ignore `rendered`; element
    /// identity is stable until the region unmounts.
    pub fn locate(&self, rendered: &[RenderedNode]) -> &RootElementSet {
        self.roots.get_or_init(|| {
            let roots = locate(rendered);
            tracing::debug!(root_count = roots.len(), "located lazy region roots");
            roots
        })
    }

    /// The cached roots, if the region was located already.
    pub fn get(&self) -> Option<&RootElementSet> {
        self.roots.get()
    }
}
