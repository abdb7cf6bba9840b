//! The [`Document`] host seam.

use std::cmp::Ordering;

use url::Url;

use crate::identifiers::NodeId;

use super::Rect;

// ============================================================================
// Marker
// ============================================================================

/// Classes the pipeline stamps on elements to remember per-element state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Image already went through source resolution.
    Scanned,
    /// The next source mutation on this element is our own swap.
    SourceUpdated,
    /// Element the viewer last focused; always kept by filtered scans.
    LastFocused,
}

impl Marker {
    /// Returns the class name written to the element.
    #[inline]
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Scanned => "image-discovery-scanned",
            Self::SourceUpdated => "image-discovery-source-updated",
            Self::LastFocused => "image-discovery-last-focused",
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// A rendered document the pipeline can inspect and patch.
///
/// Node handles are only meaningful for the document that produced them.
/// Queries on an unknown handle return empty values rather than failing.
pub trait Document: Send + Sync {
    /// Base URL relative sources are resolved against.
    fn base_url(&self) -> Url;

    /// Every element attached to the tree, in document order.
    fn elements(&self) -> Vec<NodeId>;

    /// Lower-case tag name.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    /// Attributes in declaration order.
    fn attributes(&self, node: NodeId) -> Vec<(String, String)>;

    /// Single attribute value.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Sets (or adds) an attribute.
    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    /// Parent element, `None` for the root or a detached node.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child elements in order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// On-screen rectangle.
    fn bounding_rect(&self, node: NodeId) -> Rect;

    /// Whether the element takes part in layout (has an offset parent or is
    /// fixed-positioned).
    fn is_rendered(&self, node: NodeId) -> bool;

    /// Computed `background-image`, `None` when it is `none`.
    fn background_image(&self, node: NodeId) -> Option<String>;

    /// Absolute URL the image element currently displays.
    fn current_source(&self, node: NodeId) -> String;

    /// Intrinsic width of the currently displayed image.
    fn natural_width(&self, node: NodeId) -> u32;

    // ========================================================================
    // Provided
    // ========================================================================

    /// Returns `true` if the element has the given tag.
    fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag_name(node)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    /// Elements with the given tag, in document order.
    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|&node| self.is_tag(node, tag))
            .collect()
    }

    /// Class list.
    fn classes(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if the element carries `class`.
    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).iter().any(|c| c == class)
    }

    /// Adds a class if missing.
    fn add_class(&self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        if classes.iter().any(|c| c == class) {
            return;
        }
        classes.push(class.to_string());
        self.set_attribute(node, "class", &classes.join(" "));
    }

    /// Removes a class if present.
    fn remove_class(&self, node: NodeId, class: &str) {
        let classes = self.classes(node);
        if !classes.iter().any(|c| c == class) {
            return;
        }
        let kept: Vec<_> = classes.into_iter().filter(|c| c != class).collect();
        self.set_attribute(node, "class", &kept.join(" "));
    }

    /// Returns `true` if the marker class is present.
    fn has_marker(&self, node: NodeId, marker: Marker) -> bool {
        self.has_class(node, marker.class_name())
    }

    /// Stamps a marker class.
    fn mark(&self, node: NodeId, marker: Marker) {
        self.add_class(node, marker.class_name());
    }

    /// Clears a marker class.
    fn unmark(&self, node: NodeId, marker: Marker) {
        self.remove_class(node, marker.class_name());
    }

    /// Nearest inclusive ancestor with the given tag.
    fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.is_tag(candidate, tag) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Descendants with the given tag, in document order.
    fn descendants_by_tag(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            if self.is_tag(current, tag) {
                found.push(current);
            }
            stack.extend(self.children(current).into_iter().rev());
        }
        found
    }

    /// Orders two nodes by document position.
    ///
    /// An ancestor sorts before its descendants. Nodes from disconnected
    /// trees fall back to handle order.
    fn compare_position(&self, a: NodeId, b: NodeId) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }

        let chain_a = ancestor_chain(self, a);
        let chain_b = ancestor_chain(self, b);

        let shared = chain_a
            .iter()
            .zip(chain_b.iter())
            .take_while(|(x, y)| x == y)
            .count();

        if shared == 0 {
            return a.cmp(&b);
        }
        if shared == chain_a.len() {
            return Ordering::Less;
        }
        if shared == chain_b.len() {
            return Ordering::Greater;
        }

        let siblings = self.children(chain_a[shared - 1]);
        let pos_a = siblings.iter().position(|&n| n == chain_a[shared]);
        let pos_b = siblings.iter().position(|&n| n == chain_b[shared]);
        pos_a.cmp(&pos_b)
    }

    /// Resolves a possibly relative URL against [`Document::base_url`].
    ///
    /// Unparseable input is returned unchanged.
    fn resolve_url(&self, raw: &str) -> String {
        self.base_url()
            .join(raw)
            .map(String::from)
            .unwrap_or_else(|_| raw.to_string())
    }

    /// Document protocol including the trailing colon (`https:`).
    fn protocol(&self) -> String {
        format!("{}:", self.base_url().scheme())
    }
}

/// Root-first ancestor chain ending at `node`.
fn ancestor_chain<D: Document + ?Sized>(doc: &D, node: NodeId) -> Vec<NodeId> {
    let mut chain = vec![node];
    let mut current = doc.parent(node);
    while let Some(parent) = current {
        chain.push(parent);
        current = doc.parent(parent);
    }
    chain.reverse();
    chain
}
