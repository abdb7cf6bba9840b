//! In-memory [`Document`] implementation.
//!
//! [`StaticDocument`] holds an arena of element nodes behind a lock so the
//! pipeline can patch sources while other tasks keep appending content, the
//! way an infinitely scrolling page does.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::NodeId;

use super::{Document, Rect};

// ============================================================================
// ElementSpec
// ============================================================================

/// Description of an element to append to a [`StaticDocument`].
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag: String,
    attributes: Vec<(String, String)>,
    rect: Rect,
    rendered: bool,
    background: Option<String>,
    natural_width: u32,
}

impl ElementSpec {
    /// Creates a spec for a rendered, zero-sized element.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: Vec::new(),
            rect: Rect::default(),
            rendered: true,
            background: None,
            natural_width: 0,
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Sets the on-screen rectangle.
    #[must_use]
    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    /// Sets the rendered size at the origin.
    #[must_use]
    pub fn size(self, width: f64, height: f64) -> Self {
        self.rect(Rect::from_size(width, height))
    }

    /// Sets the computed `background-image` value.
    #[must_use]
    pub fn background(mut self, value: impl Into<String>) -> Self {
        self.background = Some(value.into());
        self
    }

    /// Sets the intrinsic width of the displayed image.
    #[must_use]
    pub fn natural_width(mut self, width: u32) -> Self {
        self.natural_width = width;
        self
    }

    /// Marks the element as taken out of layout (`display: none`).
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.rendered = false;
        self
    }
}

// ============================================================================
// NodeData
// ============================================================================

#[derive(Debug)]
struct NodeData {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: Vec<(String, String)>,
    rect: Rect,
    rendered: bool,
    background: Option<String>,
    natural_width: u32,
    current_src: String,
    source_pinned: bool,
}

impl NodeData {
    fn from_spec(spec: ElementSpec, parent: Option<NodeId>) -> Self {
        Self {
            tag: spec.tag,
            parent,
            children: Vec::new(),
            attributes: spec.attributes,
            rect: spec.rect,
            rendered: spec.rendered,
            background: spec.background,
            natural_width: spec.natural_width,
            current_src: String::new(),
            source_pinned: false,
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Picks what an image element displays: the first `srcset` candidate
    /// when present, otherwise `src`.
    fn displayed_source(&self) -> Option<&str> {
        let from_srcset = self.attribute("srcset").and_then(|srcset| {
            srcset
                .split(',')
                .next()
                .and_then(|entry| entry.split_whitespace().next())
        });
        from_srcset.or_else(|| self.attribute("src").filter(|s| !s.is_empty()))
    }
}

// ============================================================================
// StaticDocument
// ============================================================================

/// Arena-backed document snapshot.
///
/// Image elements keep a `currentSrc` that follows their `src`/`srcset`
/// attributes synchronously, so a source swap settles immediately unless the
/// node was pinned with [`StaticDocument::pin_current_source`].
#[derive(Debug)]
pub struct StaticDocument {
    base: Url,
    nodes: RwLock<Vec<NodeData>>,
}

impl StaticDocument {
    /// Creates an empty document with an `html` root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `base` is not an absolute URL.
    pub fn new(base: &str) -> Result<Self> {
        let base = Url::parse(base).map_err(|e| Error::invalid_url(base, e))?;
        let root = NodeData::from_spec(ElementSpec::new("html"), None);
        Ok(Self {
            base,
            nodes: RwLock::new(vec![root]),
        })
    }

    /// Returns the root element.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    /// Appends an element as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if `parent` is unknown.
    pub fn append(&self, parent: NodeId, spec: ElementSpec) -> Result<NodeId> {
        let mut nodes = self.nodes.write();
        if parent.index() >= nodes.len() {
            return Err(Error::node_not_found(parent));
        }

        let node = NodeId::new(nodes.len());
        nodes.push(NodeData::from_spec(spec, Some(parent)));
        nodes[parent.index()].children.push(node);
        self.refresh_source(&mut nodes[node.index()]);
        Ok(node)
    }

    /// Detaches an element (and its subtree) from the tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if `node` is unknown.
    pub fn detach(&self, node: NodeId) -> Result<()> {
        let mut nodes = self.nodes.write();
        let parent = nodes
            .get_mut(node.index())
            .ok_or_else(|| Error::node_not_found(node))?
            .parent
            .take();
        if let Some(parent) = parent {
            nodes[parent.index()].children.retain(|&child| child != node);
        }
        Ok(())
    }

    /// Moves an element's on-screen rectangle.
    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        if let Some(data) = self.nodes.write().get_mut(node.index()) {
            data.rect = rect;
        }
    }

    /// Updates the intrinsic width of the displayed image.
    pub fn set_natural_width(&self, node: NodeId, width: u32) {
        if let Some(data) = self.nodes.write().get_mut(node.index()) {
            data.natural_width = width;
        }
    }

    /// Freezes `currentSrc` so attribute writes no longer change what the
    /// element displays. Models a host that never reports the swap.
    pub fn pin_current_source(&self, node: NodeId) {
        if let Some(data) = self.nodes.write().get_mut(node.index()) {
            data.source_pinned = true;
        }
    }

    /// Number of nodes ever created, attached or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    fn refresh_source(&self, data: &mut NodeData) {
        if data.source_pinned || data.tag != "img" {
            return;
        }
        data.current_src = data
            .displayed_source()
            .map(|raw| {
                self.base
                    .join(raw)
                    .map(String::from)
                    .unwrap_or_else(|_| raw.to_string())
            })
            .unwrap_or_default();
    }

    fn collect_tree(nodes: &[NodeData], root: NodeId, out: &mut Vec<NodeId>) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(nodes[node.index()].children.iter().rev().copied());
        }
    }
}

// ============================================================================
// Document Implementation
// ============================================================================

impl Document for StaticDocument {
    fn base_url(&self) -> Url {
        self.base.clone()
    }

    fn elements(&self) -> Vec<NodeId> {
        let nodes = self.nodes.read();
        let mut out = Vec::with_capacity(nodes.len());
        Self::collect_tree(&nodes, self.root(), &mut out);
        out
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.nodes.read().get(node.index()).map(|d| d.tag.clone())
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.nodes
            .read()
            .get(node.index())
            .map(|d| d.attributes.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .read()
            .get(node.index())
            .and_then(|d| d.attribute(name).map(str::to_string))
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut nodes = self.nodes.write();
        let Some(data) = nodes.get_mut(node.index()) else {
            return;
        };

        match data.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => data
                .attributes
                .push((name.to_string(), value.to_string())),
        }

        if name == "src" || name == "srcset" {
            self.refresh_source(data);
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.read().get(node.index()).and_then(|d| d.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .read()
            .get(node.index())
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.nodes
            .read()
            .get(node.index())
            .map(|d| d.rect)
            .unwrap_or_default()
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        self.nodes
            .read()
            .get(node.index())
            .is_some_and(|d| d.rendered)
    }

    fn background_image(&self, node: NodeId) -> Option<String> {
        self.nodes
            .read()
            .get(node.index())
            .and_then(|d| d.background.clone())
            .filter(|value| value != "none")
    }

    fn current_source(&self, node: NodeId) -> String {
        self.nodes
            .read()
            .get(node.index())
            .map(|d| d.current_src.clone())
            .unwrap_or_default()
    }

    fn natural_width(&self, node: NodeId) -> u32 {
        self.nodes
            .read()
            .get(node.index())
            .map_or(0, |d| d.natural_width)
    }
}

// ============================================================================
// Tests
// ============================================================================
