//! Candidates found during one scan, and the published list entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::NodeId;

// ============================================================================
// Anchor
// ============================================================================

/// What owns a candidate's position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// An element of this document.
    Node(NodeId),
    /// A sub-document result not yet mapped to its frame element; carries the
    /// owner address reported by the host.
    Frame(String),
    /// A sub-document result mapped to the frame element that embeds it.
    Embedded(NodeId),
}

impl Anchor {
    /// The element used for ordering, once known.
    #[inline]
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(node) | Self::Embedded(node) => Some(*node),
            Self::Frame(_) => None,
        }
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// A `(url, anchor)` pair. Lives for one scan only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Image URL.
    pub url: String,
    /// Position owner.
    pub anchor: Anchor,
}

impl Candidate {
    /// Candidate anchored on an element of this document.
    #[inline]
    #[must_use]
    pub fn node(url: impl Into<String>, node: NodeId) -> Self {
        Self {
            url: url.into(),
            anchor: Anchor::Node(node),
        }
    }

    /// Candidate reported from inside a sub-document.
    #[inline]
    #[must_use]
    pub fn frame(url: impl Into<String>, owner_address: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anchor: Anchor::Frame(owner_address.into()),
        }
    }
}

// ============================================================================
// ImageEntry
// ============================================================================

/// One entry of a published [`OrderedList`].
///
/// Serializes as the bare URL, or as `[url, frameAddress]` when the image
/// lives in a sub-document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "EntryRepr", into = "EntryRepr")]
pub struct ImageEntry {
    /// Image URL. Identity of the entry.
    pub url: String,
    /// Resolved address of the embedding frame, for sub-document images.
    pub frame: Option<String>,
}

impl ImageEntry {
    /// Entry for an image of this document.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            frame: None,
        }
    }

    /// Entry for an image inside the frame at `frame`.
    #[inline]
    #[must_use]
    pub fn framed(url: impl Into<String>, frame: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            frame: Some(frame.into()),
        }
    }

    /// Externally addressable location: the frame address for sub-document
    /// images, the image URL otherwise.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        self.frame.as_deref().unwrap_or(&self.url)
    }

    /// Returns `true` if this entry came from a sub-document.
    #[inline]
    #[must_use]
    pub fn is_framed(&self) -> bool {
        self.frame.is_some()
    }
}

impl From<&str> for ImageEntry {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for ImageEntry {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

impl fmt::Display for ImageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.frame {
            Some(frame) => write!(f, "{} (in {})", self.url, frame),
            None => f.write_str(&self.url),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EntryRepr {
    Plain(String),
    Framed(String, String),
}

impl From<EntryRepr> for ImageEntry {
    fn from(repr: EntryRepr) -> Self {
        match repr {
            EntryRepr::Plain(url) => Self::new(url),
            EntryRepr::Framed(url, frame) => Self::framed(url, frame),
        }
    }
}

impl From<ImageEntry> for EntryRepr {
    fn from(entry: ImageEntry) -> Self {
        match entry.frame {
            Some(frame) => Self::Framed(entry.url, frame),
            None => Self::Plain(entry.url),
        }
    }
}

// ============================================================================
// OrderedList
// ============================================================================

/// Image entries in document order, unique by URL.
pub type OrderedList = Vec<ImageEntry>;

// ============================================================================
// Tests
// ============================================================================
