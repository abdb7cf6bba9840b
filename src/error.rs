//! Error types for image discovery.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use image_discovery::{DiscoveryOptions, Result};
//!
//! fn load(json: &str) -> Result<DiscoveryOptions> {
//!     let options = DiscoveryOptions::from_json(json)?;
//!     Ok(options)
//! }
//! ```
//!
//! # Recovery
//!
//! The discovery pipeline itself never surfaces these errors to its caller.
//! Probes fold failures into a zero size, and bridge failures degrade to
//! "no sub-document candidates". The variants below are what the individual
//! building blocks report before that folding happens.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Probing | [`Error::Probe`], [`Error::Decode`], [`Error::CrossOriginDenied`] |
//! | Document | [`Error::NodeNotFound`] |
//! | Bridge | [`Error::Bridge`], [`Error::BridgeClosed`], [`Error::Protocol`] |
//! | Timing | [`Error::Timeout`], [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Http`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{NodeId, RequestId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session or resolver configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// A URL could not be parsed or resolved against the document base.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },

    // ========================================================================
    // Probe Errors
    // ========================================================================
    /// A size probe failed.
    ///
    /// Returned by fetchers when a request errors or answers with a
    /// non-image resource.
    #[error("Probe failed for {url}: {message}")]
    Probe {
        /// URL that was probed.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Image bytes could not be decoded.
    #[error("Decode failed for {url}: {message}")]
    Decode {
        /// URL whose bytes were decoded.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// A same-origin probe was attempted against a foreign origin.
    #[error("Cross-origin probe refused: {url}")]
    CrossOriginDenied {
        /// The foreign URL.
        url: String,
    },

    // ========================================================================
    // Document Errors
    // ========================================================================
    /// Node handle does not belong to the document.
    #[error("Node not found: {node}")]
    NodeNotFound {
        /// The missing node.
        node: NodeId,
    },

    // ========================================================================
    // Bridge Errors
    // ========================================================================
    /// The host bridge reported an error for a request.
    #[error("Bridge error: {message}")]
    Bridge {
        /// Message reported by the host.
        message: String,
    },

    /// The host bridge connection is gone.
    #[error("Bridge closed")]
    BridgeClosed,

    /// Protocol violation or unexpected response shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Timing Errors
    // ========================================================================
    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Bridge request timeout.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a probe failure.
    #[inline]
    pub fn probe(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Probe {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a decode failure.
    #[inline]
    pub fn decode(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a cross-origin refusal.
    #[inline]
    pub fn cross_origin_denied(url: impl Into<String>) -> Self {
        Self::CrossOriginDenied { url: url.into() }
    }

    /// Creates a node not found error.
    #[inline]
    pub fn node_not_found(node: NodeId) -> Self {
        Self::NodeNotFound { node }
    }

    /// Creates a bridge error.
    #[inline]
    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RequestTimeout { .. })
    }

    /// Returns `true` if this error came from a size or decode probe.
    #[inline]
    #[must_use]
    pub fn is_probe_failure(&self) -> bool {
        matches!(
            self,
            Self::Probe { .. } | Self::Decode { .. } | Self::CrossOriginDenied { .. } | Self::Http(_)
        )
    }

    /// Returns `true` if a same-origin probe ended up on a foreign origin.
    #[inline]
    #[must_use]
    pub fn is_cross_origin(&self) -> bool {
        matches!(self, Self::CrossOriginDenied { .. })
    }

    /// Returns `true` if this is a host bridge error.
    #[inline]
    #[must_use]
    pub fn is_bridge_error(&self) -> bool {
        matches!(
            self,
            Self::Bridge { .. }
                | Self::BridgeClosed
                | Self::Protocol { .. }
                | Self::RequestTimeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RequestTimeout { .. } | Self::Probe { .. } | Self::Http(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::probe("https://a.test/x.jpg", "status 404");
        assert_eq!(
            err.to_string(),
            "Probe failed for https://a.test/x.jpg: status 404"
        );
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("poll interval must be non-zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: poll interval must be non-zero"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::timeout("decode", 1000);
        let other_err = Error::bridge("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_probe_failure() {
        assert!(Error::probe("u", "m").is_probe_failure());
        assert!(Error::decode("u", "bad header").is_probe_failure());
        assert!(Error::cross_origin_denied("u").is_probe_failure());
        assert!(!Error::BridgeClosed.is_probe_failure());
    }

    #[test]
    fn test_is_bridge_error() {
        assert!(Error::bridge("test").is_bridge_error());
        assert!(Error::BridgeClosed.is_bridge_error());
        assert!(Error::protocol("bad shape").is_bridge_error());
        assert!(!Error::config("test").is_bridge_error());
    }

    #[test]
    fn test_is_recoverable() {
        let timeout_err = Error::timeout("settle", 3000);
        let config_err = Error::config("test");

        assert!(timeout_err.is_recoverable());
        assert!(!config_err.is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_node_not_found_display() {
        let err = Error::node_not_found(NodeId::new(7));
        assert_eq!(err.to_string(), "Node not found: node#7");
    }
}
