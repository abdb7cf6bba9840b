//! Request and response messages exchanged with the host runtime.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// BridgeMessage
// ============================================================================

/// Request payloads understood by the host runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Byte size of a cross-origin URL.
    GetSize {
        /// Absolute URL to measure.
        url: String,
    },

    /// Final URLs of frame addresses after redirects.
    GetRedirect {
        /// Frame addresses, in frame order.
        data: Vec<String>,
    },

    /// Candidate scan inside every embedded frame.
    ExtractFrames {
        /// Smaller of the two minimum dimensions.
        #[serde(rename = "minSize")]
        min_size: u32,
    },
}

// ============================================================================
// BridgeRequest
// ============================================================================

/// A request sent to the host runtime.
///
/// # Format
///
/// ```json
/// { "id": "uuid", "msg": "get_size", "url": "https://cdn.test/a.jpg" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Message with its parameters.
    #[serde(flatten)]
    pub message: BridgeMessage,
}

impl BridgeRequest {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(message: BridgeMessage) -> Self {
        Self {
            id: RequestId::generate(),
            message,
        }
    }
}

// ============================================================================
// BridgeResponse
// ============================================================================

/// A response from the host runtime.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": "uuid", "type": "success", "result": 8000 }
/// ```
///
/// Error:
/// ```json
/// { "id": "uuid", "type": "error", "message": "frame gone" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeResponse {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,

    /// Result data (if success).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error message (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BridgeResponse {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            response_type: ResponseType::Success,
            result: Some(result),
            message: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            response_type: ResponseType::Error,
            result: None,
            message: Some(message.into()),
        }
    }

    /// Extracts the result value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bridge`] if the host answered with an error.
    pub fn into_result(self) -> Result<Value> {
        match self.response_type {
            ResponseType::Success => Ok(self.result.unwrap_or(Value::Null)),
            ResponseType::Error => Err(Error::bridge(
                self.message.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_size_serialization() {
        let request = BridgeRequest::new(BridgeMessage::GetSize {
            url: "https://cdn.test/a.jpg".into(),
        });
        let json: Value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(json["msg"], "get_size");
        assert_eq!(json["url"], "https://cdn.test/a.jpg");
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_extract_frames_uses_camel_case_min_size() {
        let request = BridgeRequest::new(BridgeMessage::ExtractFrames { min_size: 150 });
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains("\"msg\":\"extract_frames\""));
        assert!(json.contains("\"minSize\":150"));
    }

    #[test]
    fn test_request_parses_back() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "msg": "get_redirect",
            "data": ["https://a.test/embed"]
        }"#;
        let request: BridgeRequest = serde_json::from_str(json).expect("parse");
        assert_eq!(
            request.message,
            BridgeMessage::GetRedirect {
                data: vec!["https://a.test/embed".into()]
            }
        );
    }

    #[test]
    fn test_success_response() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "success",
            "result": 8000
        }"#;
        let response: BridgeResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(response.into_result().unwrap(), Value::from(8000));
    }

    #[test]
    fn test_error_response() {
        let json = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "error",
            "message": "frame gone"
        }"#;
        let response: BridgeResponse = serde_json::from_str(json).expect("parse");
        let err = response.into_result().unwrap_err();
        assert!(err.is_bridge_error());
        assert_eq!(err.to_string(), "Bridge error: frame gone");
    }
}
