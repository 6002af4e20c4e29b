//! Error types for the Web API tool server

use std::io;

use serde_json::Value;
use thiserror::Error;

/// Result type alias for the Web API tool server
pub type Result<T> = std::result::Result<T, Error>;

/// Web API tool server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or incomplete API, method or parameter definition
    #[error("Validation error: {0}")]
    Validation(String),

    /// Outbound HTTP call failed
    #[error(transparent)]
    ApiCall(#[from] ApiCallError),

    /// File or directory could not be loaded
    #[error("Load error: {0}")]
    Load(String),

    /// Named API, tool or file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Incoming message is valid JSON but not a JSON-RPC message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Incoming line is not JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::Validation(_) | Self::NotFound(_) => rpc_codes::INVALID_PARAMS,
            Self::ApiCall(_) => rpc_codes::SERVER_ERROR_START,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// Failure of an outbound API call.
///
/// `status` is the upstream HTTP status, `0` when no response arrived at all
/// and `408` when the declared timeout elapsed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("API call failed (status {status}): {message}")]
pub struct ApiCallError {
    /// HTTP status, `0` for network-level failures, `408` for timeouts
    pub status: u16,
    /// Human-readable description
    pub message: String,
    /// Upstream response body, when one was received
    pub body: Option<Value>,
}

impl ApiCallError {
    /// Status used when the request never produced a response
    pub const NETWORK: u16 = 0;
    /// Status used when the declared timeout elapsed
    pub const TIMEOUT: u16 = 408;

    /// Create an error without an upstream body
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// Attach the upstream response body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Whether the failure happened before any response was received
    #[must_use]
    pub fn is_network(&self) -> bool {
        self.status == Self::NETWORK
    }

    /// Whether the failure was the declared timeout elapsing
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.status == Self::TIMEOUT
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i32 = -32000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_call_error_display_includes_status() {
        let err = ApiCallError::new(404, "HTTP 404 Not Found");
        assert_eq!(
            err.to_string(),
            "API call failed (status 404): HTTP 404 Not Found"
        );
    }

    #[test]
    fn api_call_error_classification() {
        assert!(ApiCallError::new(0, "refused").is_network());
        assert!(ApiCallError::new(408, "timeout").is_timeout());
        assert!(!ApiCallError::new(500, "boom").is_network());
    }

    #[test]
    fn api_call_error_converts_into_error() {
        let err: Error = ApiCallError::new(502, "bad gateway")
            .with_body(serde_json::json!({"detail": "upstream"}))
            .into();
        assert_eq!(err.to_rpc_code(), rpc_codes::SERVER_ERROR_START);
        match err {
            Error::ApiCall(inner) => assert_eq!(inner.body.unwrap()["detail"], "upstream"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn decode_failures_map_to_their_rpc_codes() {
        let err: Error = serde_json::from_str::<Value>("{").unwrap_err().into();
        assert_eq!(err.to_rpc_code(), rpc_codes::PARSE_ERROR);
        assert_eq!(
            Error::Protocol("missing method".into()).to_rpc_code(),
            rpc_codes::INVALID_REQUEST
        );
    }

    #[test]
    fn validation_maps_to_invalid_params() {
        let err = Error::Validation("name is required".to_string());
        assert_eq!(err.to_rpc_code(), rpc_codes::INVALID_PARAMS);
        assert_eq!(err.to_string(), "Validation error: name is required");
    }
}
