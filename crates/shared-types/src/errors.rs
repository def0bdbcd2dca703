//! Common error types used across all Framemark crates
//! Provides consistent error handling and reporting to the host page

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base error type for all Framemark operations
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum FramemarkError {
    // Document errors
    #[error("Invalid annotation document: {message}")]
    InvalidDocument { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
        field: Option<String>,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Annotator is read-only: {operation} is disabled")]
    ReadOnly { operation: String },

    // I/O errors
    #[error("Network request failed: {message}")]
    Network { message: String, url: Option<String> },

    #[error("Snapshot capture failed: {message}")]
    Capture { message: String },

    // Host interop errors
    #[error("JavaScript interop error: {message}")]
    JsInterop { message: String },

    #[error("Element not found: {id}")]
    ElementNotFound { id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FramemarkError {
    pub fn read_only(operation: &str) -> Self {
        FramemarkError::ReadOnly {
            operation: operation.to_string(),
        }
    }

    pub fn network(message: impl Into<String>, url: Option<&str>) -> Self {
        FramemarkError::Network {
            message: message.into(),
            url: url.map(str::to_string),
        }
    }
}

/// Result type alias for Framemark operations
pub type FramemarkResult<T> = Result<T, FramemarkError>;

/// Error response structure for JavaScript interop
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: FramemarkError,
    pub timestamp: u64,
    pub context: Option<ErrorContext>,
}

/// Additional context for error reporting
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
}

impl ErrorResponse {
    pub fn new(error: FramemarkError) -> Self {
        Self {
            success: false,
            error,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            context: None,
        }
    }

    pub fn with_context(mut self, component: &str, operation: &str) -> Self {
        self.context = Some(ErrorContext {
            component: component.to_string(),
            operation: operation.to_string(),
        });
        self
    }

    /// Convert to JSON string for JavaScript
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"type":"Internal","details":{"message":"Failed to serialize error"}}}"#.to_string()
        })
    }
}

impl From<serde_json::Error> for FramemarkError {
    fn from(err: serde_json::Error) -> Self {
        FramemarkError::InvalidDocument {
            message: format!("{err} (line {})", err.line()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = FramemarkError::network("HTTP 502", Some("https://example.com/save"));

        let response = ErrorResponse::new(error).with_context("FetchSink", "save_document");

        let json = response.to_json();
        assert!(json.contains("\"type\":\"Network\""));
        assert!(json.contains("HTTP 502"));
        assert!(json.contains("FetchSink"));
    }

    #[test]
    fn test_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: FramemarkError = parse_err.into();

        match err {
            FramemarkError::InvalidDocument { message } => {
                assert!(message.contains("line 1"));
            }
            _ => panic!("Wrong error variant"),
        }
    }
}
