//! Error types shared by every operation.
//!
//! Validation problems are reported back to the caller as structured JSON,
//! codec and document-tool failures are logged at the handler boundary and
//! turned into 500 responses. Nothing is retried.

use hyper::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or missing form field.
    #[error("{0}")]
    Validation(String),

    /// No file was uploaded under the expected field.
    #[error("{0}")]
    MissingInput(String),

    #[error("Payload too large: uploads are limited to {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("Failed to encode {format}: {message}")]
    Encode { format: &'static str, message: String },

    /// PDF, DOCX or rasteriser failure.
    #[error("{tool} failed: {message}")]
    UpstreamTool { tool: &'static str, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn missing_input(message: impl Into<String>) -> Self {
        Self::MissingInput(message.into())
    }

    pub fn decode(what: &'static str, message: impl ToString) -> Self {
        Self::Decode {
            what,
            message: message.to_string(),
        }
    }

    pub fn encode(format: &'static str, message: impl ToString) -> Self {
        Self::Encode {
            format,
            message: message.to_string(),
        }
    }

    pub fn upstream(tool: &'static str, message: impl ToString) -> Self {
        Self::UpstreamTool {
            tool,
            message: message.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MissingInput(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Decode { .. }
            | Self::Encode { .. }
            | Self::UpstreamTool { .. }
            | Self::Io(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors caused by the caller rather than by a codec or tool.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// `{"status":"ERR","msg":...,"data":[]}`
    pub fn to_json(&self) -> String {
        error_body(&self.to_string())
    }
}

pub fn error_body(message: &str) -> String {
    json!({ "status": "ERR", "msg": message, "data": [] }).to_string()
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(e) => Self::decode("image", e),
            image::ImageError::Unsupported(e) => Self::decode("image", e),
            image::ImageError::IoError(e) => Self::Io(e),
            other => Self::encode("image", other),
        }
    }
}

impl From<lopdf::Error> for AppError {
    fn from(err: lopdf::Error) -> Self {
        Self::upstream("pdf", err)
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::upstream("zip", err)
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(err: quick_xml::Error) -> Self {
        Self::upstream("docx", err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("worker task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = AppError::validation("\"compressionType\" is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
    }

    #[test]
    fn codec_failures_are_server_errors() {
        let err = AppError::encode("jpeg", "boom");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to encode jpeg: boom");
    }

    #[test]
    fn json_body_uses_err_shape() {
        let body: serde_json::Value =
            serde_json::from_str(&AppError::missing_input("No image file uploaded").to_json())
                .unwrap();
        assert_eq!(body["status"], "ERR");
        assert_eq!(body["msg"], "No image file uploaded");
        assert_eq!(body["data"], serde_json::json!([]));
    }

    #[test]
    fn payload_limit_is_413() {
        let err = AppError::PayloadTooLarge { limit: 5 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
