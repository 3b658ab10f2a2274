use crate::engine::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use faceswap_core::ParamError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Face swap processing failed: {0}")]
    NoFaceFound(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("processing exceeded the {}s timeout", .0.as_secs())]
    Timeout(Duration),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SwapError {
    pub fn status(&self) -> StatusCode {
        match self {
            SwapError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            // Kept at 500 for client compatibility.
            SwapError::NoFaceFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SwapError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SwapError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SwapError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SwapError::InvalidArgument(_) => "invalid_argument",
            SwapError::NoFaceFound(_) => "no_face_found",
            SwapError::ServiceUnavailable(_) => "service_unavailable",
            SwapError::Timeout(_) => "timeout",
            SwapError::Internal(_) => "internal_error",
        }
    }
}

impl From<ParamError> for SwapError {
    fn from(e: ParamError) -> Self {
        SwapError::InvalidArgument(e.to_string())
    }
}

impl From<EngineError> for SwapError {
    fn from(e: EngineError) -> Self {
        SwapError::Internal(e.to_string())
    }
}

impl IntoResponse for SwapError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "detail": self.to_string(),
            "kind": self.kind(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SwapError::InvalidArgument("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(SwapError::NoFaceFound("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            SwapError::ServiceUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SwapError::Timeout(Duration::from_secs(3)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(SwapError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_param_error_is_invalid_argument() {
        let err: SwapError = ParamError::UnknownFaceModel("ultra".into()).into();
        assert_eq!(err.kind(), "invalid_argument");
        assert!(err.to_string().contains("ultra"));
    }

    #[test]
    fn test_engine_error_is_internal() {
        let err: SwapError = EngineError::ChannelClosed.into();
        assert_eq!(err.kind(), "internal_error");
        assert_eq!(err.to_string(), "Internal server error: analysis thread exited");
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            SwapError::Timeout(Duration::from_secs(120)).to_string(),
            "processing exceeded the 120s timeout"
        );
    }
}
