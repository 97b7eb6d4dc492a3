use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

use super::{ApiErrorObject, IsRetryable};
use crate::utils::logging::body_preview;

pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "Pin authentication service is temporarily unavailable.";

#[derive(Debug, ThisError)]
pub enum UploadError {
    #[error("Request rejected: {message}")]
    RequestRejected {
        status: StatusCode,
        code: &'static str,
        message: String,
        debug_message: Option<String>,
    },

    #[error("Front image is required")]
    MissingFrontImage,

    #[error("Invalid {field} image: {reason}")]
    InvalidImage { field: &'static str, reason: String },

    /// Upstream answered with a non-2xx status.
    #[error("Upstream error: status={status}, body={body:.200}")]
    UpstreamStatus {
        status: StatusCode,
        /// Raw upstream body is preserved for internal diagnostics/logging only.
        body: String,
    },

    /// Upstream answered 2xx with something that is not JSON.
    #[error("Upstream payload error: {0:.200}")]
    UpstreamPayload(String),

    /// Transport-level failure (DNS, connect, timeouts, etc).
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Whether the failure came from talking to the master server (as opposed to a bad request).
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            UploadError::UpstreamStatus { .. }
                | UploadError::UpstreamPayload(_)
                | UploadError::Reqwest(_)
        )
    }

    /// Body exceeded `basic.max_upload_bytes`.
    pub fn payload_too_large(debug_message: String) -> Self {
        UploadError::RequestRejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: "PAYLOAD_TOO_LARGE",
            message: "upload is too large".to_string(),
            debug_message: Some(debug_message),
        }
    }
}

impl From<JsonRejection> for UploadError {
    fn from(rejection: JsonRejection) -> Self {
        let debug_message = rejection.to_string();
        match rejection {
            JsonRejection::BytesRejection(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                UploadError::payload_too_large(debug_message)
            }
            JsonRejection::BytesRejection(e) => {
                UploadError::Internal(format!("Failed to read request body: {e}"))
            }
            JsonRejection::JsonSyntaxError(_) => UploadError::RequestRejected {
                status: StatusCode::BAD_REQUEST,
                code: "INVALID_JSON",
                message: "invalid JSON".to_string(),
                debug_message: Some(debug_message),
            },
            _ => UploadError::RequestRejected {
                status: StatusCode::BAD_REQUEST,
                code: "INVALID_REQUEST",
                message: "invalid request".to_string(),
                debug_message: Some(debug_message),
            },
        }
    }
}

impl From<MultipartRejection> for UploadError {
    fn from(rejection: MultipartRejection) -> Self {
        UploadError::RequestRejected {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_MULTIPART",
            message: "invalid multipart form".to_string(),
            debug_message: Some(rejection.to_string()),
        }
    }
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return UploadError::payload_too_large(err.body_text());
        }
        UploadError::RequestRejected {
            status: err.status(),
            code: "INVALID_MULTIPART",
            message: "failed to read multipart form".to_string(),
            debug_message: Some(err.body_text()),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, error_body) = match self {
            UploadError::RequestRejected {
                status,
                code,
                message,
                debug_message,
            } => {
                if let Some(debug_message) = debug_message {
                    tracing::warn!(
                        status = %status,
                        code,
                        message = %message,
                        debug_message = %debug_message,
                        "Upload request rejected"
                    );
                } else {
                    tracing::warn!(
                        status = %status,
                        code,
                        message = %message,
                        "Upload request rejected"
                    );
                }
                (status, error_object(code, message))
            }

            UploadError::MissingFrontImage => (
                StatusCode::BAD_REQUEST,
                error_object("MISSING_FRONT_IMAGE", "Front image is required."),
            ),

            UploadError::InvalidImage { field, reason } => {
                tracing::warn!(field, reason = %reason, "Upload image rejected");
                (
                    StatusCode::BAD_REQUEST,
                    error_object("INVALID_IMAGE", format!("Invalid {field} image.")),
                )
            }

            UploadError::UpstreamStatus { status, body } => {
                tracing::error!(
                    upstream_status = %status,
                    body = %body_preview(&body),
                    "Master server returned an error"
                );
                service_unavailable()
            }

            UploadError::UpstreamPayload(body) => {
                tracing::error!(
                    body = %body_preview(&body),
                    "Master server returned a non-JSON body"
                );
                service_unavailable()
            }

            UploadError::Reqwest(e) => {
                tracing::error!(
                    error = %e,
                    timeout = e.is_timeout(),
                    connect = e.is_connect(),
                    "Master server request failed"
                );
                service_unavailable()
            }

            UploadError::Internal(message) => {
                tracing::error!(message = %message, "Upload internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_object("INTERNAL_ERROR", "An internal server error occurred."),
                )
            }
        };

        (
            status,
            Json(UploadErrorBody {
                success: false,
                error: error_body,
            }),
        )
            .into_response()
    }
}

impl IsRetryable for UploadError {
    fn is_retryable(&self) -> bool {
        match self {
            UploadError::Reqwest(_) => true,
            UploadError::UpstreamStatus { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

/// Error payload for upload routes. Keeps the `success` flag the capture UI checks first.
#[derive(Debug, Serialize)]
pub struct UploadErrorBody {
    pub success: bool,
    pub error: ApiErrorObject,
}

fn error_object(code: &str, message: impl Into<String>) -> ApiErrorObject {
    ApiErrorObject {
        code: code.to_string(),
        message: message.into(),
        details: None,
    }
}

fn service_unavailable() -> (StatusCode, ApiErrorObject) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_object("SERVICE_UNAVAILABLE", SERVICE_UNAVAILABLE_MESSAGE),
    )
}
