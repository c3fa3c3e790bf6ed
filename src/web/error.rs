//! API error handling for the Lockbox HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::content::UploadError;
use crate::LockboxError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Protected content without a valid session (401).
    PasswordRequired,
    /// Submitted password did not match (401).
    WrongPassword,
    /// Not found (404).
    NotFound,
    /// Rate limit hit (429).
    TooManyRequests,
    /// Store unreachable (503).
    ServiceUnavailable,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::PasswordRequired => StatusCode::UNAUTHORIZED,
            ErrorCode::WrongPassword => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Content id a password prompt should submit to (401 only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    target: Option<String>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            target: None,
        }
    }

    /// Error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// The content is protected and no valid session was presented.
    pub fn password_required(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::new(ErrorCode::PasswordRequired, "A password is required")
        }
    }

    /// The submitted password was wrong.
    pub fn wrong_password(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::new(ErrorCode::WrongPassword, "Wrong password")
        }
    }

    /// Create a not found error.
    pub fn not_found() -> Self {
        Self::new(ErrorCode::NotFound, "Not found")
    }

    /// Create a rate limit error.
    pub fn too_many_requests() -> Self {
        Self::new(
            ErrorCode::TooManyRequests,
            "Too many requests. Please try again later.",
        )
    }

    /// Create a service unavailable error.
    pub fn service_unavailable() -> Self {
        Self::new(
            ErrorCode::ServiceUnavailable,
            "Service temporarily unavailable",
        )
    }

    /// Create an internal server error.
    pub fn internal() -> Self {
        Self::new(ErrorCode::InternalError, "An internal error occurred")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                target: self.target,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<LockboxError> for ApiError {
    fn from(err: LockboxError) -> Self {
        match &err {
            LockboxError::NotFound(_) => ApiError::not_found(),
            LockboxError::Validation(msg) => ApiError::bad_request(msg.clone()),
            LockboxError::StoreUnavailable(_) => {
                tracing::warn!("Store unavailable: {}", err);
                ApiError::service_unavailable()
            }
            _ => {
                tracing::error!("Internal error: {}", err);
                ApiError::internal()
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        if err.is_client_error() {
            return ApiError::bad_request(err.to_string());
        }
        match err {
            UploadError::Store(inner) => inner.into(),
            other => {
                tracing::error!("Upload failed: {}", other);
                ApiError::internal()
            }
        }
    }
}
