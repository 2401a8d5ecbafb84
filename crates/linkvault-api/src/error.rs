use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use linkvault_types::api::ErrorResponse;
use thiserror::Error;

/// Every failure the API surface can report.
///
/// Resource-state failures on the content path (not found, expired, view
/// limit reached) all collapse into [`ApiError::ExpiredOrInvalid`], and the
/// delete/stats surface reports any authorization miss as
/// [`ApiError::Forbidden`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("password too short")]
    WeakPassword,

    #[error("email already registered")]
    EmailExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error("text or file required")]
    MissingPayload,

    #[error("file type not allowed")]
    InvalidFileType,

    #[error("file exceeds the {max_mb} MB limit")]
    FileTooLarge { max_mb: u64 },

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("content expired or invalid")]
    ExpiredOrInvalid,

    #[error("invalid content password")]
    InvalidPassword,

    #[error("forbidden")]
    Forbidden,

    #[error("content is not a file")]
    NotAFile,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidEmail
            | ApiError::WeakPassword
            | ApiError::MissingPayload
            | ApiError::InvalidFileType
            | ApiError::MalformedRequest(_)
            | ApiError::NotAFile => StatusCode::BAD_REQUEST,
            ApiError::EmailExists => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ExpiredOrInvalid | ApiError::InvalidPassword | ApiError::Forbidden => {
                StatusCode::FORBIDDEN
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable reason sent in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidEmail => "INVALID_EMAIL",
            ApiError::WeakPassword => "WEAK_PASSWORD",
            ApiError::EmailExists => "EMAIL_EXISTS",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::MissingPayload => "TEXT_OR_FILE_REQUIRED",
            ApiError::InvalidFileType => "INVALID_FILE_TYPE",
            ApiError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ApiError::MalformedRequest(_) => "MALFORMED_REQUEST",
            ApiError::ExpiredOrInvalid => "EXPIRED_OR_INVALID",
            ApiError::InvalidPassword => "INVALID_PASSWORD",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotAFile => "NOT_A_FILE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            tracing::error!("Internal error: {:#}", e);
        }

        let body = ErrorResponse {
            error: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
