use serde::Serialize;
use thiserror::Error;

use crate::backend::{BackendError, ErrorCode, ErrorPayload};

/// Protocol-visible status category for a failed request.
///
/// Wire frontends map these onto their own vocabulary (gRPC status codes,
/// HTTP statuses, CQL error frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Internal,
    InvalidRequest,
    Aborted,
    Unauthenticated,
    Unavailable,
    ResourceExhausted,
    DeadlineExceeded,
    FailedPrecondition,
    PermissionDenied,
    AlreadyExists,
    Unknown,
}

/// A fully shaped error response: status category, message, and the
/// structured side-channel payload for the codes that define one.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{message}")]
pub struct StatusError {
    pub status: StatusCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorPayload>,
}

impl StatusError {
    pub fn new(status: StatusCategory, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid paging state: {0}")]
    InvalidPagingState(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An error that already carries its protocol-visible shape; it
    /// passes through the mapping untouched.
    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("{0}")]
    Unknown(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Status category for a backend error code.
///
/// Pure function; the per-code payload travels alongside unchanged.
pub fn status_for_code(code: ErrorCode) -> StatusCategory {
    match code {
        ErrorCode::ServerError | ErrorCode::ProtocolError | ErrorCode::Unprepared => {
            StatusCategory::Internal
        }
        ErrorCode::Invalid | ErrorCode::SyntaxError => StatusCategory::InvalidRequest,
        ErrorCode::TruncateError
        | ErrorCode::CdcWriteFailure
        | ErrorCode::ReadFailure
        | ErrorCode::WriteFailure
        | ErrorCode::CasWriteUnknown => StatusCategory::Aborted,
        ErrorCode::BadCredentials => StatusCategory::Unauthenticated,
        ErrorCode::Unavailable | ErrorCode::IsBootstrapping => StatusCategory::Unavailable,
        ErrorCode::Overloaded => StatusCategory::ResourceExhausted,
        ErrorCode::WriteTimeout | ErrorCode::ReadTimeout => StatusCategory::DeadlineExceeded,
        ErrorCode::FunctionFailure | ErrorCode::ConfigError => StatusCategory::FailedPrecondition,
        ErrorCode::Unauthorized => StatusCategory::PermissionDenied,
        ErrorCode::AlreadyExists => StatusCategory::AlreadyExists,
        ErrorCode::Other(_) => StatusCategory::Unknown,
    }
}

impl GatewayError {
    /// Funnel any failure into its protocol-visible shape, exactly once.
    ///
    /// Already shaped errors pass through untouched; backend errors go
    /// through the code table; everything else keeps its message under a
    /// fixed category.
    pub fn into_status(self) -> StatusError {
        match self {
            GatewayError::Status(status) => status,
            GatewayError::Backend(err) => StatusError {
                status: status_for_code(err.code),
                message: err.message,
                details: err.payload,
            },
            GatewayError::Protocol(message) | GatewayError::InvalidRequest(message) => {
                StatusError::new(StatusCategory::InvalidRequest, message)
            }
            GatewayError::InvalidPagingState(message) => StatusError::new(
                StatusCategory::InvalidRequest,
                format!("Invalid paging state: {}", message),
            ),
            GatewayError::Internal(message) => StatusError::new(StatusCategory::Internal, message),
            GatewayError::Unknown(message) => StatusError::new(StatusCategory::Unknown, message),
        }
    }
}
