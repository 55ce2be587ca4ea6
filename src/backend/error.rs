//! Backend error codes and their structured payloads.
//!
//! The backend reports failures as a code plus, for some codes, extra
//! structured fields (replica counts, write types, conflicting names).
//! One tagged type carries all of it; the mapping onto protocol-visible
//! status categories lives in [`crate::error`].

use serde::Serialize;
use thiserror::Error;

use super::types::ConsistencyLevel;

/// Failure code reported by the backend store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ServerError,
    ProtocolError,
    BadCredentials,
    Unavailable,
    Overloaded,
    IsBootstrapping,
    TruncateError,
    WriteTimeout,
    ReadTimeout,
    ReadFailure,
    FunctionFailure,
    WriteFailure,
    CdcWriteFailure,
    CasWriteUnknown,
    SyntaxError,
    Unauthorized,
    Invalid,
    ConfigError,
    AlreadyExists,
    Unprepared,
    /// A wire code this core does not recognize.
    Other(i32),
}

/// Code-specific structured fields attached to a [`BackendError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorPayload {
    Unavailable {
        consistency: ConsistencyLevel,
        required: i32,
        alive: i32,
    },
    WriteTimeout {
        consistency: ConsistencyLevel,
        block_for: i32,
        received: i32,
        write_type: String,
    },
    ReadTimeout {
        consistency: ConsistencyLevel,
        block_for: i32,
        received: i32,
        data_present: bool,
    },
    ReadFailure {
        consistency: ConsistencyLevel,
        failures: i32,
        block_for: i32,
        received: i32,
        data_present: bool,
    },
    FunctionFailure {
        keyspace: String,
        function: String,
        arg_types: Vec<String>,
    },
    WriteFailure {
        consistency: ConsistencyLevel,
        failures: i32,
        block_for: i32,
        received: i32,
        write_type: String,
    },
    CasWriteUnknown {
        consistency: ConsistencyLevel,
        block_for: i32,
        received: i32,
    },
    AlreadyExists {
        keyspace: String,
        table: String,
    },
}

/// A failure reported by the backend: a code, a human-readable message,
/// and the code-specific payload when the code defines one.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub code: ErrorCode,
    pub message: String,
    pub payload: Option<ErrorPayload>,
}

impl BackendError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: ErrorPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, message)
    }
}
