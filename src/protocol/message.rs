//! Message vocabulary shared by the handshake state machine.
//!
//! The concrete frame layouts belong to the wire frontends; the state
//! machine only needs the message kinds and the protocol version.

use std::fmt;

/// Kind of a protocol message, request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    // Requests
    Startup,
    Options,
    Query,
    Prepare,
    Execute,
    Batch,
    Register,
    AuthResponse,
    /// Pre-SASL credentials message, protocol V1 only.
    Credentials,
    // Responses
    Error,
    Ready,
    Authenticate,
    Supported,
    Result,
    Event,
    AuthChallenge,
    AuthSuccess,
}

impl MessageKind {
    /// All request kinds, useful for exhaustive validation tests.
    pub const REQUESTS: [MessageKind; 9] = [
        MessageKind::Startup,
        MessageKind::Options,
        MessageKind::Query,
        MessageKind::Prepare,
        MessageKind::Execute,
        MessageKind::Batch,
        MessageKind::Register,
        MessageKind::AuthResponse,
        MessageKind::Credentials,
    ];
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Startup => "STARTUP",
            MessageKind::Options => "OPTIONS",
            MessageKind::Query => "QUERY",
            MessageKind::Prepare => "PREPARE",
            MessageKind::Execute => "EXECUTE",
            MessageKind::Batch => "BATCH",
            MessageKind::Register => "REGISTER",
            MessageKind::AuthResponse => "AUTH_RESPONSE",
            MessageKind::Credentials => "CREDENTIALS",
            MessageKind::Error => "ERROR",
            MessageKind::Ready => "READY",
            MessageKind::Authenticate => "AUTHENTICATE",
            MessageKind::Supported => "SUPPORTED",
            MessageKind::Result => "RESULT",
            MessageKind::Event => "EVENT",
            MessageKind::AuthChallenge => "AUTH_CHALLENGE",
            MessageKind::AuthSuccess => "AUTH_SUCCESS",
        };
        f.write_str(name)
    }
}

/// Negotiated protocol version for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V1,
    V2,
    V3,
    V4,
    V5,
}

impl ProtocolVersion {
    /// V1 predates SASL and authenticates with a credentials message.
    pub fn uses_legacy_credentials(&self) -> bool {
        matches!(self, ProtocolVersion::V1)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProtocolVersion::V1 => "1",
            ProtocolVersion::V2 => "2",
            ProtocolVersion::V3 => "3",
            ProtocolVersion::V4 => "4",
            ProtocolVersion::V5 => "5",
        };
        f.write_str(name)
    }
}
