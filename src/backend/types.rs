//! Data types exchanged with the backend store.
//!
//! These are the protocol-agnostic shapes every wire frontend maps onto:
//! execution parameters, bound statements, batches, and the tagged result
//! returned by the backend.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use uuid::Uuid;

/// Durability/visibility requirement for a read or write, passed through
/// to the backend as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
    LocalOne,
}

impl ConsistencyLevel {
    /// Numeric code used by CQL-compatible wire protocols.
    pub fn code(&self) -> u16 {
        match self {
            ConsistencyLevel::Any => 0x0000,
            ConsistencyLevel::One => 0x0001,
            ConsistencyLevel::Two => 0x0002,
            ConsistencyLevel::Three => 0x0003,
            ConsistencyLevel::Quorum => 0x0004,
            ConsistencyLevel::All => 0x0005,
            ConsistencyLevel::LocalQuorum => 0x0006,
            ConsistencyLevel::EachQuorum => 0x0007,
            ConsistencyLevel::Serial => 0x0008,
            ConsistencyLevel::LocalSerial => 0x0009,
            ConsistencyLevel::LocalOne => 0x000A,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(ConsistencyLevel::Any),
            0x0001 => Some(ConsistencyLevel::One),
            0x0002 => Some(ConsistencyLevel::Two),
            0x0003 => Some(ConsistencyLevel::Three),
            0x0004 => Some(ConsistencyLevel::Quorum),
            0x0005 => Some(ConsistencyLevel::All),
            0x0006 => Some(ConsistencyLevel::LocalQuorum),
            0x0007 => Some(ConsistencyLevel::EachQuorum),
            0x0008 => Some(ConsistencyLevel::Serial),
            0x0009 => Some(ConsistencyLevel::LocalSerial),
            0x000A => Some(ConsistencyLevel::LocalOne),
            _ => None,
        }
    }
}

/// Per-request execution parameters.
///
/// Built fresh per request from the fields the client actually sent;
/// `None` leaves the backend default untouched.
#[derive(Debug, Clone, Default)]
pub struct ExecutionParameters {
    pub consistency: Option<ConsistencyLevel>,
    pub serial_consistency: Option<ConsistencyLevel>,
    pub keyspace: Option<String>,
    pub page_size: Option<i32>,
    pub paging_state: Option<Bytes>,
    pub timestamp: Option<i64>,
    pub now_in_seconds: Option<i32>,
    pub tracing: bool,
}

/// Identity of the client behind a connection, as seen by the transport.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub peer: SocketAddr,
    /// Public address when the connection arrived through a proxy.
    pub public_address: Option<SocketAddr>,
}

impl ClientInfo {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer,
            public_address: None,
        }
    }
}

/// A user the backend has accepted credentials for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub name: String,
}

impl AuthenticatedUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// DER-encoded peer certificate presented during the TLS handshake.
#[derive(Debug, Clone)]
pub struct PeerCertificate(pub Vec<u8>);

/// Outcome of the transport's attempt to collect the peer certificate
/// chain. An unverified chain is tolerated downstream, not fatal.
#[derive(Debug, Clone)]
pub enum PeerCertificates {
    /// Plaintext connection, no TLS in play.
    None,
    Verified(Vec<PeerCertificate>),
    /// TLS present but the chain could not be verified.
    Unverified(String),
}

/// Backend-issued handle for a parsed/planned statement, reusable across
/// executions with different bound values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub id: Uuid,
    pub statement: String,
}

/// A prepared statement together with the values to execute it with.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub prepared_id: Uuid,
    pub values: Vec<Value>,
    pub keyspace: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    Logged,
    Unlogged,
    Counter,
}

/// Ordered set of bound statements executed as one backend batch.
#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_type: BatchType,
    pub statements: Vec<BoundStatement>,
}

/// Row data returned by the backend, plus the cursor to continue from
/// when the result is partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paging_state: Option<Bytes>,
}

/// Schema modification reported by the backend after a DDL statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaChange {
    pub change_type: String,
    pub target: String,
    pub keyspace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Tagged outcome of a backend execution.
#[derive(Debug, Clone)]
pub enum ResultKind {
    Void,
    Rows(Rows),
    SchemaChange(SchemaChange),
    SetKeyspace(String),
}

/// Everything the backend hands back for one execute/batch call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub kind: ResultKind,
    pub warnings: Vec<String>,
    pub tracing_id: Option<Uuid>,
}

impl ExecutionResult {
    pub fn void() -> Self {
        Self {
            kind: ResultKind::Void,
            warnings: Vec::new(),
            tracing_id: None,
        }
    }

    pub fn rows(rows: Rows) -> Self {
        Self {
            kind: ResultKind::Rows(rows),
            warnings: Vec::new(),
            tracing_id: None,
        }
    }

    pub fn with_tracing_id(mut self, tracing_id: Uuid) -> Self {
        self.tracing_id = Some(tracing_id);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}
