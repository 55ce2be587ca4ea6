pub mod backend;
pub mod config;
pub mod error;
pub mod execution;
pub mod paging;
pub mod protocol;

pub use backend::{
    Authenticator, Backend, BackendConnection, BackendError, ErrorCode, ErrorPayload,
    SaslNegotiator,
};
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult, StatusCategory, StatusError};
pub use execution::{
    BatchQuery, BatchRequest, PrepareKey, PreparedStatementCache, QueryExecutionCoordinator,
    QueryRequest, QueryResponse, TraceEvent,
};
pub use protocol::{ConnectionStage, ConnectionState, MessageKind, ProtocolVersion};
