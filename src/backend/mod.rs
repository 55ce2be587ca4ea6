//! Backend collaborator interfaces.
//!
//! The gateway core never talks to storage directly; everything goes
//! through these traits. A real deployment implements them against the
//! persistence engine, tests implement them in memory.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

pub mod error;
pub mod types;

pub use error::{BackendError, ErrorCode, ErrorPayload};
pub use types::{
    AuthenticatedUser, Batch, BatchType, BoundStatement, ClientInfo, ConsistencyLevel,
    ExecutionParameters, ExecutionResult, PeerCertificate, PeerCertificates, PreparedStatement,
    ResultKind, Rows, SchemaChange,
};

/// Entry point into the persistence layer.
pub trait Backend: Send + Sync {
    /// Open a logical backend connection on behalf of a client.
    fn new_connection(&self, client: ClientInfo) -> Arc<dyn BackendConnection>;

    /// The authenticator used to negotiate SASL exchanges for this backend.
    fn authenticator(&self) -> Arc<dyn Authenticator>;
}

/// One logical connection to the backend store.
///
/// All query-path operations are asynchronous; implementations must not
/// block the caller.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Associate an authenticated user with this connection.
    fn login(&self, user: AuthenticatedUser) -> Result<(), BackendError>;

    fn logged_user(&self) -> Option<AuthenticatedUser>;

    async fn prepare(
        &self,
        statement: &str,
        parameters: &ExecutionParameters,
    ) -> Result<Arc<PreparedStatement>, BackendError>;

    async fn execute(
        &self,
        statement: BoundStatement,
        parameters: &ExecutionParameters,
        started_at: Instant,
    ) -> Result<ExecutionResult, BackendError>;

    async fn batch(
        &self,
        batch: Batch,
        parameters: &ExecutionParameters,
        started_at: Instant,
    ) -> Result<ExecutionResult, BackendError>;
}

/// Creates SASL negotiators bound to a peer identity.
pub trait Authenticator: Send + Sync {
    fn new_sasl_negotiator(
        &self,
        peer: IpAddr,
        certificates: Option<Vec<PeerCertificate>>,
    ) -> Box<dyn SaslNegotiator>;
}

/// Server side of one SASL exchange.
pub trait SaslNegotiator: Send {
    /// Evaluate the client's response; returns the next challenge, or
    /// `None` when the exchange needs no further challenge.
    fn evaluate_response(&mut self, client_response: &[u8]) -> Result<Option<Vec<u8>>, BackendError>;

    fn is_complete(&self) -> bool;

    /// The user this exchange authenticated. Only valid once
    /// [`SaslNegotiator::is_complete`] returns true.
    fn authenticated_user(&self) -> Result<AuthenticatedUser, BackendError>;
}
