//! Common test utilities for gateway tests
//!
//! Provides an in-memory backend with scriptable prepare/execute/batch
//! behavior, plus a PLAIN-style SASL authenticator.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use portico::backend::{
    AuthenticatedUser, Authenticator, Backend, BackendConnection, BackendError, Batch,
    BoundStatement, ClientInfo, ErrorCode, ExecutionParameters, ExecutionResult, PeerCertificate,
    PreparedStatement, SaslNegotiator,
};

/// Scriptable in-memory stand-in for the persistence layer.
#[derive(Default)]
pub struct MockConnection {
    user: Mutex<Option<AuthenticatedUser>>,
    /// Total number of backend prepares issued (cache misses only).
    pub prepare_calls: AtomicUsize,
    prepare_delays: Mutex<HashMap<String, Duration>>,
    prepare_failures: Mutex<HashMap<String, BackendError>>,
    /// Statements prepared, in backend arrival order.
    pub prepared: Mutex<Vec<String>>,
    execute_results: Mutex<VecDeque<Result<ExecutionResult, BackendError>>>,
    batch_results: Mutex<VecDeque<Result<ExecutionResult, BackendError>>>,
    /// Statements executed, in order.
    pub executed: Mutex<Vec<BoundStatement>>,
    /// Execution parameters seen by execute, in order.
    pub execute_parameters: Mutex<Vec<ExecutionParameters>>,
    /// Batches executed, in order.
    pub batches: Mutex<Vec<Batch>>,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn logged_in(user: &str) -> Arc<Self> {
        let connection = Self::new();
        connection
            .login(AuthenticatedUser::new(user))
            .expect("mock login");
        connection
    }

    /// Delay the backend prepare for one statement.
    pub fn delay_prepare(&self, statement: &str, delay: Duration) {
        self.prepare_delays
            .lock()
            .insert(statement.to_string(), delay);
    }

    /// Fail the backend prepare for one statement.
    pub fn fail_prepare(&self, statement: &str, error: BackendError) {
        self.prepare_failures
            .lock()
            .insert(statement.to_string(), error);
    }

    /// Queue the outcome of the next execute call; unqueued calls
    /// return Void.
    pub fn queue_execute(&self, result: Result<ExecutionResult, BackendError>) {
        self.execute_results.lock().push_back(result);
    }

    /// Queue the outcome of the next batch call; unqueued calls return
    /// Void.
    pub fn queue_batch(&self, result: Result<ExecutionResult, BackendError>) {
        self.batch_results.lock().push_back(result);
    }
}

#[async_trait]
impl BackendConnection for MockConnection {
    fn login(&self, user: AuthenticatedUser) -> Result<(), BackendError> {
        *self.user.lock() = Some(user);
        Ok(())
    }

    fn logged_user(&self) -> Option<AuthenticatedUser> {
        self.user.lock().clone()
    }

    async fn prepare(
        &self,
        statement: &str,
        _parameters: &ExecutionParameters,
    ) -> Result<Arc<PreparedStatement>, BackendError> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        self.prepared.lock().push(statement.to_string());

        let delay = self.prepare_delays.lock().get(statement).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.prepare_failures.lock().get(statement) {
            return Err(error.clone());
        }
        Ok(Arc::new(PreparedStatement {
            id: Uuid::new_v4(),
            statement: statement.to_string(),
        }))
    }

    async fn execute(
        &self,
        statement: BoundStatement,
        parameters: &ExecutionParameters,
        _started_at: Instant,
    ) -> Result<ExecutionResult, BackendError> {
        self.executed.lock().push(statement);
        self.execute_parameters.lock().push(parameters.clone());
        self.execute_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecutionResult::void()))
    }

    async fn batch(
        &self,
        batch: Batch,
        _parameters: &ExecutionParameters,
        _started_at: Instant,
    ) -> Result<ExecutionResult, BackendError> {
        self.batches.lock().push(batch);
        self.batch_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecutionResult::void()))
    }
}

/// Backend wrapper handing out one shared mock connection.
pub struct MockBackend {
    pub connection: Arc<MockConnection>,
    authenticator: Arc<PlainAuthenticator>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            connection: MockConnection::new(),
            authenticator: Arc::new(PlainAuthenticator::new("secret")),
        }
    }
}

impl Backend for MockBackend {
    fn new_connection(&self, _client: ClientInfo) -> Arc<dyn BackendConnection> {
        self.connection.clone()
    }

    fn authenticator(&self) -> Arc<dyn Authenticator> {
        self.authenticator.clone()
    }
}

/// PLAIN-mechanism authenticator: `\0user\0password`.
pub struct PlainAuthenticator {
    password: String,
}

impl PlainAuthenticator {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
        }
    }
}

impl Authenticator for PlainAuthenticator {
    fn new_sasl_negotiator(
        &self,
        _peer: IpAddr,
        _certificates: Option<Vec<PeerCertificate>>,
    ) -> Box<dyn SaslNegotiator> {
        Box::new(PlainNegotiator {
            password: self.password.clone(),
            user: None,
        })
    }
}

struct PlainNegotiator {
    password: String,
    user: Option<AuthenticatedUser>,
}

impl SaslNegotiator for PlainNegotiator {
    fn evaluate_response(&mut self, client_response: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        let mut parts = client_response.split(|byte| *byte == 0);
        let _authzid = parts.next();
        let user = parts.next().and_then(|u| std::str::from_utf8(u).ok());
        let password = parts.next().and_then(|p| std::str::from_utf8(p).ok());
        match (user, password) {
            (Some(user), Some(password)) if password == self.password => {
                self.user = Some(AuthenticatedUser::new(user));
                Ok(None)
            }
            _ => Err(BackendError::new(
                ErrorCode::BadCredentials,
                "Provided username and/or password are incorrect",
            )),
        }
    }

    fn is_complete(&self) -> bool {
        self.user.is_some()
    }

    fn authenticated_user(&self) -> Result<AuthenticatedUser, BackendError> {
        self.user.clone().ok_or_else(|| {
            BackendError::new(ErrorCode::BadCredentials, "Authentication not complete")
        })
    }
}
