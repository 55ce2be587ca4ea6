//! Query and batch execution against the backend.
//!
//! The coordinator resolves prepared handles through the cache, executes,
//! and maps the backend's tagged result (or error) onto one protocol
//! response. Delivery is exactly-once: the caller gets one success or one
//! shaped error, never both.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::backend::{
    BackendConnection, Batch, BatchType, BoundStatement, ExecutionParameters, PreparedStatement,
    ResultKind, Rows,
};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult, StatusError};

use super::batch::prepare_ordered;
use super::prepare_cache::{PrepareKey, PreparedStatementCache};

/// Keyspace holding backend-side execution traces.
const TRACES_KEYSPACE: &str = "system_traces";
/// Trace events are extracted by column position, in this exact order.
const TRACE_EVENTS_QUERY: &str =
    "select activity, source, source_elapsed, thread from events where session_id = ?";

/// A single query to execute.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub statement: String,
    pub values: Vec<Value>,
    pub parameters: ExecutionParameters,
}

/// One statement inside a batch request.
#[derive(Debug, Clone)]
pub struct BatchQuery {
    pub statement: String,
    pub values: Vec<Value>,
}

/// A batch of statements executed as one backend call, sharing one set
/// of parameters.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub batch_type: BatchType,
    pub queries: Vec<BatchQuery>,
    pub parameters: ExecutionParameters,
}

/// One backend-side execution event collected while tracing a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub activity: String,
    pub source: String,
    pub source_elapsed: i64,
    pub thread: String,
}

/// Successful outcome of a query or batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResponse {
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_set: Option<Rows>,
    pub traces: Vec<TraceEvent>,
}

/// Orchestrates prepare/execute against the backend for one gateway.
///
/// Shared by every connection; all state lives in the prepared-statement
/// cache.
pub struct QueryExecutionCoordinator {
    cache: Arc<PreparedStatementCache>,
    max_concurrent_batch_prepares: usize,
}

impl QueryExecutionCoordinator {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            cache: Arc::new(PreparedStatementCache::new(
                config.prepared_cache_max_entries,
                config.preserve_failed_prepares,
            )),
            max_concurrent_batch_prepares: config.max_concurrent_batch_prepares.max(1),
        }
    }

    pub fn cache(&self) -> &PreparedStatementCache {
        &self.cache
    }

    /// Execute a single query, with optional tracing.
    pub async fn execute_query(
        &self,
        connection: &Arc<dyn BackendConnection>,
        request: QueryRequest,
    ) -> Result<QueryResponse, StatusError> {
        self.execute_query_inner(connection, request)
            .await
            .map_err(GatewayError::into_status)
    }

    /// Execute a batch, preparing its statements under the configured
    /// concurrency bound.
    pub async fn execute_batch(
        &self,
        connection: &Arc<dyn BackendConnection>,
        request: BatchRequest,
    ) -> Result<QueryResponse, StatusError> {
        self.execute_batch_inner(connection, request)
            .await
            .map_err(GatewayError::into_status)
    }

    async fn execute_query_inner(
        &self,
        connection: &Arc<dyn BackendConnection>,
        request: QueryRequest,
    ) -> GatewayResult<QueryResponse> {
        let parameters = request.parameters.clone();
        let user = connection.logged_user().map(|user| user.name);

        let key = PrepareKey {
            keyspace: parameters.keyspace.clone(),
            user: user.clone(),
            statement: request.statement.clone(),
        };

        // The trace-read statement is prepared alongside the main one
        // even when tracing is off; after the first request it is a
        // cache hit.
        let (prepared, prepared_tracing) = futures::try_join!(
            self.prepare(connection, key, parameters.tracing),
            self.prepare(
                connection,
                PrepareKey {
                    keyspace: Some(TRACES_KEYSPACE.to_string()),
                    user,
                    statement: TRACE_EVENTS_QUERY.to_string(),
                },
                true,
            )
        )?;

        let bound = BoundStatement {
            prepared_id: prepared.id,
            values: request.values,
            keyspace: parameters.keyspace.clone(),
        };
        let result = connection
            .execute(bound, &parameters, Instant::now())
            .await?;

        let mut response = QueryResponse {
            warnings: result.warnings,
            ..Default::default()
        };
        match result.kind {
            ResultKind::Void => {
                if parameters.tracing {
                    response.tracing_id = result.tracing_id;
                }
            }
            ResultKind::SchemaChange(_) => {}
            ResultKind::Rows(rows) => {
                response.result_set = Some(rows);
                if parameters.tracing {
                    response.tracing_id = result.tracing_id;
                }
            }
            ResultKind::SetKeyspace(_) => {
                return Err(GatewayError::InvalidRequest(
                    "USE <keyspace> not supported".to_string(),
                ));
            }
        }

        if parameters.tracing {
            if let Some(tracing_id) = response.tracing_id {
                self.attach_traces(connection, &prepared_tracing, tracing_id, &parameters, &mut response)
                    .await?;
            }
        }

        Ok(response)
    }

    async fn execute_batch_inner(
        &self,
        connection: &Arc<dyn BackendConnection>,
        request: BatchRequest,
    ) -> GatewayResult<QueryResponse> {
        if request.queries.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "No queries in batch".to_string(),
            ));
        }

        let parameters = request.parameters.clone();
        let user = connection.logged_user().map(|user| user.name);

        let statements = prepare_ordered(
            request.queries,
            self.max_concurrent_batch_prepares,
            |_, query| {
                let cache = self.cache.clone();
                let connection = connection.clone();
                let keyspace = parameters.keyspace.clone();
                let user = user.clone();
                let tracing = parameters.tracing;
                async move {
                    let key = PrepareKey {
                        keyspace: keyspace.clone(),
                        user,
                        statement: query.statement,
                    };
                    let prepared = prepare_through_cache(&cache, &connection, key, tracing).await?;
                    Ok::<_, GatewayError>(BoundStatement {
                        prepared_id: prepared.id,
                        values: query.values,
                        keyspace,
                    })
                }
            },
        )
        .await?;

        let batch = Batch {
            batch_type: request.batch_type,
            statements,
        };
        let result = connection.batch(batch, &parameters, Instant::now()).await?;

        let mut response = QueryResponse {
            warnings: result.warnings,
            ..Default::default()
        };
        if parameters.tracing {
            response.tracing_id = result.tracing_id;
        }
        match result.kind {
            ResultKind::Void => Ok(response),
            _ => Err(GatewayError::Internal("Unhandled result kind".to_string())),
        }
    }

    async fn prepare(
        &self,
        connection: &Arc<dyn BackendConnection>,
        key: PrepareKey,
        tracing: bool,
    ) -> GatewayResult<Arc<PreparedStatement>> {
        prepare_through_cache(&self.cache, connection, key, tracing).await
    }

    /// Read the trace events for `tracing_id` and attach them to the
    /// response. Only consistency levels carry over to the trace read.
    async fn attach_traces(
        &self,
        connection: &Arc<dyn BackendConnection>,
        prepared_tracing: &PreparedStatement,
        tracing_id: Uuid,
        parameters: &ExecutionParameters,
        response: &mut QueryResponse,
    ) -> GatewayResult<()> {
        let trace_parameters = ExecutionParameters {
            consistency: parameters.consistency,
            serial_consistency: parameters.serial_consistency,
            ..Default::default()
        };
        let bound = BoundStatement {
            prepared_id: prepared_tracing.id,
            values: vec![Value::String(tracing_id.to_string())],
            keyspace: Some(TRACES_KEYSPACE.to_string()),
        };

        let result = connection
            .execute(bound, &trace_parameters, Instant::now())
            .await?;
        let rows = match result.kind {
            ResultKind::Rows(rows) => rows,
            _ => {
                return Err(GatewayError::Internal(
                    "Unhandled result kind for trace events query".to_string(),
                ));
            }
        };

        // Column order is fixed by TRACE_EVENTS_QUERY.
        for row in &rows.rows {
            response.traces.push(TraceEvent {
                activity: string_column(row.first()),
                source: source_column(row.get(1)),
                source_elapsed: row.get(2).and_then(Value::as_i64).unwrap_or_default(),
                thread: string_column(row.get(3)),
            });
        }
        Ok(())
    }
}

async fn prepare_through_cache(
    cache: &PreparedStatementCache,
    connection: &Arc<dyn BackendConnection>,
    key: PrepareKey,
    tracing: bool,
) -> GatewayResult<Arc<PreparedStatement>> {
    let prepare_parameters = ExecutionParameters {
        keyspace: key.keyspace.clone(),
        tracing,
        ..Default::default()
    };
    let connection = connection.clone();
    let statement = key.statement.clone();
    cache
        .get_or_prepare(&key, move || async move {
            connection.prepare(&statement, &prepare_parameters).await
        })
        .await
        .map_err(Into::into)
}

fn string_column(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn source_column(value: Option<&Value>) -> String {
    match value.and_then(Value::as_str) {
        Some(source) => source.to_string(),
        None => {
            tracing::warn!("Problem when getting tracing source value.");
            String::new()
        }
    }
}
