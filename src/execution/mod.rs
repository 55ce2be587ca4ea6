pub mod batch;
pub mod coordinator;
pub mod prepare_cache;

pub use batch::prepare_ordered;
pub use coordinator::{
    BatchQuery, BatchRequest, QueryExecutionCoordinator, QueryRequest, QueryResponse, TraceEvent,
};
pub use prepare_cache::{PrepareKey, PreparedCacheStats, PreparedStatementCache};
