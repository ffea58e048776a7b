//! Abstract storage contract for riskgraph.
//!
//! The persistence layer treats the backing store as an opaque engine that
//! executes typed queries and statements. By using a trait we can run the
//! same service against the in-memory engine in tests and embedded use, or
//! against a real triple store.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::query::{SelectQuery, Statement};
use crate::value::Value;

/// Column holding the subject locator of each returned row.
pub const ROW_LOCATOR: &str = "iri";

/// A flat result record: projection variable to value.
///
/// List-valued projections come back as [`Value::List`]; absent optional
/// projections are left out.
pub type Row = BTreeMap<String, Value>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A partition with this locator already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The statement targets a partition that does not exist.
    #[error("Partition not found: {0}")]
    PartitionNotFound(String),

    /// The engine cannot execute this statement.
    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// A read call.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Logical database the query runs against.
    pub db_name: String,
    /// Human-readable label used only for diagnostics.
    pub query_id: String,
    pub query: SelectQuery,
}

/// A write call; `statements` are applied in order, all or nothing.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Logical database the statements run against.
    pub db_name: String,
    /// Human-readable label used only for diagnostics.
    pub query_id: String,
    pub statements: Vec<Statement>,
}

/// Storage engine contract.
///
/// # Safety Considerations
/// - Each `WriteRequest` must be applied atomically
/// - `Statement::Insert` must fail with `DuplicateKey` when the partition
///   exists, so identifier uniqueness holds even under concurrent creates
pub trait StorageEngine: Send + Sync {
    /// Run a point lookup; returns zero or one row.
    fn query_by_id(&self, request: &ReadRequest) -> Result<Vec<Row>, StorageError>;

    /// Run a bulk read; rows come back in store order.
    fn query_all(&self, request: &ReadRequest) -> Result<Vec<Row>, StorageError>;

    /// Apply statements that create entities.
    fn create(&self, request: &WriteRequest) -> Result<(), StorageError>;

    /// Apply statements that change existing entities.
    fn edit(&self, request: &WriteRequest) -> Result<(), StorageError>;

    /// Apply statements that remove entities.
    fn delete(&self, request: &WriteRequest) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_storage_engine_object_safe(_: &dyn StorageEngine) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::DuplicateKey("urn:riskgraph:hash--x".to_string());
        assert!(err.to_string().contains("Duplicate key"));

        let err = StorageError::BackendError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
