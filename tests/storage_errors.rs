use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use riskgraph::storage::{ReadRequest, Row, WriteRequest};
use riskgraph::{
    EntityService, InMemoryTripleStore, ListArgs, RiskgraphConfig, SchemaRegistry,
    StorageEngine, StorageError,
};
use serde_json::json;

/// Reads from an in-memory store; every write fails.
struct ReadOnlyStore {
    inner: InMemoryTripleStore,
    writes: AtomicUsize,
}

impl ReadOnlyStore {
    fn refuse(&self, request: &WriteRequest) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::BackendError(format!(
            "read-only replica refused {}",
            request.query_id
        )))
    }
}

impl StorageEngine for ReadOnlyStore {
    fn query_by_id(&self, request: &ReadRequest) -> Result<Vec<Row>, StorageError> {
        self.inner.query_by_id(request)
    }

    fn query_all(&self, request: &ReadRequest) -> Result<Vec<Row>, StorageError> {
        self.inner.query_all(request)
    }

    fn create(&self, request: &WriteRequest) -> Result<(), StorageError> {
        self.refuse(request)
    }

    fn edit(&self, request: &WriteRequest) -> Result<(), StorageError> {
        self.refuse(request)
    }

    fn delete(&self, request: &WriteRequest) -> Result<(), StorageError> {
        self.refuse(request)
    }
}

/// Every call fails.
struct DownStore;

impl StorageEngine for DownStore {
    fn query_by_id(&self, _: &ReadRequest) -> Result<Vec<Row>, StorageError> {
        Err(StorageError::BackendError("connection refused".to_string()))
    }

    fn query_all(&self, _: &ReadRequest) -> Result<Vec<Row>, StorageError> {
        Err(StorageError::BackendError("connection refused".to_string()))
    }

    fn create(&self, _: &WriteRequest) -> Result<(), StorageError> {
        Err(StorageError::BackendError("connection refused".to_string()))
    }

    fn edit(&self, _: &WriteRequest) -> Result<(), StorageError> {
        Err(StorageError::BackendError("connection refused".to_string()))
    }

    fn delete(&self, _: &WriteRequest) -> Result<(), StorageError> {
        Err(StorageError::BackendError("connection refused".to_string()))
    }
}

fn service(store: Arc<dyn StorageEngine>) -> EntityService {
    EntityService::new(
        Arc::new(SchemaRegistry::builtin().unwrap()),
        store,
        &RiskgraphConfig::default(),
    )
}

#[test]
fn storage_errors_pass_through_unchanged() {
    let svc = service(Arc::new(DownStore));

    let err = svc.list("Reference", &ListArgs::default()).unwrap_err();
    assert!(err.is_storage());
    assert!(err.is_retryable());
    assert_eq!(err.to_string(), "Storage backend error: connection refused");

    let err = svc.create("Reference", &json!({ "name": "Foo" })).unwrap_err();
    assert!(err.is_storage());
}

#[test]
fn validation_happens_before_storage() {
    let store = Arc::new(ReadOnlyStore {
        inner: InMemoryTripleStore::new(),
        writes: AtomicUsize::new(0),
    });
    let svc = service(store.clone());

    assert!(svc.create("Reference", &json!({ "url": "http://x" })).is_err());
    assert!(svc.delete("Reference", "not-an-id").is_err());
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);

    let err = svc.create("Reference", &json!({ "name": "Foo" })).unwrap_err();
    assert!(err.to_string().contains("refused Create Reference"));
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}
