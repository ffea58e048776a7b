//! Domain service: create, read, list, edit, delete, attach and detach for
//! any registered entity type.
//!
//! One [`EntityService`] serves every schema in its registry. Each operation
//! runs its storage calls sequentially; every write an operation makes is
//! submitted as a single atomic [`WriteRequest`].
//!
//! Storage failures are logged with the query id and returned unchanged.

mod attach;
mod create;
mod edit;
mod input;
mod remove;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, Span};
use uuid::Uuid;

pub use input::{EditInstruction, EditOperation, EditOutcome};

use crate::config::{PaginationConfig, RiskgraphConfig};
use crate::error::{ExecutionError, GraphError, GraphResult, ValidationError};
use crate::id::{EntityId, Locator, LOCATOR_SCHEME};
use crate::page::{paginate, Connection, ListArgs};
use crate::query::{
    probe_query, select_all_query, select_by_id_query, ParentScope, SelectQuery, Statement,
};
use crate::reducer::{reduce, Entity};
use crate::schema::{json_type_name, EntitySchema, FieldDef, SchemaRegistry};
use crate::storage::{ReadRequest, Row, StorageEngine, StorageError, WriteRequest};
use crate::time::{stamp, Clock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Create,
    Edit,
    Delete,
}

/// Generic persistence service over a schema registry and a storage engine.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use riskgraph::{EntityService, InMemoryTripleStore, RiskgraphConfig, SchemaRegistry};
/// use serde_json::json;
///
/// let service = EntityService::new(
///     Arc::new(SchemaRegistry::builtin()?),
///     Arc::new(InMemoryTripleStore::new()),
///     &RiskgraphConfig::default(),
/// );
/// let created = service.create("Reference", &json!({ "name": "Foo", "url": "http://x" }))?;
/// let found = service.find_by_id("Reference", &created.id().to_string())?;
/// assert_eq!(found, Some(created));
/// # Ok::<(), riskgraph::GraphError>(())
/// ```
pub struct EntityService {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn StorageEngine>,
    clock: Arc<dyn Clock>,
    span: Span,
    db_name: String,
    namespace: Uuid,
    pagination: PaginationConfig,
    max_text_len: usize,
}

impl std::fmt::Debug for EntityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityService")
            .field("db_name", &self.db_name)
            .field("namespace", &self.namespace)
            .field("schemas", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl EntityService {
    /// Creates a service using the system clock and the current span as the
    /// parent of operation spans.
    #[must_use]
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn StorageEngine>,
        config: &RiskgraphConfig,
    ) -> Self {
        Self {
            registry,
            store,
            clock: Arc::new(SystemClock),
            span: Span::current(),
            db_name: config.store.db_name.clone(),
            namespace: config.store.namespace,
            pagination: config.pagination.clone(),
            max_text_len: config.validation.max_text_len,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the span every operation span is parented to.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Looks up a schema by type name.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownEntityType` for unregistered names.
    pub fn schema(&self, entity_type: &str) -> GraphResult<Arc<EntitySchema>> {
        Ok(Arc::clone(self.registry.get(entity_type)?))
    }

    /// Fetches one entity; `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if `id` is malformed
    /// - `UnknownEntityType` for unregistered types
    /// - storage errors, unchanged
    pub fn find_by_id(&self, entity_type: &str, id: &str) -> GraphResult<Option<Entity>> {
        let schema = self.schema(entity_type)?;
        let query_id = format!("Select {}", schema.name());
        let span = self.op_span("find_by_id", &schema, &query_id);
        let _enter = span.enter();

        let query = select_by_id_query(&schema, id, &[])?;
        self.read_by_id(&query_id, query)?
            .into_iter()
            .next()
            .map(|row| reduce(&self.registry, &schema, row))
            .transpose()
    }

    /// Lists entities of one type.
    ///
    /// Returns `None` when the requested page is empty.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for malformed filters
    /// - storage errors, unchanged
    pub fn list(&self, entity_type: &str, args: &ListArgs) -> GraphResult<Option<Connection>> {
        let schema = self.schema(entity_type)?;
        let query_id = format!("Select all {}", schema.plural_pascal());
        let span = self.op_span("list", &schema, &query_id);
        let _enter = span.enter();

        self.list_scoped(&schema, args, None, &query_id)
    }

    /// Lists the `entity_type` entities referenced by `field` of one parent.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if `parent_id` is malformed
    /// - `UnsupportedField` / `TypeMismatch` if `field` cannot hold
    ///   `entity_type` entities
    /// - storage errors, unchanged
    pub fn list_within(
        &self,
        entity_type: &str,
        parent_type: &str,
        parent_id: &str,
        field: &str,
        args: &ListArgs,
    ) -> GraphResult<Option<Connection>> {
        let schema = self.schema(entity_type)?;
        let parent = self.schema(parent_type)?;
        let query_id = format!("Select {} of {}", schema.plural_pascal(), parent.name());
        let span = self.op_span("list_within", &schema, &query_id);
        let _enter = span.enter();

        let scope = ParentScope::new(&parent, parent_id, field, &schema)?;
        self.list_scoped(&schema, args, Some(&scope), &query_id)
    }

    fn list_scoped(
        &self,
        schema: &EntitySchema,
        args: &ListArgs,
        scope: Option<&ParentScope>,
        query_id: &str,
    ) -> GraphResult<Option<Connection>> {
        let args = self.effective_args(args);
        let query = select_all_query(schema, &[], &args, scope);
        let entities = self
            .read_all(query_id, query)?
            .into_iter()
            .map(|row| reduce(&self.registry, schema, row))
            .collect::<GraphResult<Vec<_>>>()?;
        debug!(rows = entities.len(), "paginating");
        Ok(paginate(entities, &args, self.pagination.policy)?)
    }

    /// Applies the configured default and cap to `first`.
    fn effective_args(&self, args: &ListArgs) -> ListArgs {
        let mut args = args.clone();
        let first = args.first.or(self.pagination.default_first);
        args.first = first.map(|n| n.min(self.pagination.max_first));
        args
    }

    fn op_span(&self, op: &'static str, schema: &EntitySchema, query_id: &str) -> Span {
        tracing::info_span!(
            parent: &self.span,
            "entity_op",
            op,
            entity_type = schema.name(),
            query_id
        )
    }

    fn now(&self) -> DateTime<Utc> {
        stamp(self.clock.as_ref())
    }

    fn read_by_id(&self, query_id: &str, query: SelectQuery) -> GraphResult<Vec<Row>> {
        debug!(query_id, %query, "query by id");
        let request = self.read_request(query_id, query);
        self.store
            .query_by_id(&request)
            .map_err(|e| storage_failure(query_id, e))
    }

    fn read_all(&self, query_id: &str, query: SelectQuery) -> GraphResult<Vec<Row>> {
        debug!(query_id, %query, "query all");
        let request = self.read_request(query_id, query);
        self.store
            .query_all(&request)
            .map_err(|e| storage_failure(query_id, e))
    }

    fn read_request(&self, query_id: &str, query: SelectQuery) -> ReadRequest {
        ReadRequest {
            db_name: self.db_name.clone(),
            query_id: query_id.to_string(),
            query,
        }
    }

    /// Submits `statements` as one transaction. Errors are returned raw so
    /// callers can classify them before logging.
    fn submit(
        &self,
        kind: WriteKind,
        query_id: &str,
        statements: Vec<Statement>,
    ) -> Result<(), StorageError> {
        for statement in &statements {
            debug!(query_id, %statement, "statement");
        }
        let request = WriteRequest {
            db_name: self.db_name.clone(),
            query_id: query_id.to_string(),
            statements,
        };
        match kind {
            WriteKind::Create => self.store.create(&request),
            WriteKind::Edit => self.store.edit(&request),
            WriteKind::Delete => self.store.delete(&request),
        }
    }

    fn exists(&self, schema: &EntitySchema, id: EntityId) -> GraphResult<bool> {
        let query_id = format!("Probe {}", schema.name());
        Ok(!self.read_by_id(&query_id, probe_query(schema, id))?.is_empty())
    }

    /// Finds the stored entity `id` points at and checks it fits `field`.
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` if the entity exists with a type `field` cannot hold
    /// - `EntityNotFound` if it does not exist at all
    fn resolve_reference(&self, field: &FieldDef, id: EntityId) -> GraphResult<Locator> {
        let targets = field.kind().targets();
        for target in targets {
            let schema = self.registry.get(target)?;
            if self.exists(schema, id)? {
                return Ok(schema.locator(id));
            }
        }
        for other in self.registry.iter() {
            if targets.iter().any(|t| t == other.name()) {
                continue;
            }
            if self.exists(other, id)? {
                return Err(ExecutionError::TypeMismatch {
                    field: field.name().to_string(),
                    expected: targets.join("|"),
                    actual: other.name().to_string(),
                }
                .into());
            }
        }
        Err(ExecutionError::EntityNotFound { id }.into())
    }
}

fn storage_failure(query_id: &str, e: StorageError) -> GraphError {
    error!(query_id, error = %e, "storage call failed");
    e.into()
}

/// Parses a reference given either as a bare id or as a locator.
fn parse_reference_id(raw: &str) -> Result<EntityId, ValidationError> {
    let raw = raw.trim();
    if raw.starts_with(LOCATOR_SCHEME) {
        Ok(Locator::parse(raw)?.id())
    } else {
        EntityId::parse(raw)
    }
}

/// Reads reference input elements as ids; blank strings are dropped.
fn reference_ids(
    field: &FieldDef,
    elements: &[&serde_json::Value],
) -> Result<Vec<EntityId>, ValidationError> {
    let mut ids: Vec<EntityId> = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            serde_json::Value::Null => {}
            serde_json::Value::String(s) if s.trim().is_empty() => {}
            serde_json::Value::String(s) => {
                let id = parse_reference_id(s)?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            other => {
                return Err(ValidationError::invalid_value(
                    field.name(),
                    format!("expected entity identifiers, got {}", json_type_name(other)),
                ))
            }
        }
    }
    if !field.is_many() && ids.len() > 1 {
        return Err(ValidationError::invalid_value(
            field.name(),
            format!("expected a single value, got {}", ids.len()),
        ));
    }
    Ok(ids)
}
