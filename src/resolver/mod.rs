//! GraphQL-shaped resolver surface.
//!
//! Every registered entity type gets the same set of query and mutation
//! fields, named after the schema (`reference`, `references`,
//! `createReference`, `deleteReferences`, ...). A [`Resolver`] maps a field
//! name plus JSON arguments onto the matching [`EntityService`] call and
//! renders the result as JSON.
//!
//! Requests can also arrive as serialized [`ResolverRequest`] envelopes,
//! which is how the `riskgraph` binary feeds them in.

mod operations;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tracing::{debug, warn};

pub use operations::{
    CreateArgs, DeleteManyArgs, EditArgs, IdArgs, LinkArgs, ListWithinArgs, Operation,
};

use crate::error::{GraphError, GraphResult, ValidationError};
use crate::page::ListArgs;
use crate::reducer::Entity;
use crate::service::EntityService;
use operations::parse_args;

/// One resolver call: `{ "field": "createReference", "args": { .. } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverRequest {
    pub field: String,
    #[serde(default)]
    pub args: Json,
}

impl ResolverRequest {
    #[must_use]
    pub fn new(field: impl Into<String>, args: Json) -> Self {
        Self {
            field: field.into(),
            args,
        }
    }

    /// Parses one JSON envelope.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidArgument` for malformed JSON.
    pub fn from_json(s: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(s)
            .map_err(|e| ValidationError::invalid_argument("request", e.to_string()))
    }
}

/// Error entry of a [`ResolverResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverError {
    pub message: String,
    /// Machine-readable kind, e.g. `EntityNotFound`.
    pub kind: String,
}

impl From<&GraphError> for ResolverError {
    fn from(e: &GraphError) -> Self {
        Self {
            message: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}

/// GraphQL-style response: `{ "data": { field: value }, "errors": [..] }`.
///
/// On failure `data.<field>` is `null` and `errors` holds one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverResponse {
    pub data: BTreeMap<String, Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResolverError>,
}

impl ResolverResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Value of `field` in `data` (`Null` if absent).
    #[must_use]
    pub fn value(&self, field: &str) -> &Json {
        self.data.get(field).unwrap_or(&Json::Null)
    }
}

#[derive(Debug, Clone)]
struct Binding {
    operation: Operation,
    entity_type: String,
}

/// Dispatches resolver fields to an [`EntityService`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use riskgraph::{EntityService, InMemoryTripleStore, Resolver, RiskgraphConfig, SchemaRegistry};
/// use serde_json::json;
///
/// let service = EntityService::new(
///     Arc::new(SchemaRegistry::builtin()?),
///     Arc::new(InMemoryTripleStore::new()),
///     &RiskgraphConfig::default(),
/// );
/// let resolver = Resolver::new(service);
///
/// let created = resolver.resolve("createReference", &json!({ "input": { "name": "Foo" } }))?;
/// let found = resolver.resolve("reference", &json!({ "id": created["id"] }))?;
/// assert_eq!(found["name"], "Foo");
/// # Ok::<(), riskgraph::GraphError>(())
/// ```
#[derive(Debug)]
pub struct Resolver {
    service: EntityService,
    fields: BTreeMap<String, Binding>,
}

impl Resolver {
    /// Builds the field table from the service's schema registry.
    #[must_use]
    pub fn new(service: EntityService) -> Self {
        let mut fields = BTreeMap::new();
        for schema in service.registry().iter() {
            for operation in Operation::ALL {
                let name = operation.field_name(schema);
                let binding = Binding {
                    operation,
                    entity_type: schema.name().to_string(),
                };
                if let Some(previous) = fields.insert(name.clone(), binding) {
                    warn!(
                        field = %name,
                        shadowed = %previous.entity_type,
                        "resolver field name collision"
                    );
                }
            }
        }
        Self { service, fields }
    }

    #[must_use]
    pub const fn service(&self) -> &EntityService {
        &self.service
    }

    /// Every resolvable field name, sorted.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Operation and entity type behind `field`.
    #[must_use]
    pub fn lookup(&self, field: &str) -> Option<(Operation, &str)> {
        self.fields
            .get(field)
            .map(|b| (b.operation, b.entity_type.as_str()))
    }

    /// Resolves one field.
    ///
    /// # Errors
    ///
    /// - `UnknownField` if no entity type exposes `field`
    /// - `InvalidArgument` if `args` do not fit the field
    /// - any error of the underlying service call
    pub fn resolve(&self, field: &str, args: &Json) -> GraphResult<Json> {
        let (operation, entity_type) =
            self.lookup(field).ok_or_else(|| ValidationError::UnknownField {
                name: field.to_string(),
            })?;
        debug!(field, ?operation, entity_type, "resolving");
        let svc = &self.service;

        let value = match operation {
            Operation::Get => {
                let args: IdArgs = parse_args(field, args)?;
                svc.find_by_id(entity_type, &args.id)?
                    .as_ref()
                    .map_or(Json::Null, Entity::to_json)
            }
            Operation::List => {
                let args: ListArgs = parse_args(field, args)?;
                to_json(svc.list(entity_type, &args)?)?
            }
            Operation::ListWithin => {
                let args: ListWithinArgs = parse_args(field, args)?;
                to_json(svc.list_within(
                    entity_type,
                    &args.parent_type,
                    &args.parent_id,
                    &args.field,
                    &args.list,
                )?)?
            }
            Operation::Create => {
                let args: CreateArgs = parse_args(field, args)?;
                svc.create(entity_type, &args.input)?.to_json()
            }
            Operation::Edit => {
                let args: EditArgs = parse_args(field, args)?;
                svc.edit(entity_type, &args.id, &args.input)?.entity.to_json()
            }
            Operation::Delete => {
                let args: IdArgs = parse_args(field, args)?;
                json!(svc.delete(entity_type, &args.id)?.to_string())
            }
            Operation::DeleteMany => {
                let args: DeleteManyArgs = parse_args(field, args)?;
                let removed = svc.delete_many(entity_type, &args.ids)?;
                Json::Array(removed.iter().map(|id| json!(id.to_string())).collect())
            }
            Operation::Attach => {
                let args: LinkArgs = parse_args(field, args)?;
                json!(svc.attach(entity_type, &args.id, &args.field, &args.entity_id)?)
            }
            Operation::Detach => {
                let args: LinkArgs = parse_args(field, args)?;
                json!(svc.detach(entity_type, &args.id, &args.field, &args.entity_id)?)
            }
        };
        Ok(value)
    }

    /// Resolves an envelope into a response; errors land in `errors`.
    #[must_use]
    pub fn execute(&self, request: &ResolverRequest) -> ResolverResponse {
        let (value, errors) = match self.resolve(&request.field, &request.args) {
            Ok(value) => (value, Vec::new()),
            Err(e) => {
                debug!(field = %request.field, error = %e, "resolver call failed");
                (Json::Null, vec![ResolverError::from(&e)])
            }
        };
        ResolverResponse {
            data: BTreeMap::from([(request.field.clone(), value)]),
            errors,
        }
    }
}

fn to_json<T: Serialize>(value: T) -> GraphResult<Json> {
    serde_json::to_value(value).map_err(|e| GraphError::internal(format!("serialize result: {e}")))
}
