//! Statement builders driven by entity schemas.
//!
//! All functions here are pure: they validate their inputs and return typed
//! statements without touching storage.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::{ExecutionError, GraphResult, ValidationError};
use crate::id::{generate_id, EntityId, Locator};
use crate::page::ListArgs;
use crate::query::term::{Change, Projection, Scope, SelectQuery, Statement, Term, Triple};
use crate::schema::{
    EntitySchema, FieldDef, CREATED_FIELD, CREATED_PREDICATE, ID_FIELD, ID_PREDICATE,
    MODIFIED_FIELD, MODIFIED_PREDICATE, TYPE_FIELD, TYPE_PREDICATE,
};
use crate::value::Value;

/// Typed field values keyed by field name.
pub type PropertyBag = BTreeMap<String, Value>;

/// Result of [`insert_query`].
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub id: EntityId,
    pub locator: Locator,
    pub statement: Statement,
}

/// Containment constraint for parent-scoped listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentScope {
    pub locator: Locator,
    pub predicate: String,
}

impl ParentScope {
    /// Scope listing the `child` entities referenced by `parent.field`.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if `parent_id` is malformed
    /// - `UnsupportedField` if `field` is not a reference field of `parent`
    /// - `TypeMismatch` if the field cannot point at `child` entities
    pub fn new(
        parent: &EntitySchema,
        parent_id: &str,
        field: &str,
        child: &EntitySchema,
    ) -> GraphResult<Self> {
        let id = EntityId::parse(parent_id)?;
        let def = reference_field(parent, field)?;
        if !def.kind().targets().iter().any(|t| t == child.name()) {
            return Err(ExecutionError::TypeMismatch {
                field: field.to_string(),
                expected: def.kind().targets().join("|"),
                actual: child.name().to_string(),
            }
            .into());
        }
        Ok(Self {
            locator: parent.locator(id),
            predicate: def.predicate_key().to_string(),
        })
    }
}

/// Looks up a declared reference field.
///
/// # Errors
///
/// Returns `ExecutionError::UnsupportedField` if `field` is undeclared or not
/// reference-valued.
pub fn reference_field<'a>(schema: &'a EntitySchema, field: &str) -> GraphResult<&'a FieldDef> {
    schema
        .get_field(field)
        .filter(|f| f.kind().is_reference())
        .ok_or_else(|| {
            ExecutionError::UnsupportedField {
                entity_type: schema.name().to_string(),
                field: field.to_string(),
            }
            .into()
        })
}

fn projections(schema: &EntitySchema, fields: &[&str]) -> Vec<Projection> {
    let mut out: Vec<Projection> = EntitySchema::system_projections()
        .into_iter()
        .filter(|p| !p.is_optional())
        .collect();

    if fields.is_empty() {
        out.extend(
            EntitySchema::system_projections()
                .into_iter()
                .filter(Projection::is_optional),
        );
        out.extend(schema.fields().iter().map(FieldDef::optional));
        return out;
    }

    for name in fields {
        if out.iter().any(|p| p.variable() == *name) {
            continue;
        }
        if let Some(projection) = schema.projection_for(name) {
            out.push(projection);
        }
    }
    out
}

/// Point lookup of one entity.
///
/// `id` and the type tag are always bound; an empty `fields` list binds
/// every mapped field. Unmapped names are ignored.
///
/// # Errors
///
/// Returns `ValidationError::InvalidIdentifier` if `id` is malformed.
pub fn select_by_id_query(
    schema: &EntitySchema,
    id: &str,
    fields: &[&str],
) -> Result<SelectQuery, ValidationError> {
    let id = EntityId::parse(id)?;
    Ok(SelectQuery {
        object_type: schema.segment().to_string(),
        scope: Scope::ById {
            locator: schema.locator(id),
        },
        projections: projections(schema, fields),
    })
}

/// Bulk read of every entity of `schema`, optionally scoped to a parent.
///
/// Fields named by `args.filters` or `args.ordered_by` are added to the
/// projection so the pagination step can see them.
#[must_use]
pub fn select_all_query(
    schema: &EntitySchema,
    fields: &[&str],
    args: &ListArgs,
    parent: Option<&ParentScope>,
) -> SelectQuery {
    let mut names: Vec<&str> = fields.to_vec();
    if !names.is_empty() {
        let extra = args
            .filters
            .iter()
            .map(|f| f.key.as_str())
            .chain(args.ordered_by.as_deref());
        for name in extra {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let scope = parent.map_or(Scope::All, |p| Scope::Within {
        parent: p.locator.clone(),
        predicate: p.predicate.clone(),
    });

    SelectQuery {
        object_type: schema.segment().to_string(),
        scope,
        projections: projections(schema, &names),
    }
}

/// Builds the insert for a new entity from a typed property bag.
///
/// The identifier is derived from the identity fields present in `bag`,
/// within `namespace`. Unmapped keys are dropped.
///
/// # Errors
///
/// - `MissingField` if none of the identity fields are present
/// - `InvalidIdentifier` if identifier derivation misbehaves
pub fn insert_query(
    schema: &EntitySchema,
    namespace: &Uuid,
    bag: &PropertyBag,
) -> Result<InsertQuery, ValidationError> {
    let projection: Vec<(&str, &Value)> = schema
        .identity_fields()
        .filter_map(|f| {
            bag.get(f.name())
                .filter(|v| !v.is_blank())
                .map(|v| (f.name(), v))
        })
        .collect();
    if projection.is_empty() {
        let first = schema
            .identity_fields()
            .next()
            .map_or_else(|| ID_FIELD.to_string(), |f| f.name().to_string());
        return Err(ValidationError::MissingField { field: first });
    }

    let id = generate_id(namespace, schema.name(), &projection)?;
    let locator = schema.locator(id);

    let mut triples = vec![
        Triple::new(
            locator.clone(),
            ID_PREDICATE,
            Term::Literal(Value::String(id.to_string())),
        ),
        Triple::new(
            locator.clone(),
            TYPE_PREDICATE,
            Term::Literal(Value::String(schema.segment().to_string())),
        ),
    ];
    for (name, predicate) in [
        (CREATED_FIELD, CREATED_PREDICATE),
        (MODIFIED_FIELD, MODIFIED_PREDICATE),
    ] {
        if let Some(value) = bag.get(name).filter(|v| !v.is_blank()) {
            triples.push(Triple::new(locator.clone(), predicate, Term::from_value(value)));
        }
    }
    for field in schema.fields() {
        if let Some(value) = bag.get(field.name()) {
            triples.extend(field.binding(&locator, value));
        }
    }

    Ok(InsertQuery {
        id,
        statement: Statement::Insert {
            partition: locator.clone(),
            triples,
        },
        locator,
    })
}

/// Removes the whole partition of entity `id`.
///
/// # Errors
///
/// Returns `ValidationError::InvalidIdentifier` if `id` is malformed.
pub fn delete_by_id_query(schema: &EntitySchema, id: &str) -> Result<Statement, ValidationError> {
    let id = EntityId::parse(id)?;
    Ok(delete_by_locator_query(&schema.locator(id)))
}

/// Removes the partition at `locator`.
#[must_use]
pub fn delete_by_locator_query(locator: &Locator) -> Statement {
    Statement::DeletePartition {
        partition: locator.clone(),
    }
}

/// Adds `locators` to reference field `field` of entity `id`.
///
/// # Errors
///
/// - `InvalidIdentifier` if `id` is malformed
/// - `UnsupportedField` if `field` is not a declared reference field
pub fn attach_query(
    schema: &EntitySchema,
    id: &str,
    field: &str,
    locators: &[Locator],
) -> GraphResult<Statement> {
    let def = reference_field(schema, field)?;
    let id = EntityId::parse(id)?;
    Ok(Statement::Attach {
        partition: schema.locator(id),
        predicate: def.predicate_key().to_string(),
        objects: locators.to_vec(),
    })
}

/// Removes `locators` from reference field `field` of entity `id`.
///
/// # Errors
///
/// Same as [`attach_query`].
pub fn detach_query(
    schema: &EntitySchema,
    id: &str,
    field: &str,
    locators: &[Locator],
) -> GraphResult<Statement> {
    let def = reference_field(schema, field)?;
    let id = EntityId::parse(id)?;
    Ok(Statement::Detach {
        partition: schema.locator(id),
        predicate: def.predicate_key().to_string(),
        objects: locators.to_vec(),
    })
}

/// In-place update of one partition.
#[must_use]
pub fn update_query(locator: &Locator, changes: Vec<Change>) -> Statement {
    Statement::Edit {
        partition: locator.clone(),
        changes,
    }
}

/// Read query for an entity whose exact type is unknown.
///
/// Used when resolving references: binds only the identity columns.
#[must_use]
pub fn probe_query(schema: &EntitySchema, id: EntityId) -> SelectQuery {
    SelectQuery {
        object_type: schema.segment().to_string(),
        scope: Scope::ById {
            locator: schema.locator(id),
        },
        projections: vec![
            Projection::required(ID_FIELD, ID_PREDICATE),
            Projection::required(TYPE_FIELD, TYPE_PREDICATE),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DEFAULT_NAMESPACE;
    use crate::page::Filter;
    use crate::schema::SchemaRegistry;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builtin().unwrap()
    }

    fn bag(pairs: &[(&str, Value)]) -> PropertyBag {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_select_by_id_rejects_malformed_id() {
        let registry = registry();
        let schema = registry.get("Reference").unwrap();
        let err = select_by_id_query(schema, "abc", &["name"]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_select_by_id_always_binds_id_and_type() {
        let registry = registry();
        let schema = registry.get("Reference").unwrap();
        let id = EntityId::nil().to_string();
        let query = select_by_id_query(schema, &id, &["name"]).unwrap();
        assert!(query.binds("id"));
        assert!(query.binds("entity_type"));
        assert!(query.binds("name"));
        assert!(!query.binds("url"));
        assert!(matches!(query.scope(), Scope::ById { .. }));
    }

    #[test]
    fn test_select_all_appends_filter_and_order_fields() {
        let registry = registry();
        let schema = registry.get("Reference").unwrap();
        let args = ListArgs {
            ordered_by: Some("url".to_string()),
            filters: vec![Filter::eq("media_type", ["text/html"])],
            ..ListArgs::default()
        };
        let query = select_all_query(schema, &["name"], &args, None);
        assert!(query.binds("url"));
        assert!(query.binds("media_type"));
        assert_eq!(query.scope(), &Scope::All);
    }

    #[test]
    fn test_parent_scope_requires_reference_field() {
        let registry = registry();
        let taxonomy = registry.get("TaxonomyEntry").unwrap();
        let reference = registry.get("Reference").unwrap();
        let id = EntityId::nil().to_string();

        let scope = ParentScope::new(taxonomy, &id, "references", reference).unwrap();
        assert_eq!(scope.locator.entity_type_hint(), "taxonomy-entry");

        let err = ParentScope::new(taxonomy, &id, "name", reference).unwrap_err();
        assert!(matches!(
            err,
            crate::GraphError::Execution(ExecutionError::UnsupportedField { .. })
        ));

        let risk = registry.get("Risk").unwrap();
        let err = ParentScope::new(taxonomy, &id, "references", risk).unwrap_err();
        assert!(matches!(
            err,
            crate::GraphError::Execution(ExecutionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_insert_query_expands_lists_and_tags_type() {
        let registry = registry();
        let schema = registry.get("Reference").unwrap();
        let input = bag(&[
            ("name", Value::from("Foo")),
            ("url", Value::from("http://x")),
            (
                "labels",
                Value::List(vec![Value::from("a"), Value::from("b")]),
            ),
            ("unmapped", Value::from("dropped")),
        ]);
        let insert = insert_query(schema, &DEFAULT_NAMESPACE, &input).unwrap();
        let Statement::Insert { partition, triples } = &insert.statement else {
            panic!("expected insert");
        };
        assert_eq!(partition, &insert.locator);
        // id + type + name + url + 2 labels
        assert_eq!(triples.len(), 6);
        assert!(triples.iter().any(|t| t.predicate() == TYPE_PREDICATE
            && t.object() == &Term::Literal(Value::from("reference"))));
        assert!(!triples.iter().any(|t| t.predicate().ends_with("unmapped")));
    }

    #[test]
    fn test_insert_query_is_deterministic() {
        let registry = registry();
        let schema = registry.get("Reference").unwrap();
        let a = bag(&[("name", Value::from("Foo")), ("url", Value::from("http://x"))]);
        let b = bag(&[
            ("url", Value::from("http://x")),
            ("name", Value::from("Foo")),
            ("description", Value::from("ignored for identity")),
        ]);
        let first = insert_query(schema, &DEFAULT_NAMESPACE, &a).unwrap();
        let second = insert_query(schema, &DEFAULT_NAMESPACE, &b).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_insert_query_requires_identity() {
        let registry = registry();
        let schema = registry.get("Reference").unwrap();
        let err = insert_query(
            schema,
            &DEFAULT_NAMESPACE,
            &bag(&[("description", Value::from("x"))]),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field } if field == "name"));
    }

    #[test]
    fn test_attach_rejects_undeclared_field() {
        let registry = registry();
        let schema = registry.get("Risk").unwrap();
        let id = EntityId::nil().to_string();
        let target = Locator::new("reference", EntityId::nil());

        let err = attach_query(schema, &id, "nope", std::slice::from_ref(&target)).unwrap_err();
        assert!(matches!(
            err,
            crate::GraphError::Execution(ExecutionError::UnsupportedField { .. })
        ));
        let err = detach_query(schema, &id, "statement", &[target.clone()]).unwrap_err();
        assert!(matches!(
            err,
            crate::GraphError::Execution(ExecutionError::UnsupportedField { .. })
        ));

        let stmt = attach_query(schema, &id, "references", &[target.clone(), target]).unwrap();
        let Statement::Attach { objects, .. } = stmt else {
            panic!("expected attach");
        };
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn test_delete_by_id_scoped_to_partition() {
        let registry = registry();
        let schema = registry.get("Hash").unwrap();
        let id = EntityId::nil();
        let stmt = delete_by_id_query(schema, &id.to_string()).unwrap();
        assert_eq!(stmt.partition(), &schema.locator(id));
        assert!(delete_by_id_query(schema, "nope").is_err());
    }
}
