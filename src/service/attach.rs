//! Attaching and detaching references between existing entities.

use tracing::info;

use crate::error::{ExecutionError, GraphError, GraphResult};
use crate::id::EntityId;
use crate::query::{attach_query, detach_query, reference_field, update_query, Change, Term, Triple};
use crate::schema::EntitySchema;
use crate::service::{parse_reference_id, storage_failure, EntityService, WriteKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Attach,
    Detach,
}

impl EntityService {
    /// Adds `target_id` to reference field `field` of entity `id`.
    ///
    /// On a single-valued field the new target replaces the old one.
    /// Attaching a target that is already attached succeeds without change.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if either id is malformed
    /// - `UnsupportedField` if `field` is not a reference field, or is an
    ///   owned field (owned entities are only created through their owner)
    /// - `EntityNotFound` if the entity or the target does not exist
    /// - `TypeMismatch` if the target has a type `field` cannot hold
    /// - storage errors, unchanged
    pub fn attach(
        &self,
        entity_type: &str,
        id: &str,
        field: &str,
        target_id: &str,
    ) -> GraphResult<bool> {
        self.link(Link::Attach, entity_type, id, field, target_id)
    }

    /// Removes `target_id` from reference field `field` of entity `id`.
    ///
    /// Detaching a target that is not attached is a successful no-op.
    ///
    /// # Errors
    ///
    /// Same as [`Self::attach`].
    pub fn detach(
        &self,
        entity_type: &str,
        id: &str,
        field: &str,
        target_id: &str,
    ) -> GraphResult<bool> {
        self.link(Link::Detach, entity_type, id, field, target_id)
    }

    fn link(
        &self,
        link: Link,
        entity_type: &str,
        id: &str,
        field: &str,
        target_id: &str,
    ) -> GraphResult<bool> {
        let schema = self.schema(entity_type)?;
        let (op, query_id) = match link {
            Link::Attach => ("attach", format!("Attach to {}", schema.name())),
            Link::Detach => ("detach", format!("Detach from {}", schema.name())),
        };
        let span = self.op_span(op, &schema, &query_id);
        let _enter = span.enter();

        let owner = EntityId::parse(id)?;
        let target = parse_reference_id(target_id)?;
        let def = reference_field(&schema, field)?;
        if def.is_owned() {
            return Err(unsupported(&schema, field));
        }
        if !self.exists(&schema, owner)? {
            return Err(ExecutionError::EntityNotFound { id: owner }.into());
        }
        let target = self.resolve_reference(def, target)?;

        let statement = match link {
            Link::Attach if !def.is_many() => {
                let partition = schema.locator(owner);
                let predicate = def.predicate_key();
                update_query(
                    &partition,
                    vec![
                        Change::Clear {
                            predicate: predicate.to_string(),
                        },
                        Change::Add {
                            triple: Triple::new(
                                partition.clone(),
                                predicate,
                                Term::Locator(target.clone()),
                            ),
                        },
                    ],
                )
            }
            Link::Attach => attach_query(&schema, id, field, std::slice::from_ref(&target))?,
            Link::Detach => detach_query(&schema, id, field, std::slice::from_ref(&target))?,
        };
        self.submit(WriteKind::Edit, &query_id, vec![statement])
            .map_err(|e| storage_failure(&query_id, e))?;
        info!(%owner, field, %target, op, "reference link updated");
        Ok(true)
    }
}

fn unsupported(schema: &EntitySchema, field: &str) -> GraphError {
    ExecutionError::UnsupportedField {
        entity_type: schema.name().to_string(),
        field: field.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::RiskgraphConfig;
    use crate::schema::SchemaRegistry;
    use crate::storage::InMemoryTripleStore;
    use crate::value::Value;

    fn service() -> EntityService {
        EntityService::new(
            Arc::new(SchemaRegistry::builtin().unwrap()),
            Arc::new(InMemoryTripleStore::new()),
            &RiskgraphConfig::default(),
        )
    }

    #[test]
    fn test_attach_and_detach_round_trip() {
        let svc = service();
        let risk = svc.create("Risk", &json!({ "name": "Outage" })).unwrap();
        let doc = svc.create("Reference", &json!({ "name": "Doc" })).unwrap();
        let (risk_id, doc_id) = (risk.id().to_string(), doc.id().to_string());

        assert!(svc.attach("Risk", &risk_id, "references", &doc_id).unwrap());
        assert!(svc.attach("Risk", &risk_id, "references", &doc_id).unwrap());
        let found = svc.find_by_id("Risk", &risk_id).unwrap().unwrap();
        assert_eq!(
            found.get("references"),
            Some(&Value::List(vec![Value::String(doc_id.clone())]))
        );

        assert!(svc.detach("Risk", &risk_id, "references", &doc_id).unwrap());
        assert!(svc.detach("Risk", &risk_id, "references", &doc_id).unwrap());
        let found = svc.find_by_id("Risk", &risk_id).unwrap().unwrap();
        assert!(found.get("references").is_none());
    }

    #[test]
    fn test_attach_single_valued_replaces() {
        let svc = service();
        let risk = svc.create("Risk", &json!({ "name": "Outage" })).unwrap();
        let a = svc.create("TaxonomyEntry", &json!({ "taxonomy_name": "A" })).unwrap();
        let b = svc.create("TaxonomyEntry", &json!({ "taxonomy_name": "B" })).unwrap();
        let risk_id = risk.id().to_string();

        svc.attach("Risk", &risk_id, "taxonomy", &a.id().to_string()).unwrap();
        svc.attach("Risk", &risk_id, "taxonomy", &b.id().to_string()).unwrap();
        let found = svc.find_by_id("Risk", &risk_id).unwrap().unwrap();
        assert_eq!(found.get("taxonomy"), Some(&Value::String(b.id().to_string())));
    }

    #[test]
    fn test_attach_validation() {
        let svc = service();
        let risk = svc.create("Risk", &json!({ "name": "Outage" })).unwrap();
        let other = svc.create("Risk", &json!({ "name": "Other" })).unwrap();
        let doc = svc.create("Reference", &json!({ "name": "Doc" })).unwrap();
        let risk_id = risk.id().to_string();
        let doc_id = doc.id().to_string();

        let err = svc.attach("Risk", &risk_id, "statement", &doc_id).unwrap_err();
        assert!(matches!(err, GraphError::Execution(ExecutionError::UnsupportedField { .. })));

        let err = svc
            .attach("Risk", &risk_id, "references", &other.id().to_string())
            .unwrap_err();
        assert!(matches!(err, GraphError::Execution(ExecutionError::TypeMismatch { .. })));

        let missing = EntityId::nil().to_string();
        assert!(svc.attach("Risk", &risk_id, "references", &missing).unwrap_err().is_not_found());
        assert!(svc.attach("Risk", &missing, "references", &doc_id).unwrap_err().is_not_found());
        let err = svc.attach("Risk", "x", "references", &doc_id).unwrap_err();
        assert!(err.is_invalid_identifier());
    }

    #[test]
    fn test_owned_fields_cannot_be_linked() {
        let svc = service();
        let doc = svc
            .create(
                "Reference",
                &json!({ "name": "Doc", "hashes": [{ "algorithm": "MD5", "value": "x" }] }),
            )
            .unwrap();
        let hash_id = doc
            .get("hashes")
            .and_then(|v| v.elements().next())
            .and_then(Value::as_str)
            .unwrap()
            .to_string();
        let err = svc
            .detach("Reference", &doc.id().to_string(), "hashes", &hash_id)
            .unwrap_err();
        assert!(matches!(err, GraphError::Execution(ExecutionError::UnsupportedField { .. })));
    }
}
