//! Deletion, with cascade over owned references.

use tracing::{debug, info};

use crate::error::{ExecutionError, GraphResult};
use crate::id::{EntityId, Locator};
use crate::query::{delete_by_locator_query, select_by_id_query, Statement};
use crate::schema::EntitySchema;
use crate::service::{storage_failure, EntityService, WriteKind};
use crate::value::Value;

impl EntityService {
    /// Deletes one entity and everything it owns.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if `id` is malformed
    /// - `EntityNotFound` if there is no such entity
    /// - storage errors, unchanged
    pub fn delete(&self, entity_type: &str, id: &str) -> GraphResult<EntityId> {
        let schema = self.schema(entity_type)?;
        let query_id = format!("Delete {}", schema.name());
        let span = self.op_span("delete", &schema, &query_id);
        let _enter = span.enter();

        let id = EntityId::parse(id)?;
        let mut statements = Vec::new();
        if !self.plan_delete(&schema, &schema.locator(id), &query_id, &mut statements)? {
            return Err(ExecutionError::EntityNotFound { id }.into());
        }
        self.submit(WriteKind::Delete, &query_id, statements)
            .map_err(|e| storage_failure(&query_id, e))?;
        info!(%id, "entity deleted");
        Ok(id)
    }

    /// Deletes several entities in one transaction.
    ///
    /// Every id is validated before anything is read. Ids that do not exist
    /// are skipped; the result lists the ids actually removed.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if any id is malformed
    /// - storage errors, unchanged
    pub fn delete_many(&self, entity_type: &str, ids: &[String]) -> GraphResult<Vec<EntityId>> {
        let schema = self.schema(entity_type)?;
        let query_id = format!("Delete {}", schema.plural_pascal());
        let span = self.op_span("delete_many", &schema, &query_id);
        let _enter = span.enter();

        let ids = ids
            .iter()
            .map(|id| EntityId::parse(id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut removed = Vec::with_capacity(ids.len());
        let mut statements = Vec::new();
        for id in ids {
            if removed.contains(&id) {
                continue;
            }
            if self.plan_delete(&schema, &schema.locator(id), &query_id, &mut statements)? {
                removed.push(id);
            } else {
                debug!(%id, "not found, skipping");
            }
        }
        if statements.is_empty() {
            return Ok(removed);
        }
        self.submit(WriteKind::Delete, &query_id, statements)
            .map_err(|e| storage_failure(&query_id, e))?;
        info!(count = removed.len(), "entities deleted");
        Ok(removed)
    }

    /// Appends partition deletes for `locator` and, before it, for every
    /// entity it owns. Returns false if `locator` does not exist.
    fn plan_delete(
        &self,
        schema: &EntitySchema,
        locator: &Locator,
        query_id: &str,
        statements: &mut Vec<Statement>,
    ) -> GraphResult<bool> {
        let owned: Vec<&str> = schema.owned_fields().map(|f| f.name()).collect();
        let query = select_by_id_query(schema, &locator.id().to_string(), &owned)?;
        let Some(row) = self.read_by_id(query_id, query)?.into_iter().next() else {
            return Ok(false);
        };

        for name in owned {
            let children = row.get(name).map(Value::elements).into_iter().flatten();
            for child in children.filter_map(Value::as_reference) {
                let planned = statements.iter().any(|s| s.partition() == child);
                if planned {
                    continue;
                }
                let Some(child_schema) = self.registry.by_segment(child.entity_type_hint()) else {
                    debug!(%child, "owned value of unknown type, deleting partition only");
                    statements.push(delete_by_locator_query(child));
                    continue;
                };
                if !self.plan_delete(child_schema, child, query_id, statements)? {
                    debug!(%child, "owned entity already gone");
                }
            }
        }
        statements.push(delete_by_locator_query(locator));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::RiskgraphConfig;
    use crate::schema::SchemaRegistry;
    use crate::storage::InMemoryTripleStore;

    fn service() -> (EntityService, Arc<InMemoryTripleStore>) {
        let store = Arc::new(InMemoryTripleStore::new());
        let service = EntityService::new(
            Arc::new(SchemaRegistry::builtin().unwrap()),
            store.clone(),
            &RiskgraphConfig::default(),
        );
        (service, store)
    }

    #[test]
    fn test_delete_then_find_is_none() {
        let (svc, _) = service();
        let created = svc.create("Reference", &json!({ "name": "Foo" })).unwrap();
        let id = created.id().to_string();
        assert_eq!(svc.delete("Reference", &id).unwrap(), created.id());
        assert!(svc.find_by_id("Reference", &id).unwrap().is_none());

        let err = svc.delete("Reference", &id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_cascades_to_owned_entities() {
        let (svc, store) = service();
        let created = svc
            .create(
                "Reference",
                &json!({
                    "name": "Spec",
                    "hashes": [
                        { "algorithm": "SHA-256", "value": "abc" },
                        { "algorithm": "MD5", "value": "def" }
                    ]
                }),
            )
            .unwrap();
        assert_eq!(store.partition_count("riskgraph").unwrap(), 3);
        svc.delete("Reference", &created.id().to_string()).unwrap();
        assert_eq!(store.partition_count("riskgraph").unwrap(), 0);
    }

    #[test]
    fn test_delete_does_not_follow_plain_references() {
        let (svc, _) = service();
        let reference = svc.create("Reference", &json!({ "name": "Doc" })).unwrap();
        let ref_id = reference.id().to_string();
        let risk = svc
            .create("Risk", &json!({ "name": "Outage", "references": [ref_id] }))
            .unwrap();
        svc.delete("Risk", &risk.id().to_string()).unwrap();
        assert!(svc.find_by_id("Reference", &ref_id).unwrap().is_some());
    }

    #[test]
    fn test_delete_many_skips_missing() {
        let (svc, _) = service();
        let a = svc.create("Reference", &json!({ "name": "A" })).unwrap();
        let b = svc.create("Reference", &json!({ "name": "B" })).unwrap();
        let ids = vec![
            a.id().to_string(),
            EntityId::nil().to_string(),
            b.id().to_string(),
            a.id().to_string(),
        ];
        let removed = svc.delete_many("Reference", &ids).unwrap();
        assert_eq!(removed, vec![a.id(), b.id()]);
        assert!(svc.list("Reference", &Default::default()).unwrap().is_none());
    }

    #[test]
    fn test_delete_many_validates_every_id_first() {
        let (svc, _) = service();
        let a = svc.create("Reference", &json!({ "name": "A" })).unwrap();
        let ids = vec![a.id().to_string(), "bogus".to_string()];
        let err = svc.delete_many("Reference", &ids).unwrap_err();
        assert!(err.is_invalid_identifier());
        assert!(svc
            .find_by_id("Reference", &a.id().to_string())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_delete_many_of_nothing() {
        let (svc, _) = service();
        let removed = svc.delete_many("Reference", &[]).unwrap();
        assert!(removed.is_empty());
    }
}
