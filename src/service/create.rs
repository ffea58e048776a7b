//! Entity creation.

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ExecutionError, GraphError, GraphResult, ValidationError};
use crate::id::{EntityId, Locator};
use crate::query::{attach_query, insert_query, PropertyBag, Statement};
use crate::reducer::Entity;
use crate::schema::{
    json_elements, json_type_name, EntitySchema, FieldDef, CREATED_FIELD, MODIFIED_FIELD,
    SYSTEM_FIELDS,
};
use crate::service::{reference_ids, storage_failure, EntityService, WriteKind};
use crate::storage::StorageError;
use crate::value::Value;

impl EntityService {
    /// Creates an entity from a JSON input object.
    ///
    /// Owned reference fields take nested input objects, which are created
    /// in the same transaction; other reference fields take ids of existing
    /// entities. Unmapped keys are dropped.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `input` is not an object
    /// - `ImmutableField` if `input` sets a system field
    /// - `MissingField`, `FieldTooLong`, `InvalidFieldValue` for bad values
    /// - `DuplicateEntity` if an entity with the same identity exists
    /// - `EntityNotFound` / `TypeMismatch` for unresolvable references
    /// - storage errors, unchanged
    pub fn create(&self, entity_type: &str, input: &Json) -> GraphResult<Entity> {
        let schema = self.schema(entity_type)?;
        let query_id = format!("Create {}", schema.name());
        let span = self.op_span("create", &schema, &query_id);
        let _enter = span.enter();

        let now = self.now();
        let mut statements = Vec::new();
        let root = self.plan_insert(&schema, input, &self.namespace, now, &mut statements)?;

        self.submit(WriteKind::Create, &query_id, statements)
            .map_err(|e| match e {
                StorageError::DuplicateKey(key) => self.duplicate_key(&query_id, key),
                other => storage_failure(&query_id, other),
            })?;
        info!(id = %root.id(), "entity created");

        self.find_by_id(schema.name(), &root.id().to_string())?
            .ok_or_else(|| GraphError::internal(format!("{root} not readable after create")))
    }

    /// Appends the statements creating one entity (nested owned entities
    /// first) and returns its locator.
    fn plan_insert(
        &self,
        schema: &EntitySchema,
        input: &Json,
        namespace: &Uuid,
        now: DateTime<Utc>,
        statements: &mut Vec<Statement>,
    ) -> GraphResult<Locator> {
        let Json::Object(object) = input else {
            return Err(ValidationError::invalid_argument(
                "input",
                format!("expected an object, got {}", json_type_name(input)),
            )
            .into());
        };

        let mut bag = PropertyBag::new();
        let mut links: Vec<(&FieldDef, Vec<EntityId>)> = Vec::new();
        let mut nested: Vec<(&FieldDef, Vec<&Json>)> = Vec::new();
        for (key, raw) in object {
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                return Err(ValidationError::ImmutableField { field: key.clone() }.into());
            }
            let Some(field) = schema.get_field(key) else {
                debug!(field = %key, "dropping unmapped input field");
                continue;
            };
            let elements = json_elements(raw);
            if field.is_owned() {
                let objects = nested_objects(field, elements)?;
                if !objects.is_empty() {
                    nested.push((field, objects));
                }
            } else if field.kind().is_reference() {
                let ids = reference_ids(field, &elements)?;
                if !ids.is_empty() {
                    links.push((field, ids));
                }
            } else {
                let value = field.coerce(raw, self.max_text_len)?;
                if !value.is_blank() {
                    bag.insert(key.clone(), value);
                }
            }
        }

        for field in schema.fields().iter().filter(|f| f.is_required()) {
            let present = bag.contains_key(field.name())
                || links.iter().any(|(f, _)| f.name() == field.name())
                || nested.iter().any(|(f, _)| f.name() == field.name());
            if !present {
                return Err(ValidationError::MissingField {
                    field: field.name().to_string(),
                }
                .into());
            }
        }
        bag.insert(CREATED_FIELD.to_string(), Value::Timestamp(now));
        bag.insert(MODIFIED_FIELD.to_string(), Value::Timestamp(now));

        let insert = insert_query(schema, namespace, &bag)?;
        let already_planned = statements.iter().any(
            |s| matches!(s, Statement::Insert { partition, .. } if *partition == insert.locator),
        );
        if already_planned {
            return Ok(insert.locator);
        }
        if self.exists(schema, insert.id)? {
            return Err(ExecutionError::DuplicateEntity {
                entity_type: schema.name().to_string(),
                id: insert.id,
            }
            .into());
        }

        let owner_id = insert.id.to_string();
        let mut attachments = Vec::with_capacity(nested.len() + links.len());
        for (field, objects) in nested {
            let child = self.owned_target(field)?;
            let mut locators = Vec::with_capacity(objects.len());
            for object in objects {
                let locator =
                    self.plan_insert(&child, object, insert.id.as_uuid(), now, statements)?;
                if !locators.contains(&locator) {
                    locators.push(locator);
                }
            }
            attachments.push(attach_query(schema, &owner_id, field.name(), &locators)?);
        }
        for (field, ids) in links {
            let locators = ids
                .into_iter()
                .map(|id| self.resolve_reference(field, id))
                .collect::<GraphResult<Vec<_>>>()?;
            attachments.push(attach_query(schema, &owner_id, field.name(), &locators)?);
        }

        statements.push(insert.statement);
        statements.extend(attachments);
        Ok(insert.locator)
    }

    fn owned_target(&self, field: &FieldDef) -> GraphResult<std::sync::Arc<EntitySchema>> {
        let target = field
            .kind()
            .targets()
            .first()
            .ok_or_else(|| {
                GraphError::internal(format!("owned field {} has no target", field.name()))
            })?;
        self.schema(target)
    }

    /// The store refused an insert because the partition exists: a
    /// concurrent create won the race.
    fn duplicate_key(&self, query_id: &str, key: String) -> GraphError {
        match Locator::parse(&key) {
            Ok(locator) => {
                let entity_type = self
                    .registry
                    .by_segment(locator.entity_type_hint())
                    .map_or_else(
                        || locator.entity_type_hint().to_string(),
                        |s| s.name().to_string(),
                    );
                ExecutionError::DuplicateEntity {
                    entity_type,
                    id: locator.id(),
                }
                .into()
            }
            Err(_) => storage_failure(query_id, StorageError::DuplicateKey(key)),
        }
    }
}

fn nested_objects<'a>(
    field: &FieldDef,
    elements: Vec<&'a Json>,
) -> Result<Vec<&'a Json>, ValidationError> {
    let objects: Vec<&Json> = elements.into_iter().filter(|e| !e.is_null()).collect();
    if let Some(bad) = objects.iter().find(|e| !e.is_object()) {
        return Err(ValidationError::invalid_value(
            field.name(),
            format!("expected nested objects, got {}", json_type_name(bad)),
        ));
    }
    if !field.is_many() && objects.len() > 1 {
        return Err(ValidationError::invalid_value(
            field.name(),
            format!("expected a single value, got {}", objects.len()),
        ));
    }
    Ok(objects)
}
