//! Edit-by-diff updates.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, GraphError, GraphResult, ValidationError};
use crate::id::{EntityId, Locator};
use crate::query::{select_by_id_query, update_query, Change, Term, Triple};
use crate::reducer::reduce;
use crate::schema::{
    json_elements, FieldDef, CREATED_FIELD, CREATED_PREDICATE, MODIFIED_FIELD,
    MODIFIED_PREDICATE, SYSTEM_FIELDS,
};
use crate::service::{
    reference_ids, storage_failure, EditInstruction, EditOperation, EditOutcome, EntityService,
    WriteKind,
};
use crate::storage::Row;
use crate::time::stamp_after;
use crate::value::Value;

/// Storage name of the type tag; refused like the system fields.
const OBJECT_TYPE_KEY: &str = "object_type";

/// One accepted instruction after inference.
struct Planned<'a> {
    field: &'a FieldDef,
    operation: EditOperation,
    /// Values in comparison form (references as id strings).
    values: Vec<Value>,
    /// What the field holds now, as stored.
    stored: Vec<Value>,
}

impl EntityService {
    /// Applies edit instructions to one entity.
    ///
    /// Each instruction's operation is inferred from the stored value (see
    /// [`infer_operation`]). When every instruction resolves to `skip`
    /// nothing is written and the entity is returned as it is. Otherwise all
    /// changes go out as one update that also bumps `modified` (and adds
    /// `created` if the entity never had it).
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if `id` is malformed
    /// - `ImmutableField` for `id`, the type tag, `created` or `modified`
    /// - `MissingField` if a required field would be left empty
    /// - `EntityNotFound` if the entity (or a referenced one) does not exist
    /// - `TypeMismatch` for references of the wrong type
    /// - storage errors, unchanged
    pub fn edit(
        &self,
        entity_type: &str,
        id: &str,
        instructions: &[EditInstruction],
    ) -> GraphResult<EditOutcome> {
        let schema = self.schema(entity_type)?;
        let query_id = format!("Edit {}", schema.name());
        let span = self.op_span("edit", &schema, &query_id);
        let _enter = span.enter();

        let entity_id = EntityId::parse(id)?;
        if let Some(bad) = instructions
            .iter()
            .find(|i| SYSTEM_FIELDS.contains(&i.key.as_str()) || i.key == OBJECT_TYPE_KEY)
        {
            return Err(ValidationError::ImmutableField {
                field: bad.key.clone(),
            }
            .into());
        }

        let query = select_by_id_query(&schema, id, &[])?;
        let row = self
            .read_by_id(&query_id, query)?
            .into_iter()
            .next()
            .ok_or(ExecutionError::EntityNotFound { id: entity_id })?;
        let locator = schema.locator(entity_id);

        let mut planned = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            let Some(field) = schema.get_field(&instruction.key) else {
                warn!(field = %instruction.key, "dropping edit of unmapped field");
                continue;
            };
            planned.push(self.plan_instruction(field, instruction, &row)?);
        }

        let mut resolved: Vec<EditInstruction> = planned
            .iter()
            .map(|p| EditInstruction {
                key: p.field.name().to_string(),
                value: p.values.iter().map(Value::to_json).collect(),
                operation: Some(p.operation),
            })
            .collect();

        if planned.iter().all(|p| p.operation == EditOperation::Skip) {
            debug!("every instruction resolved to skip");
            return Ok(EditOutcome {
                entity: reduce(&self.registry, &schema, row)?,
                instructions: resolved,
                changed: false,
            });
        }

        let mut changes = Vec::new();
        for plan in &planned {
            changes.extend(self.changes_for(&locator, plan)?);
        }

        let created = row.get(CREATED_FIELD).and_then(Value::as_timestamp);
        let previous = row.get(MODIFIED_FIELD).and_then(Value::as_timestamp);
        let stamp = stamp_after(self.clock.as_ref(), previous.max(created));
        let modified = if created.is_some() {
            stamp
        } else {
            stamp_after(self.clock.as_ref(), Some(stamp))
        };

        changes.push(Change::Clear {
            predicate: MODIFIED_PREDICATE.to_string(),
        });
        changes.push(timestamp_change(&locator, MODIFIED_PREDICATE, modified));
        resolved.push(timestamp_instruction(
            MODIFIED_FIELD,
            modified,
            if previous.is_some() {
                EditOperation::Replace
            } else {
                EditOperation::Add
            },
        ));
        if created.is_none() {
            changes.push(timestamp_change(&locator, CREATED_PREDICATE, stamp));
            resolved.push(timestamp_instruction(CREATED_FIELD, stamp, EditOperation::Add));
        }

        self.submit(WriteKind::Edit, &query_id, vec![update_query(&locator, changes)])
            .map_err(|e| storage_failure(&query_id, e))?;
        info!(%entity_id, "entity edited");

        let entity = self
            .find_by_id(schema.name(), id)?
            .ok_or_else(|| GraphError::internal(format!("{locator} not readable after edit")))?;
        Ok(EditOutcome {
            entity,
            instructions: resolved,
            changed: true,
        })
    }

    fn plan_instruction<'a>(
        &self,
        field: &'a FieldDef,
        instruction: &EditInstruction,
        row: &Row,
    ) -> GraphResult<Planned<'a>> {
        let stored = row.get(field.name()).cloned().map_or_else(Vec::new, Value::into_elements);
        let current: Vec<Value> = stored.iter().map(comparable).collect();

        let mut values: Vec<Value> = Vec::with_capacity(instruction.value.len());
        if field.kind().is_reference() {
            let elements: Vec<&serde_json::Value> = instruction.value.iter().collect();
            for id in reference_ids(field, &elements)? {
                values.push(Value::String(id.to_string()));
            }
        } else {
            for raw in &instruction.value {
                for element in json_elements(raw) {
                    let value = field.coerce_scalar(element, self.max_text_len)?;
                    if !value.is_blank() && !values.contains(&value) {
                        values.push(value);
                    }
                }
            }
        }
        if !field.is_many() && values.len() > 1 {
            return Err(ValidationError::invalid_value(
                field.name(),
                format!("expected a single value, got {}", values.len()),
            )
            .into());
        }

        let operation = infer_operation(instruction.operation, field.is_many(), &current, &values);
        match operation {
            EditOperation::Add if field.is_many() => values.retain(|v| !current.contains(v)),
            EditOperation::Remove if !values.is_empty() => values.retain(|v| current.contains(v)),
            _ => {}
        }

        if field.is_required() && operation == EditOperation::Remove {
            let left = if values.is_empty() {
                0
            } else {
                current.iter().filter(|v| !values.contains(v)).count()
            };
            if left == 0 {
                return Err(ValidationError::MissingField {
                    field: field.name().to_string(),
                }
                .into());
            }
        }

        Ok(Planned {
            field,
            operation,
            values,
            stored,
        })
    }

    /// Storage changes for one planned instruction. Reference values are
    /// resolved here, so only additions need the target to exist.
    fn changes_for(&self, locator: &Locator, plan: &Planned<'_>) -> GraphResult<Vec<Change>> {
        let predicate = plan.field.predicate_key();
        let add = |term: Term| Change::Add {
            triple: Triple::new(locator.clone(), predicate, term),
        };
        let terms = || -> GraphResult<Vec<Term>> {
            plan.values
                .iter()
                .map(|value| self.to_term(plan.field, value))
                .collect()
        };

        Ok(match plan.operation {
            EditOperation::Skip => Vec::new(),
            EditOperation::Add => terms()?.into_iter().map(add).collect(),
            EditOperation::Replace => {
                let mut changes = vec![Change::Clear {
                    predicate: predicate.to_string(),
                }];
                changes.extend(terms()?.into_iter().map(add));
                changes
            }
            EditOperation::Remove if plan.values.is_empty() => vec![Change::Clear {
                predicate: predicate.to_string(),
            }],
            EditOperation::Remove => plan
                .stored
                .iter()
                .filter(|stored| plan.values.contains(&comparable(stored)))
                .map(|stored| Change::Remove {
                    triple: Triple::new(locator.clone(), predicate, Term::from_value(stored)),
                })
                .collect(),
        })
    }

    fn to_term(&self, field: &FieldDef, value: &Value) -> GraphResult<Term> {
        if !field.kind().is_reference() {
            return Ok(Term::from_value(value));
        }
        let raw = value.as_str().unwrap_or_default();
        let id = EntityId::parse(raw)?;
        Ok(Term::Locator(self.resolve_reference(field, id)?))
    }
}

/// Decides what an instruction does given the current and new values.
///
/// `current` and `new` are in comparison form; order does not matter.
///
/// - `skip` always stays `skip`.
/// - `remove` with no values clears the field; with values it removes the
///   ones present. Either way it becomes `skip` when nothing would go.
/// - `add` on a list field adds the values not already present, or skips.
/// - Anything else is treated as "make the field hold exactly `new`":
///   `add` into an empty field, `remove` when `new` is empty, `skip` when
///   nothing differs, otherwise `replace`.
pub(crate) fn infer_operation(
    requested: Option<EditOperation>,
    many: bool,
    current: &[Value],
    new: &[Value],
) -> EditOperation {
    match requested {
        Some(EditOperation::Skip) => EditOperation::Skip,
        Some(EditOperation::Remove) => {
            let effective = if new.is_empty() {
                !current.is_empty()
            } else {
                new.iter().any(|v| current.contains(v))
            };
            if effective {
                EditOperation::Remove
            } else {
                EditOperation::Skip
            }
        }
        Some(EditOperation::Add) if many => {
            if new.iter().all(|v| current.contains(v)) {
                EditOperation::Skip
            } else {
                EditOperation::Add
            }
        }
        _ => {
            if new.is_empty() {
                if current.is_empty() {
                    EditOperation::Skip
                } else {
                    EditOperation::Remove
                }
            } else if current.is_empty() {
                EditOperation::Add
            } else if same_set(current, new) {
                EditOperation::Skip
            } else {
                EditOperation::Replace
            }
        }
    }
}

fn same_set(a: &[Value], b: &[Value]) -> bool {
    a.iter().all(|v| b.contains(v)) && b.iter().all(|v| a.contains(v))
}

/// References compare by id; everything else as stored.
fn comparable(value: &Value) -> Value {
    match value {
        Value::Reference(locator) => Value::String(locator.id().to_string()),
        other => other.clone(),
    }
}

fn timestamp_change(locator: &Locator, predicate: &str, at: DateTime<Utc>) -> Change {
    Change::Add {
        triple: Triple::new(locator.clone(), predicate, Term::Literal(Value::Timestamp(at))),
    }
}

fn timestamp_instruction(
    key: &str,
    at: DateTime<Utc>,
    operation: EditOperation,
) -> EditInstruction {
    EditInstruction {
        key: key.to_string(),
        value: vec![serde_json::Value::String(
            at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )],
        operation: Some(operation),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;
    use crate::config::RiskgraphConfig;
    use crate::schema::SchemaRegistry;
    use crate::storage::InMemoryTripleStore;
    use crate::time::ManualClock;

    fn strings(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| Value::from(*s)).collect()
    }

    fn service() -> (EntityService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let service = EntityService::new(
            Arc::new(SchemaRegistry::builtin().unwrap()),
            Arc::new(InMemoryTripleStore::new()),
            &RiskgraphConfig::default(),
        )
        .with_clock(clock.clone());
        (service, clock)
    }

    #[test]
    fn test_infer_inferred_operations() {
        let none = None;
        assert_eq!(infer_operation(none, false, &[], &strings(&["a"])), EditOperation::Add);
        assert_eq!(
            infer_operation(none, false, &strings(&["a"]), &strings(&["b"])),
            EditOperation::Replace
        );
        assert_eq!(
            infer_operation(none, false, &strings(&["a"]), &strings(&["a"])),
            EditOperation::Skip
        );
        assert_eq!(infer_operation(none, false, &strings(&["a"]), &[]), EditOperation::Remove);
        assert_eq!(infer_operation(none, false, &[], &[]), EditOperation::Skip);
        assert_eq!(
            infer_operation(none, true, &strings(&["a", "b"]), &strings(&["b", "a"])),
            EditOperation::Skip
        );
    }

    #[test]
    fn test_infer_explicit_operations() {
        let current = strings(&["a", "b"]);
        let add = Some(EditOperation::Add);
        let remove = Some(EditOperation::Remove);
        assert_eq!(infer_operation(add, true, &current, &strings(&["a"])), EditOperation::Skip);
        assert_eq!(infer_operation(add, true, &current, &strings(&["c"])), EditOperation::Add);
        assert_eq!(infer_operation(add, true, &current, &[]), EditOperation::Skip);
        assert_eq!(
            infer_operation(add, false, &strings(&["a"]), &strings(&["c"])),
            EditOperation::Replace
        );
        assert_eq!(infer_operation(remove, true, &current, &strings(&["c"])), EditOperation::Skip);
        assert_eq!(
            infer_operation(remove, true, &current, &strings(&["a"])),
            EditOperation::Remove
        );
        assert_eq!(infer_operation(remove, true, &current, &[]), EditOperation::Remove);
        assert_eq!(infer_operation(remove, true, &[], &[]), EditOperation::Skip);
        assert_eq!(
            infer_operation(Some(EditOperation::Skip), true, &[], &strings(&["x"])),
            EditOperation::Skip
        );
    }

    #[test]
    fn test_edit_replace_bumps_modified() {
        let (svc, clock) = service();
        let created = svc
            .create("Reference", &json!({ "name": "Foo", "url": "http://x" }))
            .unwrap();
        clock.advance(Duration::seconds(1));

        let outcome = svc
            .edit(
                "Reference",
                &created.id().to_string(),
                &[EditInstruction::new("name", ["Bar"])],
            )
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.operation_for("name"), Some(EditOperation::Replace));
        assert_eq!(outcome.operation_for("modified"), Some(EditOperation::Replace));
        assert_eq!(outcome.entity.get("name"), Some(&Value::from("Bar")));
        assert_eq!(outcome.entity.id(), created.id());
        assert_eq!(outcome.entity.created(), created.created());
        assert!(outcome.entity.modified() > created.modified());
    }

    #[test]
    fn test_edit_without_clock_movement_still_increases_modified() {
        let (svc, _) = service();
        let created = svc.create("Reference", &json!({ "name": "Foo" })).unwrap();
        let id = created.id().to_string();

        let first = svc
            .edit("Reference", &id, &[EditInstruction::new("url", ["http://a"])])
            .unwrap();
        let second = svc
            .edit("Reference", &id, &[EditInstruction::new("url", ["http://b"])])
            .unwrap();
        assert!(first.entity.modified() > created.modified());
        assert!(second.entity.modified() > first.entity.modified());
    }

    #[test]
    fn test_repeated_edit_is_skip() {
        let (svc, clock) = service();
        let created = svc.create("Reference", &json!({ "name": "Foo" })).unwrap();
        let id = created.id().to_string();
        let edit = [EditInstruction::new("description", ["text"])];

        let first = svc.edit("Reference", &id, &edit).unwrap();
        clock.advance(Duration::seconds(5));
        let second = svc.edit("Reference", &id, &edit).unwrap();
        assert!(!second.changed);
        assert_eq!(second.operation_for("description"), Some(EditOperation::Skip));
        assert!(second.operation_for("modified").is_none());
        assert_eq!(second.entity.modified(), first.entity.modified());
    }

    #[test]
    fn test_edit_rejects_system_fields() {
        let (svc, _) = service();
        let created = svc.create("Reference", &json!({ "name": "Foo" })).unwrap();
        let id = created.id().to_string();
        for key in ["id", "created", "modified", "object_type"] {
            let err = svc
                .edit("Reference", &id, &[EditInstruction::new(key, ["x"])])
                .unwrap_err();
            assert!(matches!(
                err,
                GraphError::Validation(ValidationError::ImmutableField { .. })
            ));
        }
    }

    #[test]
    fn test_edit_missing_entity() {
        let (svc, _) = service();
        let err = svc
            .edit(
                "Reference",
                &EntityId::nil().to_string(),
                &[EditInstruction::new("name", ["Bar"])],
            )
            .unwrap_err();
        assert!(err.is_not_found());
        let err = svc.edit("Reference", "nope", &[]).unwrap_err();
        assert!(err.is_invalid_identifier());
    }

    #[test]
    fn test_edit_list_add_and_remove() {
        let (svc, _) = service();
        let created = svc
            .create("Reference", &json!({ "name": "Foo", "labels": ["a", "b"] }))
            .unwrap();
        let id = created.id().to_string();

        let outcome = svc
            .edit(
                "Reference",
                &id,
                &[EditInstruction::new("labels", ["b", "c"]).with_operation(EditOperation::Add)],
            )
            .unwrap();
        assert_eq!(outcome.operation_for("labels"), Some(EditOperation::Add));
        assert_eq!(outcome.instructions[0].value, vec![json!("c")]);
        assert_eq!(outcome.entity.get("labels").unwrap().elements().count(), 3);

        let outcome = svc
            .edit(
                "Reference",
                &id,
                &[EditInstruction::new("labels", ["a"]).with_operation(EditOperation::Remove)],
            )
            .unwrap();
        assert_eq!(
            outcome.entity.get("labels"),
            Some(&Value::List(strings(&["b", "c"])))
        );
    }

    #[test]
    fn test_edit_cannot_empty_required_field() {
        let (svc, _) = service();
        let created = svc.create("Reference", &json!({ "name": "Foo" })).unwrap();
        let err = svc
            .edit(
                "Reference",
                &created.id().to_string(),
                &[EditInstruction::new("name", Vec::<String>::new())],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_edit_drops_unmapped_fields() {
        let (svc, _) = service();
        let created = svc.create("Reference", &json!({ "name": "Foo" })).unwrap();
        let outcome = svc
            .edit(
                "Reference",
                &created.id().to_string(),
                &[EditInstruction::new("nonsense", ["x"])],
            )
            .unwrap();
        assert!(!outcome.changed);
        assert!(outcome.instructions.is_empty());
    }
}
