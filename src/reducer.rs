//! Result reduction: storage rows to API-shaped entities.
//!
//! Rows come back from the engine flat, with references as locators and
//! absent optional fields simply missing. [`reduce`] turns one row into an
//! [`Entity`]: references become plain ids, blanks are dropped and derived
//! display fields are computed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};

use crate::error::{GraphError, GraphResult};
use crate::id::{EntityId, Locator};
use crate::schema::{
    EntitySchema, SchemaRegistry, CREATED_FIELD, ID_FIELD, MODIFIED_FIELD, TYPE_FIELD,
};
use crate::storage::{Row, ROW_LOCATOR};
use crate::value::Value;

/// An entity as returned to callers.
///
/// Always carries `id` and `entity_type`; `created` and `modified` are
/// present for anything written through the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    locator: Locator,
    entity_type: String,
    fields: BTreeMap<String, Value>,
}

impl Entity {
    pub(crate) fn new(
        locator: Locator,
        entity_type: impl Into<String>,
        fields: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            locator,
            entity_type: entity_type.into(),
            fields,
        }
    }

    /// Storage address; also used as the pagination cursor.
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.locator.id()
    }

    /// Schema name of this entity (`TaxonomyEntry`).
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.get(CREATED_FIELD).and_then(Value::as_timestamp)
    }

    #[must_use]
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.get(MODIFIED_FIELD).and_then(Value::as_timestamp)
    }

    /// All present fields, system fields included.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Plain JSON object rendering.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.fields.iter().map(|(k, v)| (k, v.to_json())))
    }
}

/// Reference locators become bare ids on the way out.
fn outward(value: Value) -> Value {
    match value {
        Value::Reference(locator) => Value::String(locator.id().to_string()),
        Value::List(items) => Value::List(items.into_iter().map(outward).collect()),
        other => other,
    }
}

fn resolve_type(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    tag: Option<&Value>,
    locator: &Locator,
) -> String {
    let segment = tag
        .and_then(Value::as_str)
        .unwrap_or_else(|| locator.entity_type_hint());
    if segment == schema.segment() {
        return schema.name().to_string();
    }
    registry
        .by_segment(segment)
        .map_or_else(|| schema.name().to_string(), |s| s.name().to_string())
}

fn derive_fields(schema: &EntitySchema, fields: &mut BTreeMap<String, Value>) {
    for derived in schema.derived_fields() {
        let parts: Option<Vec<String>> = derived
            .parts
            .iter()
            .map(|p| fields.get(p).filter(|v| !v.is_list()).and_then(Value::as_text))
            .collect();
        if let Some(parts) = parts {
            fields.insert(derived.name.clone(), Value::String(parts.join(&derived.separator)));
        }
    }
}

/// Normalizes one storage row into an [`Entity`].
///
/// Unmapped columns are ignored. When the row carries no type tag the type
/// is inferred from the locator naming convention.
///
/// # Errors
///
/// Returns `GraphError::Internal` if the row lacks its locator column.
pub fn reduce(
    registry: &SchemaRegistry,
    schema: &EntitySchema,
    mut row: Row,
) -> GraphResult<Entity> {
    let locator = match row.remove(ROW_LOCATOR) {
        Some(Value::Reference(locator)) => locator,
        _ => return Err(GraphError::internal("result row without locator")),
    };
    let entity_type = resolve_type(registry, schema, row.get(TYPE_FIELD), &locator);

    let mut fields: BTreeMap<String, Value> = row
        .into_iter()
        .filter(|(k, v)| k != TYPE_FIELD && !v.is_blank() && schema.is_mapped(k))
        .map(|(k, v)| (k, outward(v)))
        .collect();
    fields
        .entry(ID_FIELD.to_string())
        .or_insert_with(|| Value::String(locator.id().to_string()));
    fields.insert(TYPE_FIELD.to_string(), Value::String(entity_type.clone()));
    derive_fields(schema, &mut fields);

    Ok(Entity {
        locator,
        entity_type,
        fields,
    })
}
