//! Schema descriptors for entity types.
//!
//! Each entity type is described once, as data: its fields (the predicate
//! map), which of them carry identity, derived display fields and the names
//! it is exposed under. Every generic operation in the crate is driven by
//! these descriptors.

mod catalog;
mod field;
mod registry;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{EntityId, Locator};
use crate::query::Projection;

pub use catalog::builtin_schemas;
pub use field::{Cardinality, FieldDef, FieldKind, PREDICATE_PREFIX};
pub use registry::SchemaRegistry;

pub(crate) use field::{json_elements, json_type_name};

/// Name of the identifier field.
pub const ID_FIELD: &str = "id";
/// Name of the type discriminator field.
pub const TYPE_FIELD: &str = "entity_type";
/// Name of the creation timestamp field.
pub const CREATED_FIELD: &str = "created";
/// Name of the last-modification timestamp field.
pub const MODIFIED_FIELD: &str = "modified";

/// Predicate holding the identifier literal.
pub const ID_PREDICATE: &str = "urn:riskgraph:predicate:id";
/// Predicate holding the type discriminator literal.
pub const TYPE_PREDICATE: &str = "urn:riskgraph:predicate:object_type";
/// Predicate holding the creation timestamp.
pub const CREATED_PREDICATE: &str = "urn:riskgraph:predicate:created";
/// Predicate holding the modification timestamp.
pub const MODIFIED_PREDICATE: &str = "urn:riskgraph:predicate:modified";

/// Fields every entity carries and no caller may edit.
pub const SYSTEM_FIELDS: [&str; 4] = [ID_FIELD, TYPE_FIELD, CREATED_FIELD, MODIFIED_FIELD];

/// A display field computed from other fields.
///
/// Only emitted when every part is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedField {
    pub name: String,
    pub parts: Vec<String>,
    pub separator: String,
}

impl DerivedField {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, parts: I, separator: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parts: parts.into_iter().map(Into::into).collect(),
            separator: separator.into(),
        }
    }
}

/// Descriptor of one entity type.
///
/// # Examples
///
/// ```
/// use riskgraph::schema::{EntitySchema, FieldDef};
///
/// let schema = EntitySchema::new("Control")
///     .field(FieldDef::text("control_id").required().identity())
///     .field(FieldDef::text("title"));
///
/// assert_eq!(schema.segment(), "control");
/// assert_eq!(schema.plural(), "controls");
/// assert_eq!(schema.identity_fields().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    name: String,
    segment: String,
    singular: String,
    plural: String,
    fields: Vec<FieldDef>,
    #[serde(default)]
    derived: Vec<DerivedField>,
}

impl EntitySchema {
    /// Creates a schema; storage segment and API names derive from `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let singular = lower_first(&name);
        Self {
            segment: kebab_case(&name),
            plural: pluralize(&singular),
            singular,
            name,
            fields: Vec::new(),
            derived: Vec::new(),
        }
    }

    /// Adds a field to the predicate map.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a derived display field.
    #[must_use]
    pub fn derived(mut self, derived: DerivedField) -> Self {
        self.derived.push(derived);
        self
    }

    /// Overrides the plural API name.
    #[must_use]
    pub fn plural_name(mut self, plural: impl Into<String>) -> Self {
        self.plural = plural.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kebab-case storage segment used in locators and type tags.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Query field name for a single entity (`taxonomyEntry`).
    #[must_use]
    pub fn singular(&self) -> &str {
        &self.singular
    }

    /// Query field name for a list (`taxonomyEntries`).
    #[must_use]
    pub fn plural(&self) -> &str {
        &self.plural
    }

    /// Capitalised plural used by batch mutations (`TaxonomyEntries`).
    #[must_use]
    pub fn plural_pascal(&self) -> String {
        upper_first(&self.plural)
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[must_use]
    pub fn derived_fields(&self) -> &[DerivedField] {
        &self.derived
    }

    /// Looks up a declared field.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Identity-bearing fields in canonical order.
    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_identity())
    }

    /// Owned reference fields (cascade on delete).
    pub fn owned_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_owned())
    }

    /// Locator of the entity `id` of this type.
    #[must_use]
    pub fn locator(&self, id: EntityId) -> Locator {
        Locator::new(&self.segment, id)
    }

    /// Returns true if `name` is a system or declared field.
    #[must_use]
    pub fn is_mapped(&self, name: &str) -> bool {
        SYSTEM_FIELDS.contains(&name) || self.get_field(name).is_some()
    }

    /// Read patterns for system fields.
    ///
    /// `id` and the type tag are mandatory; timestamps are optional.
    #[must_use]
    pub fn system_projections() -> Vec<Projection> {
        vec![
            Projection::required(ID_FIELD, ID_PREDICATE),
            Projection::required(TYPE_FIELD, TYPE_PREDICATE),
            Projection::optional(CREATED_FIELD, CREATED_PREDICATE, Cardinality::One),
            Projection::optional(MODIFIED_FIELD, MODIFIED_PREDICATE, Cardinality::One),
        ]
    }

    /// Read pattern for one field name (system or declared).
    #[must_use]
    pub fn projection_for(&self, name: &str) -> Option<Projection> {
        if let Some(field) = self.get_field(name) {
            return Some(field.optional());
        }
        Self::system_projections()
            .into_iter()
            .find(|p| p.variable() == name)
    }

    /// Checks the descriptor for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidArgument` describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid_argument("schema", "name is empty"));
        }
        if self.identity_fields().next().is_none() {
            return Err(ValidationError::invalid_argument(
                "schema",
                format!("{} declares no identity field", self.name),
            ));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if SYSTEM_FIELDS.contains(&field.name()) {
                return Err(ValidationError::invalid_argument(
                    "schema",
                    format!("{}.{} shadows a system field", self.name, field.name()),
                ));
            }
            if self.fields[..i].iter().any(|f| f.name() == field.name()) {
                return Err(ValidationError::invalid_argument(
                    "schema",
                    format!("{}.{} is declared twice", self.name, field.name()),
                ));
            }
            if field.is_identity() && field.kind().is_reference() {
                return Err(ValidationError::invalid_argument(
                    "schema",
                    format!(
                        "{}.{}: reference fields cannot carry identity",
                        self.name,
                        field.name()
                    ),
                ));
            }
            if field.is_owned() && !field.kind().is_reference() {
                return Err(ValidationError::invalid_argument(
                    "schema",
                    format!("{}.{}: only reference fields can be owned", self.name, field.name()),
                ));
            }
            if field.kind().is_reference() && field.kind().targets().is_empty() {
                return Err(ValidationError::invalid_argument(
                    "schema",
                    format!("{}.{}: reference field without targets", self.name, field.name()),
                ));
            }
        }
        for derived in &self.derived {
            if let Some(part) = derived.parts.iter().find(|p| !self.is_mapped(p)) {
                return Err(ValidationError::invalid_argument(
                    "schema",
                    format!("{}.{} uses unknown field {part}", self.name, derived.name),
                ));
            }
        }
        Ok(())
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |c| {
        c.to_lowercase().chain(chars).collect()
    })
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |c| {
        c.to_uppercase().chain(chars).collect()
    })
}

fn kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else if c == '_' || c == ' ' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

fn pluralize(s: &str) -> String {
    if let Some(stem) = s.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if s.ends_with('s') || s.ends_with('x') || s.ends_with("sh") || s.ends_with("ch") {
        return format!("{s}es");
    }
    format!("{s}s")
}
