//! Field descriptors: one predicate map entry per entity field.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::Locator;
use crate::query::{Projection, Term, Triple};
use crate::time::parse_timestamp;
use crate::value::Value;

/// Prefix for predicates that are not given explicitly.
pub const PREDICATE_PREFIX: &str = "urn:riskgraph:predicate:";

/// Storage type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    /// Points at other entities; `targets` lists the accepted entity types.
    Reference {
        targets: Vec<String>,
    },
}

impl FieldKind {
    /// Returns true for reference-valued fields.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Reference { .. })
    }

    /// Entity types a reference field accepts (empty for scalars).
    #[must_use]
    pub fn targets(&self) -> &[String] {
        match self {
            Self::Reference { targets } => targets,
            _ => &[],
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Reference { targets } => write!(f, "reference({})", targets.join("|")),
        }
    }
}

/// How many values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

/// One entry of an entity type's predicate map.
///
/// # Examples
///
/// ```
/// use riskgraph::schema::{Cardinality, FieldDef};
///
/// let url = FieldDef::text("url").identity();
/// assert!(url.is_identity());
///
/// let refs = FieldDef::reference("references", ["Reference"]).many();
/// assert_eq!(refs.cardinality(), Cardinality::Many);
/// assert!(refs.kind().is_reference());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    name: String,
    predicate: String,
    kind: FieldKind,
    #[serde(default)]
    cardinality: Cardinality,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    identity: bool,
    #[serde(default)]
    owned: bool,
}

impl FieldDef {
    /// Creates a field with the default predicate for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            predicate: format!("{PREDICATE_PREFIX}{name}"),
            name,
            kind,
            cardinality: Cardinality::One,
            required: false,
            identity: false,
            owned: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    /// A reference field accepting any of `targets`.
    pub fn reference<I, S>(name: impl Into<String>, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Reference {
                targets: targets.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// Overrides the storage predicate.
    #[must_use]
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = predicate.into();
        self
    }

    /// Marks the field as list-valued.
    #[must_use]
    pub const fn many(mut self) -> Self {
        self.cardinality = Cardinality::Many;
        self
    }

    /// Marks the field as required on create.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Marks the field as part of the identifier projection.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Marks a reference field whose targets are owned by the entity:
    /// created from nested input and deleted with it.
    #[must_use]
    pub const fn owned(mut self) -> Self {
        self.owned = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn predicate_key(&self) -> &str {
        &self.predicate
    }

    #[must_use]
    pub const fn kind(&self) -> &FieldKind {
        &self.kind
    }

    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    #[must_use]
    pub const fn is_many(&self) -> bool {
        matches!(self.cardinality, Cardinality::Many)
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.identity
    }

    #[must_use]
    pub const fn is_owned(&self) -> bool {
        self.owned
    }

    /// Storage fragments for `value` on the entity at `locator`.
    ///
    /// List values expand to one triple per element; null produces nothing.
    #[must_use]
    pub fn binding(&self, locator: &Locator, value: &Value) -> Vec<Triple> {
        value
            .elements()
            .map(|element| Triple::new(locator.clone(), &self.predicate, Term::from_value(element)))
            .collect()
    }

    /// Read-side pattern for this field; absent values do not drop the row.
    #[must_use]
    pub fn optional(&self) -> Projection {
        Projection::optional(&self.name, &self.predicate, self.cardinality)
    }

    /// Converts one JSON input element into a typed scalar.
    ///
    /// Reference fields are not handled here: their inputs are identifiers
    /// that the service resolves against the store.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFieldValue` when the JSON shape does
    /// not fit the field kind and `FieldTooLong` for oversized text.
    pub fn coerce_scalar(
        &self,
        input: &serde_json::Value,
        max_text_len: usize,
    ) -> Result<Value, ValidationError> {
        use serde_json::Value as Json;

        let value = match (&self.kind, input) {
            (_, Json::Null) => Value::Null,
            (FieldKind::Text, Json::String(s)) => {
                let trimmed = s.trim();
                if trimmed.len() > max_text_len {
                    return Err(ValidationError::FieldTooLong {
                        field: self.name.clone(),
                        max_length: max_text_len,
                    });
                }
                Value::String(trimmed.to_string())
            }
            (FieldKind::Integer, Json::Number(n)) => n
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| ValidationError::invalid_value(&self.name, "expected an integer"))?,
            (FieldKind::Float, Json::Number(n)) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| ValidationError::invalid_value(&self.name, "expected a number"))?,
            (FieldKind::Boolean, Json::Bool(b)) => Value::Bool(*b),
            (FieldKind::Timestamp, Json::String(s)) => {
                if s.trim().is_empty() {
                    Value::Null
                } else {
                    Value::Timestamp(parse_timestamp(&self.name, s)?)
                }
            }
            (FieldKind::Reference { .. }, _) => {
                return Err(ValidationError::invalid_value(
                    &self.name,
                    "reference fields take entity identifiers",
                ))
            }
            (kind, other) => {
                return Err(ValidationError::invalid_value(
                    &self.name,
                    format!("expected {kind}, got {}", json_type_name(other)),
                ))
            }
        };
        Ok(value)
    }

    /// Converts a JSON input (single element or array) into a field value.
    ///
    /// Single-valued fields accept a one-element array for wire
    /// compatibility with edit instructions.
    ///
    /// # Errors
    ///
    /// Same as [`Self::coerce_scalar`], plus `InvalidFieldValue` when several
    /// values are given for a single-valued field.
    pub fn coerce(
        &self,
        input: &serde_json::Value,
        max_text_len: usize,
    ) -> Result<Value, ValidationError> {
        let elements = json_elements(input);
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.coerce_scalar(element, max_text_len)?;
            if !value.is_blank() {
                values.push(value);
            }
        }
        self.collapse(values)
    }

    /// Folds typed elements into this field's shape.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldValue` when a single-valued field gets more than
    /// one element.
    pub fn collapse(&self, mut values: Vec<Value>) -> Result<Value, ValidationError> {
        if self.is_many() {
            return Ok(if values.is_empty() {
                Value::Null
            } else {
                Value::List(values)
            });
        }
        match values.len() {
            0 => Ok(Value::Null),
            1 => Ok(values.remove(0)),
            n => Err(ValidationError::invalid_value(
                &self.name,
                format!("expected a single value, got {n}"),
            )),
        }
    }
}

/// Splits a JSON input into its elements (arrays flatten one level).
pub(crate) fn json_elements(input: &serde_json::Value) -> Vec<&serde_json::Value> {
    match input {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    }
}

pub(crate) const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
