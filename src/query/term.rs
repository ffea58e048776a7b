//! Typed statement objects.
//!
//! Statements carry values as typed terms; nothing is spliced into query
//! text. Storage engines execute these objects directly.

use serde::{Deserialize, Serialize};

use crate::id::Locator;
use crate::schema::Cardinality;
use crate::value::Value;

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "term", content = "value", rename_all = "snake_case")]
pub enum Term {
    /// Another entity's storage address.
    Locator(Locator),
    /// A typed literal.
    Literal(Value),
}

impl Term {
    /// Encodes a scalar value; references become locator terms.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Reference(locator) => Self::Locator(locator.clone()),
            other => Self::Literal(other.clone()),
        }
    }

    /// Decodes back into a value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Locator(locator) => Value::Reference(locator.clone()),
            Self::Literal(value) => value.clone(),
        }
    }

    #[must_use]
    pub const fn as_locator(&self) -> Option<&Locator> {
        match self {
            Self::Locator(locator) => Some(locator),
            Self::Literal(_) => None,
        }
    }
}

/// One subject / predicate / object fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    subject: Locator,
    predicate: String,
    object: Term,
}

impl Triple {
    #[must_use]
    pub fn new(subject: Locator, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }

    #[must_use]
    pub const fn subject(&self) -> &Locator {
        &self.subject
    }

    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    #[must_use]
    pub const fn object(&self) -> &Term {
        &self.object
    }
}

/// A variable bound by a read query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    variable: String,
    predicate: String,
    cardinality: Cardinality,
    optional: bool,
}

impl Projection {
    /// A pattern every returned row must satisfy.
    #[must_use]
    pub fn required(variable: impl Into<String>, predicate: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            predicate: predicate.into(),
            cardinality: Cardinality::One,
            optional: false,
        }
    }

    /// A pattern that binds when present and is left out otherwise.
    #[must_use]
    pub fn optional(
        variable: impl Into<String>,
        predicate: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            variable: variable.into(),
            predicate: predicate.into(),
            cardinality,
            optional: true,
        }
    }

    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variable
    }

    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Which partitions a read query visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    /// Exactly one entity.
    ById { locator: Locator },
    /// Every entity of the query's type.
    All,
    /// Entities referenced by `predicate` on the `parent` entity.
    Within { parent: Locator, predicate: String },
}

/// A read query over entities of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub(crate) object_type: String,
    pub(crate) scope: Scope,
    pub(crate) projections: Vec<Projection>,
}

impl SelectQuery {
    /// Type tag the visited partitions must carry.
    #[must_use]
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    /// Returns true if `variable` is bound by this query.
    #[must_use]
    pub fn binds(&self, variable: &str) -> bool {
        self.projections.iter().any(|p| p.variable() == variable)
    }
}

/// One step of an in-place partition update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    /// Drop every value of `predicate`.
    Clear { predicate: String },
    /// Add one fact (no-op if present).
    Add { triple: Triple },
    /// Remove one fact (no-op if absent).
    Remove { triple: Triple },
}

/// A write against the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Statement {
    /// Create a new partition; fails if it already exists.
    Insert {
        partition: Locator,
        triples: Vec<Triple>,
    },
    /// Remove a whole partition; fails if it does not exist.
    DeletePartition { partition: Locator },
    /// Add reference values to a partition.
    Attach {
        partition: Locator,
        predicate: String,
        objects: Vec<Locator>,
    },
    /// Remove reference values from a partition.
    Detach {
        partition: Locator,
        predicate: String,
        objects: Vec<Locator>,
    },
    /// Apply an ordered list of changes to an existing partition.
    Edit {
        partition: Locator,
        changes: Vec<Change>,
    },
}

impl Statement {
    /// The partition this statement writes to.
    #[must_use]
    pub const fn partition(&self) -> &Locator {
        match self {
            Self::Insert { partition, .. }
            | Self::DeletePartition { partition }
            | Self::Attach { partition, .. }
            | Self::Detach { partition, .. }
            | Self::Edit { partition, .. } => partition,
        }
    }

    /// Short verb used in diagnostics.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::DeletePartition { .. } => "delete",
            Self::Attach { .. } => "attach",
            Self::Detach { .. } => "detach",
            Self::Edit { .. } => "edit",
        }
    }
}
