//! Identifier generation and storage locators.
//!
//! Entity identifiers are content-addressed: they are derived from the
//! identity-bearing fields of an entity, so two create requests describing
//! the same thing land on the same id. The derived id also names the storage
//! partition (the [`Locator`]) that holds the entity's triples.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::{Uuid, Variant, Version};

use crate::error::ValidationError;
use crate::value::Value;

/// Default namespace for derived identifiers.
pub const DEFAULT_NAMESPACE: Uuid = Uuid::from_u128(0x3a6b_51c2_8d0e_4f7a_9b12_6c4e_7f80_d215);

/// Scheme prefix shared by every locator.
pub const LOCATOR_SCHEME: &str = "urn:riskgraph:";

const LOCATOR_SEPARATOR: &str = "--";

/// Globally unique, stable entity identifier.
///
/// Identifiers are always rendered in the hyphenated lowercase UUID form.
///
/// # Examples
///
/// ```
/// use riskgraph::EntityId;
///
/// let id = EntityId::parse("6f1c2a9e-0b7d-5e43-8a21-3c9d4e5f6a7b").unwrap();
/// assert_eq!(id.to_string(), "6f1c2a9e-0b7d-5e43-8a21-3c9d4e5f6a7b");
/// assert!(EntityId::parse("6f1c2a9e").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Parses and validates a hyphenated UUID string.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidIdentifier` if `value` is not a
    /// well-formed 36 character UUID.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.len() != 36 {
            return Err(ValidationError::invalid_identifier(value));
        }
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| ValidationError::invalid_identifier(value))
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Creates a nil entity ID (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Derives the deterministic identifier for an entity.
///
/// `projection` holds the identity-bearing fields in canonical (schema)
/// order; absent fields are simply left out by the caller. The entity type is
/// part of the hashed material.
///
/// # Errors
///
/// Returns `ValidationError::InvalidIdentifier` if the derived value is not a
/// version 5 RFC 4122 UUID.
pub fn generate_id(
    namespace: &Uuid,
    entity_type: &str,
    projection: &[(&str, &Value)],
) -> Result<EntityId, ValidationError> {
    let canonical: Vec<(&str, serde_json::Value)> = projection
        .iter()
        .map(|(name, value)| (*name, value.to_json()))
        .collect();
    let material = serde_json::to_string(&canonical)
        .map_err(|e| ValidationError::invalid_identifier(format!("<unencodable: {e}>")))?;

    let uuid = Uuid::new_v5(namespace, format!("{entity_type}:{material}").as_bytes());
    if uuid.get_version() != Some(Version::Sha1) || uuid.get_variant() != Variant::RFC4122 {
        return Err(ValidationError::invalid_identifier(uuid.to_string()));
    }
    Ok(EntityId(uuid))
}

/// Storage address of an entity.
///
/// Rendered as `urn:riskgraph:<segment>--<uuid>`, where `segment` is the
/// kebab-case storage name of the entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    segment: String,
    id: EntityId,
}

impl Locator {
    /// Builds the locator for an entity.
    #[must_use]
    pub fn new(segment: impl Into<String>, id: EntityId) -> Self {
        Self {
            segment: segment.into(),
            id,
        }
    }

    /// Parses a rendered locator.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidIdentifier` if the scheme, separator
    /// or embedded UUID are malformed.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let rest = value
            .strip_prefix(LOCATOR_SCHEME)
            .ok_or_else(|| ValidationError::invalid_identifier(value))?;
        let (segment, id) = rest
            .rsplit_once(LOCATOR_SEPARATOR)
            .ok_or_else(|| ValidationError::invalid_identifier(value))?;
        if segment.is_empty() {
            return Err(ValidationError::invalid_identifier(value));
        }
        let id = EntityId::parse(id).map_err(|_| ValidationError::invalid_identifier(value))?;
        Ok(Self::new(segment, id))
    }

    /// The identifier embedded in this locator.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// The type segment of this locator.
    ///
    /// This follows the naming convention only and is not authoritative.
    #[must_use]
    pub fn entity_type_hint(&self) -> &str {
        &self.segment
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{LOCATOR_SCHEME}{}{LOCATOR_SEPARATOR}{}", self.segment, self.id)
    }
}

impl TryFrom<String> for Locator {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}
