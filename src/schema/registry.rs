//! Registry of entity schemas.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::schema::catalog::builtin_schemas;
use crate::schema::EntitySchema;

/// All known entity types, looked up by name, storage segment or API name.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<Arc<EntitySchema>>,
    by_name: HashMap<String, usize>,
    by_segment: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry seeded with the built-in catalog.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in catalog is inconsistent.
    pub fn builtin() -> Result<Self, ValidationError> {
        let mut registry = Self::new();
        for schema in builtin_schemas() {
            registry.register(schema)?;
        }
        registry.check_references()?;
        Ok(registry)
    }

    /// Adds a schema.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidArgument` if the schema is invalid or
    /// its name or segment is already taken.
    pub fn register(&mut self, schema: EntitySchema) -> Result<(), ValidationError> {
        schema.validate()?;
        if self.by_name.contains_key(schema.name()) {
            return Err(ValidationError::invalid_argument(
                "schema",
                format!("{} is already registered", schema.name()),
            ));
        }
        if self.by_segment.contains_key(schema.segment()) {
            return Err(ValidationError::invalid_argument(
                "schema",
                format!("segment {} is already registered", schema.segment()),
            ));
        }
        let index = self.schemas.len();
        self.by_name.insert(schema.name().to_string(), index);
        self.by_segment.insert(schema.segment().to_string(), index);
        self.schemas.push(Arc::new(schema));
        Ok(())
    }

    /// Verifies that every reference field targets a registered type.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownEntityType` for the first dangling
    /// target.
    pub fn check_references(&self) -> Result<(), ValidationError> {
        for schema in &self.schemas {
            for field in schema.fields() {
                if let Some(target) = field
                    .kind()
                    .targets()
                    .iter()
                    .find(|t| !self.by_name.contains_key(t.as_str()))
                {
                    return Err(ValidationError::UnknownEntityType {
                        name: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Looks up a schema by type name.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownEntityType` if not registered.
    pub fn get(&self, name: &str) -> Result<&Arc<EntitySchema>, ValidationError> {
        self.by_name
            .get(name)
            .map(|&i| &self.schemas[i])
            .ok_or_else(|| ValidationError::UnknownEntityType {
                name: name.to_string(),
            })
    }

    /// Looks up a schema by its storage segment.
    #[must_use]
    pub fn by_segment(&self, segment: &str) -> Option<&Arc<EntitySchema>> {
        self.by_segment.get(segment).map(|&i| &self.schemas[i])
    }

    /// Iterates all registered schemas in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.schemas.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    #[test]
    fn test_builtin_registry() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(registry.get("Reference").is_ok());
        assert!(registry.get("TaxonomyEntry").is_ok());
        assert_eq!(
            registry.by_segment("taxonomy-entry").unwrap().name(),
            "TaxonomyEntry"
        );
        assert!(registry.len() >= 4);
    }

    #[test]
    fn test_unknown_type() {
        let registry = SchemaRegistry::new();
        let err = registry.get("Nope").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownEntityType { .. }));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = SchemaRegistry::new();
        let schema = EntitySchema::new("Thing").field(FieldDef::text("name").identity());
        registry.register(schema.clone()).unwrap();
        assert!(registry.register(schema).is_err());
    }

    #[test]
    fn test_dangling_reference_target() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                EntitySchema::new("Thing")
                    .field(FieldDef::text("name").identity())
                    .field(FieldDef::reference("parts", ["Part"]).many()),
            )
            .unwrap();
        let err = registry.check_references().unwrap_err();
        assert!(err.to_string().contains("Part"));
    }
}
