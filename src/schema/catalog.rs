//! Built-in entity types.

use crate::schema::{DerivedField, EntitySchema, FieldDef};

/// External reference to a document, site or artifact.
fn reference() -> EntitySchema {
    EntitySchema::new("Reference")
        .field(FieldDef::text("name").required().identity())
        .field(FieldDef::text("url").identity())
        .field(FieldDef::text("description"))
        .field(FieldDef::text("external_id"))
        .field(FieldDef::text("media_type"))
        .field(FieldDef::text("labels").many())
        .field(FieldDef::reference("hashes", ["Hash"]).many().owned())
        .derived(DerivedField::new("display_name", ["name", "url"], " - "))
}

/// Content digest of a referenced artifact; owned by its reference.
fn hash() -> EntitySchema {
    EntitySchema::new("Hash")
        .field(FieldDef::text("algorithm").required().identity())
        .field(FieldDef::text("value").required().identity())
        .derived(DerivedField::new("display_name", ["algorithm", "value"], ":"))
}

fn taxonomy_entry() -> EntitySchema {
    EntitySchema::new("TaxonomyEntry")
        .field(FieldDef::text("taxonomy_name").required().identity())
        .field(FieldDef::text("taxonomy_version").identity())
        .field(FieldDef::text("name"))
        .field(FieldDef::text("description"))
        .field(FieldDef::reference("references", ["Reference"]).many())
        .derived(DerivedField::new(
            "display_name",
            ["taxonomy_name", "taxonomy_version"],
            " ",
        ))
}

fn risk() -> EntitySchema {
    EntitySchema::new("Risk")
        .field(FieldDef::text("name").required().identity())
        .field(FieldDef::text("statement"))
        .field(FieldDef::text("status"))
        .field(FieldDef::integer("priority"))
        .field(FieldDef::float("likelihood"))
        .field(FieldDef::boolean("accepted"))
        .field(FieldDef::timestamp("deadline"))
        .field(FieldDef::reference("references", ["Reference"]).many())
        .field(FieldDef::reference("taxonomy", ["TaxonomyEntry"]))
        .derived(DerivedField::new("display_name", ["name", "status"], " - "))
}

/// Entity types registered by [`crate::SchemaRegistry::builtin`].
#[must_use]
pub fn builtin_schemas() -> Vec<EntitySchema> {
    vec![reference(), hash(), taxonomy_entry(), risk()]
}
