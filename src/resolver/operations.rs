//! Resolver operations and their argument payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::page::ListArgs;
use crate::schema::EntitySchema;
use crate::service::EditInstruction;

/// What a resolver field does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `<entity>(id)`
    Get,
    /// `<entities>(..listArgs)`
    List,
    /// `<entities>Within(parentType, parentId, field, ..listArgs)`
    ListWithin,
    /// `create<Entity>(input)`
    Create,
    /// `edit<Entity>(id, input)`
    Edit,
    /// `delete<Entity>(id)`
    Delete,
    /// `delete<Entities>(ids)`
    DeleteMany,
    /// `attachTo<Entity>(id, field, entityId)`
    Attach,
    /// `detachFrom<Entity>(id, field, entityId)`
    Detach,
}

impl Operation {
    pub const ALL: [Self; 9] = [
        Self::Get,
        Self::List,
        Self::ListWithin,
        Self::Create,
        Self::Edit,
        Self::Delete,
        Self::DeleteMany,
        Self::Attach,
        Self::Detach,
    ];

    /// Returns true for operations that write.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::Get | Self::List | Self::ListWithin)
    }

    /// Resolver field name of this operation for `schema`.
    #[must_use]
    pub fn field_name(self, schema: &EntitySchema) -> String {
        match self {
            Self::Get => schema.singular().to_string(),
            Self::List => schema.plural().to_string(),
            Self::ListWithin => format!("{}Within", schema.plural()),
            Self::Create => format!("create{}", schema.name()),
            Self::Edit => format!("edit{}", schema.name()),
            Self::Delete => format!("delete{}", schema.name()),
            Self::DeleteMany => format!("delete{}", schema.plural_pascal()),
            Self::Attach => format!("attachTo{}", schema.name()),
            Self::Detach => format!("detachFrom{}", schema.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWithinArgs {
    pub parent_type: String,
    pub parent_id: String,
    pub field: String,
    #[serde(flatten)]
    pub list: ListArgs,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateArgs {
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EditArgs {
    pub id: String,
    #[serde(default)]
    pub input: Vec<EditInstruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteManyArgs {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkArgs {
    pub id: String,
    pub field: String,
    pub entity_id: String,
}

/// Deserializes the arguments of `field`; `null` reads as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(
    field: &str,
    args: &serde_json::Value,
) -> Result<T, ValidationError> {
    let args = if args.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        args.clone()
    };
    serde_json::from_value(args)
        .map_err(|e| ValidationError::invalid_argument(field, e.to_string()))
}
