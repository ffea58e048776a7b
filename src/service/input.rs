//! Wire shapes accepted and returned by the service.

use serde::{Deserialize, Serialize};

use crate::reducer::Entity;

/// What an edit instruction does to its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOperation {
    Add,
    Replace,
    Remove,
    /// Nothing to do; the stored value already matches.
    Skip,
}

/// One field change: `{ key, value: [..], operation? }`.
///
/// `operation` is optional on input and always set on output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditInstruction {
    pub key: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub value: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<EditOperation>,
}

/// Accepts a bare value where a list is expected.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    })
}

impl EditInstruction {
    /// Instruction with an inferred operation.
    #[must_use]
    pub fn new<I, V>(key: impl Into<String>, value: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self {
            key: key.into(),
            value: value.into_iter().map(Into::into).collect(),
            operation: None,
        }
    }

    #[must_use]
    pub const fn with_operation(mut self, operation: EditOperation) -> Self {
        self.operation = Some(operation);
        self
    }
}

/// Result of an edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    /// The entity as stored after the edit.
    pub entity: Entity,
    /// Every accepted instruction with its resolved operation, followed by
    /// the timestamp instructions the service appended.
    pub instructions: Vec<EditInstruction>,
    /// False when every instruction resolved to `skip` and nothing was
    /// written.
    pub changed: bool,
}

impl EditOutcome {
    /// Resolved operation of the first instruction on `key`.
    #[must_use]
    pub fn operation_for(&self, key: &str) -> Option<EditOperation> {
        self.instructions
            .iter()
            .find(|i| i.key == key)
            .and_then(|i| i.operation)
    }
}
