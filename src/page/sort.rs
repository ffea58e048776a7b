//! Ordering of result sets.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::reducer::Entity;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    #[default]
    Asc,
    Desc,
}

/// Stable sort on one field.
///
/// Entities without the field go last in either direction; ties keep store
/// order.
pub fn sort_entities(entities: &mut [Entity], field: &str, mode: OrderMode) {
    entities.sort_by(|a, b| match (a.get(field), b.get(field)) {
        (Some(x), Some(y)) => {
            let ord = x.sort_cmp(y);
            match mode {
                OrderMode::Asc => ord,
                OrderMode::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
