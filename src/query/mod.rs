//! Query building for entity persistence.
//!
//! Statements are plain typed objects (see [`Statement`] and
//! [`SelectQuery`]); the builders in this module derive them from schema
//! descriptors. Text rendering exists for logs only.

mod builder;
mod render;
mod term;

pub use builder::{
    attach_query, delete_by_id_query, delete_by_locator_query, detach_query, insert_query,
    probe_query, reference_field, select_all_query, select_by_id_query, update_query,
    InsertQuery, ParentScope, PropertyBag,
};
pub use render::escape_literal;
pub use term::{Change, Projection, Scope, SelectQuery, Statement, Term, Triple};
