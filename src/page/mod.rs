//! In-memory filtering, sorting and cursor pagination.
//!
//! The store hands back the full, unordered result set; everything a list
//! request asks for happens here in one pass:
//!
//! 1. `search` drops nodes without a matching text value
//! 2. `ordered_by` sorts (otherwise store order is kept)
//! 3. `offset` past the end yields no page
//! 4. filters are applied after the offset while edges are collected up to
//!    `first`
//!
//! An empty page is `None`, never a connection with no edges.

mod filter;
mod sort;

use serde::{Deserialize, Serialize};

pub use filter::{Filter, FilterMode, FilterOperator, FilterSet};
pub use sort::{sort_entities, OrderMode};

use crate::error::ValidationError;
use crate::reducer::Entity;
use crate::schema::SYSTEM_FIELDS;
use crate::value::Value;

/// Arguments of a list query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListArgs {
    /// Case-insensitive substring matched against text fields.
    pub search: Option<String>,
    /// Page size; absent means every remaining row.
    pub first: Option<usize>,
    pub offset: usize,
    pub ordered_by: Option<String>,
    pub order_mode: OrderMode,
    pub filters: Vec<Filter>,
    pub filter_mode: FilterMode,
}

/// How `has_next_page` is decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationPolicy {
    /// Without filters, compares the page end with the row count. With
    /// filters, a full page implies another one, which can turn out empty.
    #[default]
    Heuristic,
    /// Looks past the page for at least one more match.
    Exact,
}

/// Page metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub start_cursor: String,
    pub end_cursor: String,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    /// Matching rows when filters are active, otherwise every row.
    pub global_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub cursor: String,
    pub node: Entity,
}

impl Edge {
    fn new(node: Entity) -> Self {
        Self {
            cursor: node.locator().to_string(),
            node,
        }
    }
}

/// One page of a list query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub page_info: PageInfo,
    pub edges: Vec<Edge>,
}

impl Connection {
    #[must_use]
    pub fn nodes(&self) -> impl Iterator<Item = &Entity> {
        self.edges.iter().map(|e| &e.node)
    }
}

fn matches_search(entity: &Entity, needle: &str) -> bool {
    entity
        .fields()
        .iter()
        .filter(|(k, _)| !SYSTEM_FIELDS.contains(&k.as_str()))
        .flat_map(|(_, v)| v.elements())
        .filter_map(Value::as_str)
        .any(|s| s.to_lowercase().contains(needle))
}

/// Filters, sorts and pages `entities`.
///
/// # Errors
///
/// Returns `InvalidArgument` if a filter is malformed (empty key, bad regex).
///
/// # Examples
///
/// ```
/// use riskgraph::page::{paginate, ListArgs, PaginationPolicy};
///
/// let page = paginate(Vec::new(), &ListArgs::default(), PaginationPolicy::Heuristic)?;
/// assert!(page.is_none());
/// # Ok::<(), riskgraph::ValidationError>(())
/// ```
pub fn paginate(
    mut entities: Vec<Entity>,
    args: &ListArgs,
    policy: PaginationPolicy,
) -> Result<Option<Connection>, ValidationError> {
    let filters = FilterSet::compile(&args.filters, args.filter_mode)?;

    if let Some(needle) = args
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let needle = needle.to_lowercase();
        entities.retain(|e| matches_search(e, &needle));
    }
    if let Some(field) = args.ordered_by.as_deref() {
        sort_entities(&mut entities, field, args.order_mode);
    }

    let total = entities.len();
    if args.offset > total {
        return Ok(None);
    }
    let limit = args.first.unwrap_or(total);

    let mut rest = entities
        .into_iter()
        .skip(args.offset)
        .filter(|e| filters.matches(e));
    let edges: Vec<Edge> = rest.by_ref().take(limit).map(Edge::new).collect();
    let collected = edges.len();

    let (has_next_page, filter_count) = match policy {
        PaginationPolicy::Heuristic if filters.is_empty() => {
            (args.offset + collected < total, collected)
        }
        PaginationPolicy::Heuristic => (collected < total && collected == limit, collected),
        PaginationPolicy::Exact => {
            let remaining = rest.count();
            (remaining > 0, collected + remaining)
        }
    };

    let (Some(first), Some(last)) = (edges.first(), edges.last()) else {
        return Ok(None);
    };
    let page_info = PageInfo {
        start_cursor: first.cursor.clone(),
        end_cursor: last.cursor.clone(),
        has_next_page,
        has_previous_page: args.offset > 0,
        global_count: if filters.is_empty() { total } else { filter_count },
    };
    Ok(Some(Connection { page_info, edges }))
}
