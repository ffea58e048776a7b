//! Filter predicates over reduced entities.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::ValidationError;
use crate::reducer::Entity;
use crate::value::Value;

const REGEX_CACHE_MAX: usize = 1024;

static REGEX_CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();

fn cached_regex(pattern: &str) -> Result<Regex, ValidationError> {
    let cache = REGEX_CACHE.get_or_init(|| RwLock::new(HashMap::new()));

    // A poisoned cache is only a missed optimisation; compile directly.
    if let Ok(guard) = cache.read() {
        if let Some(re) = guard.get(pattern) {
            return Ok(re.clone());
        }
    }

    let compiled = Regex::new(pattern).map_err(|e| {
        ValidationError::invalid_argument("filters", format!("invalid regex '{pattern}': {e}"))
    })?;

    if let Ok(mut guard) = cache.write() {
        if guard.len() >= REGEX_CACHE_MAX {
            guard.clear();
        }
        guard
            .entry(pattern.to_string())
            .or_insert_with(|| compiled.clone());
    }
    Ok(compiled)
}

/// How several filters combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    And,
    #[default]
    Or,
}

/// Comparison applied by one filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    #[default]
    Eq,
    NotEq,
    /// Regular expression over the text form.
    Match,
    /// Case-insensitive substring.
    Contains,
    /// Case-insensitive prefix.
    StartsWith,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// One `{ key, values, operator }` filter from list arguments.
///
/// A list-valued field matches when any of its elements does; a filter with
/// several values matches when any value does (`not_eq` when none does).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub key: String,
    #[serde(default)]
    pub values: Vec<Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<FilterOperator>,
}

impl Filter {
    /// Equality filter on `key`.
    #[must_use]
    pub fn eq<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Json>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
            operator: None,
        }
    }

    #[must_use]
    pub const fn with_operator(mut self, operator: FilterOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    #[must_use]
    pub fn operator(&self) -> FilterOperator {
        self.operator.unwrap_or_default()
    }
}

#[derive(Debug)]
struct Compiled<'a> {
    filter: &'a Filter,
    operator: FilterOperator,
    patterns: Vec<Regex>,
}

impl Compiled<'_> {
    fn matches(&self, entity: &Entity) -> bool {
        let elements: Vec<&Value> = entity
            .get(&self.filter.key)
            .map(|v| v.elements().collect())
            .unwrap_or_default();

        match self.operator {
            FilterOperator::NotEq => !self
                .filter
                .values
                .iter()
                .any(|expected| elements.iter().any(|e| equals(e, expected))),
            FilterOperator::Match => elements.iter().any(|e| {
                e.as_text()
                    .is_some_and(|text| self.patterns.iter().any(|re| re.is_match(&text)))
            }),
            op => self.filter.values.iter().any(|expected| {
                elements.iter().any(|element| match op {
                    FilterOperator::Eq => equals(element, expected),
                    FilterOperator::Contains => text_test(element, expected, |t, n| t.contains(n)),
                    FilterOperator::StartsWith => {
                        text_test(element, expected, |t, n| t.starts_with(n))
                    }
                    FilterOperator::Gt => compare(element, expected) == Some(Ordering::Greater),
                    FilterOperator::Gte => matches!(
                        compare(element, expected),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    FilterOperator::Lt => compare(element, expected) == Some(Ordering::Less),
                    FilterOperator::Lte => matches!(
                        compare(element, expected),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    FilterOperator::NotEq | FilterOperator::Match => false,
                })
            }),
        }
    }
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn equals(element: &Value, expected: &Json) -> bool {
    match (element, expected) {
        (Value::Timestamp(at), Json::String(s)) => parse_instant(s).is_some_and(|t| t == *at),
        (_, Json::String(s)) => element.as_text().is_some_and(|t| t == *s),
        (Value::Bool(b), Json::Bool(e)) => b == e,
        (_, Json::Number(n)) => match (element.as_float(), n.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b) == Ordering::Equal,
            _ => false,
        },
        _ => false,
    }
}

fn text_test(element: &Value, expected: &Json, test: impl Fn(&str, &str) -> bool) -> bool {
    let needle = match expected {
        Json::String(s) => s.to_lowercase(),
        Json::Null | Json::Array(_) | Json::Object(_) => return false,
        other => other.to_string(),
    };
    element
        .as_text()
        .is_some_and(|t| test(&t.to_lowercase(), &needle))
}

fn compare(element: &Value, expected: &Json) -> Option<Ordering> {
    match (element, expected) {
        (Value::Timestamp(at), Json::String(s)) => parse_instant(s).map(|t| at.cmp(&t)),
        (Value::String(_), Json::String(b)) => Some(element.sort_cmp(&Value::String(b.clone()))),
        (_, Json::Number(n)) => Some(element.as_float()?.total_cmp(&n.as_f64()?)),
        _ => None,
    }
}

/// Filters from one list request, validated and ready to apply.
#[derive(Debug)]
pub struct FilterSet<'a> {
    filters: Vec<Compiled<'a>>,
    mode: FilterMode,
}

impl<'a> FilterSet<'a> {
    /// Validates `filters` and compiles regular expressions once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty key or a malformed regex.
    pub fn compile(filters: &'a [Filter], mode: FilterMode) -> Result<Self, ValidationError> {
        let mut compiled = Vec::with_capacity(filters.len());
        for filter in filters {
            if filter.key.trim().is_empty() {
                return Err(ValidationError::invalid_argument("filters", "filter key is empty"));
            }
            if filter.values.is_empty() {
                continue;
            }
            let operator = filter.operator();
            let patterns = if operator == FilterOperator::Match {
                filter
                    .values
                    .iter()
                    .map(|v| match v {
                        Json::String(p) => cached_regex(p),
                        other => cached_regex(&other.to_string()),
                    })
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                Vec::new()
            };
            compiled.push(Compiled {
                filter,
                operator,
                patterns,
            });
        }
        Ok(Self {
            filters: compiled,
            mode,
        })
    }

    /// True when no filter constrains the rows; value-less filters are dropped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True if `entity` passes; an empty set passes everything.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match self.mode {
            FilterMode::And => self.filters.iter().all(|f| f.matches(entity)),
            FilterMode::Or => self.filters.iter().any(|f| f.matches(entity)),
        }
    }
}
