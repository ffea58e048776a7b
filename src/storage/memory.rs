//! In-memory storage backend.
//!
//! This module provides a thread-safe in-memory triple store implementing
//! [`StorageEngine`]. It is intended for embedded usage, tests, and as a
//! reference implementation of the statement semantics.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::id::Locator;
use crate::query::{Change, Scope, SelectQuery, Statement, Term, Triple};
use crate::schema::{Cardinality, TYPE_PREDICATE};
use crate::storage::traits::{
    ReadRequest, Row, StorageEngine, StorageError, WriteRequest, ROW_LOCATOR,
};
use crate::value::Value;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Facts of one entity, in insertion order, without duplicates.
#[derive(Debug, Default, Clone)]
struct Partition {
    facts: Vec<(String, Term)>,
}

impl Partition {
    fn values<'a>(&'a self, predicate: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.facts
            .iter()
            .filter(move |(p, _)| p == predicate)
            .map(|(_, t)| t)
    }

    fn type_tag(&self) -> Option<&str> {
        self.values(TYPE_PREDICATE).find_map(|t| match t {
            Term::Literal(Value::String(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    fn add(&mut self, predicate: &str, object: Term) {
        if !self.facts.iter().any(|(p, o)| p == predicate && *o == object) {
            self.facts.push((predicate.to_string(), object));
        }
    }

    fn remove(&mut self, predicate: &str, object: &Term) {
        self.facts.retain(|(p, o)| !(p == predicate && o == object));
    }

    fn clear(&mut self, predicate: &str) {
        self.facts.retain(|(p, _)| p != predicate);
    }
}

#[derive(Debug, Default, Clone)]
struct Dataset {
    order: Vec<Locator>,
    partitions: HashMap<Locator, Partition>,
}

impl Dataset {
    fn partition_mut(&mut self, locator: &Locator) -> Result<&mut Partition, StorageError> {
        self.partitions
            .get_mut(locator)
            .ok_or_else(|| StorageError::PartitionNotFound(locator.to_string()))
    }

    fn apply(&mut self, statement: &Statement) -> Result<(), StorageError> {
        match statement {
            Statement::Insert { partition, triples } => {
                if self.partitions.contains_key(partition) {
                    return Err(StorageError::DuplicateKey(partition.to_string()));
                }
                let mut fresh = Partition::default();
                for triple in triples {
                    check_subject(partition, triple)?;
                    fresh.add(triple.predicate(), triple.object().clone());
                }
                self.order.push(partition.clone());
                self.partitions.insert(partition.clone(), fresh);
            }
            Statement::DeletePartition { partition } => {
                if self.partitions.remove(partition).is_none() {
                    return Err(StorageError::PartitionNotFound(partition.to_string()));
                }
                self.order.retain(|l| l != partition);
            }
            Statement::Attach {
                partition,
                predicate,
                objects,
            } => {
                let target = self.partition_mut(partition)?;
                for object in objects {
                    target.add(predicate, Term::Locator(object.clone()));
                }
            }
            Statement::Detach {
                partition,
                predicate,
                objects,
            } => {
                let target = self.partition_mut(partition)?;
                for object in objects {
                    target.remove(predicate, &Term::Locator(object.clone()));
                }
            }
            Statement::Edit { partition, changes } => {
                let target = self.partition_mut(partition)?;
                for change in changes {
                    match change {
                        Change::Clear { predicate } => target.clear(predicate),
                        Change::Add { triple } => {
                            check_subject(partition, triple)?;
                            target.add(triple.predicate(), triple.object().clone());
                        }
                        Change::Remove { triple } => {
                            check_subject(partition, triple)?;
                            target.remove(triple.predicate(), triple.object());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn select(&self, query: &SelectQuery) -> Vec<Row> {
        let candidates: Vec<&Locator> = match query.scope() {
            Scope::ById { locator } => vec![locator],
            Scope::All => self.order.iter().collect(),
            Scope::Within { parent, predicate } => self
                .partitions
                .get(parent)
                .map(|p| p.values(predicate).filter_map(Term::as_locator).collect())
                .unwrap_or_default(),
        };

        candidates
            .into_iter()
            .filter_map(|locator| {
                let partition = self.partitions.get(locator)?;
                project(locator, partition, query)
            })
            .collect()
    }
}

fn check_subject(partition: &Locator, triple: &Triple) -> Result<(), StorageError> {
    if triple.subject() == partition {
        Ok(())
    } else {
        Err(StorageError::UnsupportedStatement(format!(
            "triple subject {} is outside partition {partition}",
            triple.subject()
        )))
    }
}

fn project(locator: &Locator, partition: &Partition, query: &SelectQuery) -> Option<Row> {
    if partition.type_tag() != Some(query.object_type()) {
        return None;
    }

    let mut row = Row::new();
    row.insert(ROW_LOCATOR.to_string(), Value::Reference(locator.clone()));
    for projection in query.projections() {
        let mut values: Vec<Value> = partition
            .values(projection.predicate())
            .map(Term::to_value)
            .collect();
        if values.is_empty() {
            if projection.is_optional() {
                continue;
            }
            return None;
        }
        let value = match projection.cardinality() {
            Cardinality::One => values.swap_remove(0),
            Cardinality::Many => Value::List(values),
        };
        row.insert(projection.variable().to_string(), value);
    }
    Some(row)
}

/// Thread-safe in-memory triple store.
///
/// Each entity lives in its own partition, keyed by locator. Writes are
/// applied to a copy of the target database and swapped in only when every
/// statement succeeds.
#[derive(Debug, Default)]
pub struct InMemoryTripleStore {
    databases: RwLock<HashMap<String, Dataset>>,
}

impl InMemoryTripleStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions in `db_name`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn partition_count(&self, db_name: &str) -> Result<usize, StorageError> {
        let databases = self.databases.read().map_err(|_| lock_err("partition_count"))?;
        Ok(databases.get(db_name).map_or(0, |d| d.partitions.len()))
    }

    /// Returns true if `locator` has a partition in `db_name`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the lock is poisoned.
    pub fn contains(&self, db_name: &str, locator: &Locator) -> Result<bool, StorageError> {
        let databases = self.databases.read().map_err(|_| lock_err("contains"))?;
        Ok(databases
            .get(db_name)
            .is_some_and(|d| d.partitions.contains_key(locator)))
    }

    fn read(&self, request: &ReadRequest, context: &'static str) -> Result<Vec<Row>, StorageError> {
        let databases = self.databases.read().map_err(|_| lock_err(context))?;
        Ok(databases
            .get(&request.db_name)
            .map(|d| d.select(&request.query))
            .unwrap_or_default())
    }

    fn write(&self, request: &WriteRequest, context: &'static str) -> Result<(), StorageError> {
        let mut databases = self.databases.write().map_err(|_| lock_err(context))?;
        let mut staged = databases.get(&request.db_name).cloned().unwrap_or_default();
        for statement in &request.statements {
            staged.apply(statement)?;
        }
        databases.insert(request.db_name.clone(), staged);
        Ok(())
    }
}

impl StorageEngine for InMemoryTripleStore {
    fn query_by_id(&self, request: &ReadRequest) -> Result<Vec<Row>, StorageError> {
        let mut rows = self.read(request, "query_by_id")?;
        rows.truncate(1);
        Ok(rows)
    }

    fn query_all(&self, request: &ReadRequest) -> Result<Vec<Row>, StorageError> {
        self.read(request, "query_all")
    }

    fn create(&self, request: &WriteRequest) -> Result<(), StorageError> {
        self.write(request, "create")
    }

    fn edit(&self, request: &WriteRequest) -> Result<(), StorageError> {
        self.write(request, "edit")
    }

    fn delete(&self, request: &WriteRequest) -> Result<(), StorageError> {
        self.write(request, "delete")
    }
}
