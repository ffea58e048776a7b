//! # riskgraph - object-graph persistence for risk and compliance data
//!
//! riskgraph stores domain objects (references, hashes, taxonomy entries,
//! risks, and any type registered at runtime) as subject / predicate /
//! object facts, one storage partition per entity, and exposes them through
//! a GraphQL-shaped resolver surface.
//!
//! ## Core Concepts
//!
//! - **Schema**: a per-type descriptor listing fields, their predicates and
//!   which of them carry identity
//! - **Identifier**: a UUIDv5 derived from the identity fields, so equal
//!   objects get equal ids
//! - **Statement**: a typed write (insert, delete, attach, detach, edit)
//!   executed by a [`StorageEngine`]
//! - **Connection**: a cursor-paginated page of entities
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use riskgraph::{
//!     EditInstruction, EntityService, InMemoryTripleStore, RiskgraphConfig, SchemaRegistry,
//! };
//! use serde_json::json;
//!
//! let service = EntityService::new(
//!     Arc::new(SchemaRegistry::builtin()?),
//!     Arc::new(InMemoryTripleStore::new()),
//!     &RiskgraphConfig::default(),
//! );
//!
//! let doc = service.create(
//!     "Reference",
//!     &json!({ "name": "ISO 27001", "url": "https://iso.org" }),
//! )?;
//! let outcome = service.edit(
//!     "Reference",
//!     &doc.id().to_string(),
//!     &[EditInstruction::new("description", ["Information security"])],
//! )?;
//! assert!(outcome.changed);
//! # Ok::<(), riskgraph::GraphError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod id;
pub mod time;
pub mod value;

// Schema, statements and storage
pub mod query;
pub mod reducer;
pub mod schema;
pub mod storage;

// Listing, service and resolver surface
pub mod page;
pub mod resolver;
pub mod service;

// Ambient
pub mod config;
pub mod telemetry;

// Re-export primary types at crate root for convenience
pub use config::RiskgraphConfig;
pub use error::{ExecutionError, GraphError, GraphResult, ValidationError};
pub use id::{EntityId, Locator};
pub use page::{Connection, Filter, ListArgs, PaginationPolicy};
pub use reducer::Entity;
pub use resolver::{Resolver, ResolverRequest, ResolverResponse};
pub use schema::{EntitySchema, FieldDef, SchemaRegistry};
pub use service::{EditInstruction, EditOperation, EditOutcome, EntityService};
pub use storage::{InMemoryTripleStore, StorageEngine, StorageError};
pub use value::Value;
