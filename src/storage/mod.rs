//! Storage engine contract and the in-memory implementation.

mod memory;
mod traits;

pub use memory::InMemoryTripleStore;
pub use traits::{ReadRequest, Row, StorageEngine, StorageError, WriteRequest, ROW_LOCATOR};
