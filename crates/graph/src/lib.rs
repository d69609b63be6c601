pub mod executor;
pub mod introspect;
pub mod neo4j;
mod projection;
pub mod record;
pub mod store;

#[cfg(test)]
mod testing;

pub use executor::{ExecutionError, QueryExecutor};
pub use introspect::introspect_schema;
pub use neo4j::Neo4jStore;
pub use record::ResultRecord;
pub use store::{GraphSession, GraphStore, StoreError};
