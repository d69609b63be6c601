use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::record::ResultRecord;

/// Errors raised by a graph store, carrying the store's own message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("graph store connection failed: {0}")]
    Connection(String),
    #[error("graph store rejected query: {0}")]
    Query(String),
    #[error("failed to decode record: {0}")]
    Decode(String),
    #[error("graph query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// A source of query sessions.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn session(&self) -> Result<Box<dyn GraphSession>, StoreError>;

    /// Run a trivial query to prove the store is reachable.
    async fn verify_connectivity(&self) -> Result<(), StoreError> {
        let mut session = self.session().await?;
        let outcome = session.run("RETURN 1 AS ok").await;
        session.close().await?;
        outcome.map(|_| ())
    }
}

/// A scoped handle that runs queries until closed.
#[async_trait]
pub trait GraphSession: Send {
    /// Runs the query as given and returns every record it produced.
    async fn run(&mut self, query: &str) -> Result<Vec<ResultRecord>, StoreError>;

    async fn close(&mut self) -> Result<(), StoreError>;
}
