use std::sync::Arc;
use std::time::Duration;
use text2cypher::GeneratedQuery;
use thiserror::Error;
use tracing::{debug, warn};

use crate::record::ResultRecord;
use crate::store::{GraphStore, StoreError};

/// The store refused or failed to run a generated query.
#[derive(Debug, Error)]
#[error("failed to execute query `{query}`: {source}")]
pub struct ExecutionError {
    pub query: String,
    #[source]
    pub source: StoreError,
}

/// Runs generated queries against a [`GraphStore`], one session per call.
pub struct QueryExecutor {
    store: Arc<dyn GraphStore>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn GraphStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Runs the query text unmodified and returns every record, in order.
    ///
    /// The session is closed on every path. Nothing is retried.
    pub async fn execute(&self, query: &GeneratedQuery) -> Result<Vec<ResultRecord>, ExecutionError> {
        let fail = |source: StoreError| ExecutionError {
            query: query.text().to_string(),
            source,
        };

        let mut session = self.store.session().await.map_err(fail)?;

        debug!(cypher = query.text(), "executing cypher");

        let outcome = match tokio::time::timeout(self.timeout, session.run(query.text())).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close graph session");
        }

        outcome.map_err(fail)
    }
}
