use graph::QueryExecutor;
use text2cypher::QueryGenerator;
use tracing::{debug, info, warn};

use crate::error::{RetrievalError, TranslationFailure};
use crate::types::RetrievalResult;

/// Question in, records out: generates Cypher with a model, then runs it.
pub struct Text2CypherRetriever {
    generator: QueryGenerator,
    executor: QueryExecutor,
}

impl Text2CypherRetriever {
    pub fn new(generator: QueryGenerator, executor: QueryExecutor) -> Self {
        Self {
            generator,
            executor,
        }
    }

    pub async fn search(&self, question: &str) -> Result<RetrievalResult, RetrievalError> {
        // Step 1: Validate before touching the model or the store
        if question.trim().is_empty() {
            return Err(RetrievalError::Validation("question must not be empty".to_string()));
        }

        // Step 2: Translate
        let query = self.generator.generate(question).await.map_err(|e| {
            warn!(
                question,
                error = %e,
                raw_output = e.raw_output().unwrap_or(""),
                "cypher generation failed"
            );
            TranslationFailure::Generation(e)
        })?;

        // Step 3: Execute
        let items = self.executor.execute(&query).await.map_err(|e| {
            warn!(question, cypher = %e.query, error = %e.source, "cypher execution failed");
            TranslationFailure::Execution(e)
        })?;

        debug!(cypher = query.text(), record_count = items.len(), "retrieved records");
        if items.is_empty() {
            info!(question, cypher = query.text(), "query matched no records");
        }

        Ok(RetrievalResult::new(query.text(), items))
    }
}
