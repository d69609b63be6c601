//! Retrieval-augmented answering over a graph.
//!
//! One call walks `Validating -> GeneratingQuery -> ExecutingQuery ->
//! FormattingAnswer` and either returns a [`RagAnswer`] or a [`RagError`]
//! naming the stage that failed. No state is carried between calls.

use std::sync::Arc;
use std::time::{Duration, Instant};
use text2cypher::{complete_with_timeout, LanguageModel};
use tracing::{debug, error, info};

use crate::context::ContextFormatter;
use crate::error::{PipelineStage, RagError};
use crate::retriever::Text2CypherRetriever;
use crate::template::RagTemplate;
use crate::types::{RagAnswer, SearchOptions};

pub struct GraphRag {
    retriever: Arc<Text2CypherRetriever>,
    llm: Arc<dyn LanguageModel>,
    template: RagTemplate,
    formatter: ContextFormatter,
    temperature: f32,
    timeout: Duration,
}

impl GraphRag {
    pub fn builder() -> GraphRagBuilder {
        GraphRagBuilder::default()
    }

    /// Caller-facing entry point: answer a question and keep the retrieval context.
    pub async fn ask(&self, question: &str) -> Result<RagAnswer, RagError> {
        self.search(question, true).await
    }

    pub async fn search(&self, question: &str, return_context: bool) -> Result<RagAnswer, RagError> {
        let options = SearchOptions {
            return_context,
            ..SearchOptions::default()
        };
        self.search_with(question, &options).await
    }

    pub async fn search_with(&self, question: &str, options: &SearchOptions) -> Result<RagAnswer, RagError> {
        let started = Instant::now();

        // Step 1: Retrieval
        let retrieval = self.retriever.search(question).await.map_err(RagError::from)?;

        // Step 2: Augmentation
        debug!(stage = ?PipelineStage::FormattingAnswer, record_count = retrieval.items.len(), "building answer prompt");
        let context = self.formatter.format(&retrieval.items);
        let prompt = self.template.format(question, &context, &options.examples);

        // Step 3: Generation
        let answer = complete_with_timeout(self.llm.as_ref(), &prompt, self.temperature, self.timeout)
            .await
            .map_err(|source| {
                error!(
                    question,
                    cypher = retrieval.query().unwrap_or(""),
                    error = %source,
                    "answer generation failed"
                );
                RagError::Model { source }
            })?;

        info!(
            cypher = retrieval.query().unwrap_or(""),
            record_count = retrieval.items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered question"
        );

        Ok(RagAnswer {
            answer,
            retrieval_result: options.return_context.then_some(retrieval),
        })
    }
}

/// Builder for [`GraphRag`]. The retriever and the model are required.
pub struct GraphRagBuilder {
    retriever: Option<Arc<Text2CypherRetriever>>,
    llm: Option<Arc<dyn LanguageModel>>,
    template: RagTemplate,
    formatter: ContextFormatter,
    temperature: f32,
    timeout: Duration,
}

impl Default for GraphRagBuilder {
    fn default() -> Self {
        Self {
            retriever: None,
            llm: None,
            template: RagTemplate::default(),
            formatter: ContextFormatter::default(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GraphRagBuilder {
    pub fn retriever(mut self, retriever: Arc<Text2CypherRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn template(mut self, template: RagTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn context_formatter(mut self, formatter: ContextFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<GraphRag, RagError> {
        let retriever = self.retriever
            .ok_or_else(|| RagError::Configuration("a retriever is required".to_string()))?;
        let llm = self.llm
            .ok_or_else(|| RagError::Configuration("a language model is required".to_string()))?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Configuration(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }

        Ok(GraphRag {
            retriever,
            llm,
            template: self.template,
            formatter: self.formatter,
            temperature: self.temperature,
            timeout: self.timeout,
        })
    }
}
