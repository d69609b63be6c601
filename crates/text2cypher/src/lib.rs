pub mod azure;
pub mod error;
pub mod extraction;
pub mod llm;
pub mod prompt;
pub mod schema;

pub use azure::AzureOpenAiClient;
pub use error::GenerationError;
pub use extraction::{ensure_read_only, extract_cypher, ExtractionError};
pub use llm::{complete_with_timeout, LanguageModel, LlmError, OllamaClient};
pub use prompt::{PromptSource, QUERY_TEXT_PLACEHOLDER};
pub use schema::{FewShotExample, GeneratedQuery, SchemaContext, SchemaError};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Kept low so identical questions yield the same query.
    pub temperature: f32,
    pub timeout: Duration,
    /// Let write clauses through the read-only guard.
    pub allow_writes: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            timeout: Duration::from_secs(60),
            allow_writes: false,
        }
    }
}

/// Turns a natural-language question into a Cypher statement.
pub struct QueryGenerator {
    llm: Arc<dyn LanguageModel>,
    prompt_source: PromptSource,
    config: GeneratorConfig,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, prompt_source: PromptSource, config: GeneratorConfig) -> Self {
        if let PromptSource::Custom(template) = &prompt_source {
            if !template.contains(QUERY_TEXT_PLACEHOLDER) {
                warn!(
                    placeholder = QUERY_TEXT_PLACEHOLDER,
                    "custom text2cypher prompt has no question placeholder; it will be sent verbatim"
                );
            }
        }

        Self {
            llm,
            prompt_source,
            config,
        }
    }

    pub fn with_schema(llm: Arc<dyn LanguageModel>, context: SchemaContext) -> Self {
        Self::new(llm, PromptSource::Schema(context), GeneratorConfig::default())
    }

    pub fn prompt_source(&self) -> &PromptSource {
        &self.prompt_source
    }

    /// Build the prompt, ask the model, and extract a single statement from its reply.
    pub async fn generate(&self, question: &str) -> Result<GeneratedQuery, GenerationError> {
        let prompt = self.prompt_source.render(question);

        debug!(model = self.llm.model_name(), "requesting cypher translation");

        let raw_output = complete_with_timeout(
            self.llm.as_ref(),
            &prompt,
            self.config.temperature,
            self.config.timeout,
        )
        .await
        .map_err(GenerationError::Model)?;

        let malformed = |reason: ExtractionError| GenerationError::Malformed {
            reason,
            raw_output: raw_output.clone(),
        };

        let text = extract_cypher(&raw_output).map_err(malformed)?;

        if !self.config.allow_writes {
            ensure_read_only(&text).map_err(malformed)?;
        }

        let query = GeneratedQuery::new(text, prompt).ok_or_else(|| malformed(ExtractionError::Empty))?;

        debug!(cypher = query.text(), "generated cypher");
        Ok(query)
    }
}
