use graph::ExecutionError;
use serde::Serialize;
use text2cypher::{GenerationError, LlmError};
use thiserror::Error;

/// Where in a single question/answer turn a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Validating,
    GeneratingQuery,
    ExecutingQuery,
    FormattingAnswer,
}

/// The question could not be turned into data: either no usable query came
/// back from the model, or the store rejected the query it produced.
#[derive(Debug, Error)]
pub enum TranslationFailure {
    #[error("could not translate question into a Cypher query: {0}")]
    Generation(#[source] GenerationError),
    #[error("could not retrieve data: {0}")]
    Execution(#[source] ExecutionError),
}

impl TranslationFailure {
    /// The offending Cypher text, when a query was produced.
    pub fn query(&self) -> Option<&str> {
        match self {
            TranslationFailure::Generation(_) => None,
            TranslationFailure::Execution(e) => Some(&e.query),
        }
    }

    pub fn raw_output(&self) -> Option<&str> {
        match self {
            TranslationFailure::Generation(e) => e.raw_output(),
            TranslationFailure::Execution(_) => None,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        match self {
            TranslationFailure::Generation(_) => PipelineStage::GeneratingQuery,
            TranslationFailure::Execution(_) => PipelineStage::ExecutingQuery,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid search input: {0}")]
    Validation(String),
    #[error(transparent)]
    Translation(#[from] TranslationFailure),
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("invalid question: {0}")]
    Validation(String),

    #[error(transparent)]
    Translation(TranslationFailure),

    #[error("answer generation failed: {source}")]
    Model {
        #[source]
        source: LlmError,
    },

    /// The orchestrator was built with missing or inconsistent parts.
    #[error("RAG pipeline misconfigured: {0}")]
    Configuration(String),
}

impl From<RetrievalError> for RagError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Validation(message) => RagError::Validation(message),
            RetrievalError::Translation(failure) => RagError::Translation(failure),
        }
    }
}

impl RagError {
    /// Stable identifier for logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Validation(_) => "validation",
            RagError::Translation(TranslationFailure::Generation(_)) => "generation",
            RagError::Translation(TranslationFailure::Execution(_)) => "execution",
            RagError::Model { .. } => "model",
            RagError::Configuration(_) => "configuration",
        }
    }

    /// The stage that failed. Configuration errors happen before any turn starts.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            RagError::Validation(_) => Some(PipelineStage::Validating),
            RagError::Translation(failure) => Some(failure.stage()),
            RagError::Model { .. } => Some(PipelineStage::FormattingAnswer),
            RagError::Configuration(_) => None,
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            RagError::Translation(failure) => failure.query(),
            _ => None,
        }
    }

    /// Text shown to the user in place of an answer.
    pub fn user_message(&self) -> &'static str {
        match self {
            RagError::Validation(_) => "Please enter a question about the database.",
            RagError::Translation(TranslationFailure::Generation(_)) => {
                "Sorry, I could not translate your question into a database query. Try rephrasing it."
            }
            RagError::Translation(TranslationFailure::Execution(_)) => {
                "Sorry, I could not retrieve data for your question."
            }
            RagError::Model { .. } => "Sorry, the language model failed to produce an answer.",
            RagError::Configuration(_) => "The question answering service is not configured correctly.",
        }
    }
}
