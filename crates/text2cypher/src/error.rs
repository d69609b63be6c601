use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::llm::LlmError;

/// The model could not be reached, or its answer did not reduce to a usable query.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("query generation failed: {0}")]
    Model(#[source] LlmError),

    #[error("{reason}")]
    Malformed {
        #[source]
        reason: ExtractionError,
        /// Unmodified model output, kept for diagnosis.
        raw_output: String,
    },
}

impl GenerationError {
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            GenerationError::Model(_) => None,
            GenerationError::Malformed { raw_output, .. } => Some(raw_output),
        }
    }
}
