use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A (question, Cypher) pair shown to the model as a few-shot example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub query: String,
}

impl FewShotExample {
    pub fn new(question: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            query: query.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("example {index} has an empty question")]
    EmptyExampleQuestion { index: usize },
    #[error("example {index} has an empty query")]
    EmptyExampleQuery { index: usize },
}

/// Graph description plus few-shot examples fed to the translation prompt.
///
/// Immutable once built. Examples keep the order they were given in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaContext {
    schema_text: String,
    examples: Vec<FewShotExample>,
}

impl SchemaContext {
    pub fn new(
        schema_text: impl Into<String>,
        examples: Vec<FewShotExample>,
    ) -> Result<Self, SchemaError> {
        for (index, example) in examples.iter().enumerate() {
            if example.question.trim().is_empty() {
                return Err(SchemaError::EmptyExampleQuestion { index });
            }
            if example.query.trim().is_empty() {
                return Err(SchemaError::EmptyExampleQuery { index });
            }
        }

        Ok(Self {
            schema_text: schema_text.into(),
            examples,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    pub fn examples(&self) -> &[FewShotExample] {
        &self.examples
    }

    pub fn has_schema(&self) -> bool {
        !self.schema_text.trim().is_empty()
    }
}

/// A Cypher statement produced for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedQuery {
    text: String,
    source_prompt: String,
}

impl GeneratedQuery {
    /// Returns `None` for blank text: an empty query is never a valid result.
    pub fn new(text: impl Into<String>, source_prompt: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self {
            text,
            source_prompt: source_prompt.into(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The exact prompt the model was given.
    pub fn source_prompt(&self) -> &str {
        &self.source_prompt
    }
}
