use graph::ResultRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Records fetched for one question plus how they were fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub items: Vec<ResultRecord>,
    /// Always holds `query`, the exact Cypher text that was executed.
    pub metadata: Map<String, Value>,
}

impl RetrievalResult {
    pub fn new(query: &str, items: Vec<ResultRecord>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("query".to_string(), Value::String(query.to_string()));
        metadata.insert("record_count".to_string(), Value::from(items.len()));
        Self { items, metadata }
    }

    pub fn query(&self) -> Option<&str> {
        self.metadata.get("query").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    /// Present only when the caller asked for the context to be kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_result: Option<RetrievalResult>,
}

/// Per-call knobs for [`GraphRag::search_with`](crate::GraphRag::search_with).
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub return_context: bool,
    /// Free text rendered into the answer prompt's examples section.
    pub examples: String,
}
