pub mod context;
pub mod error;
pub mod graph_rag;
pub mod retriever;
pub mod template;
pub mod types;

pub use context::{ContextFormatter, NO_RECORDS_MARKER};
pub use error::{PipelineStage, RagError, RetrievalError, TranslationFailure};
pub use graph_rag::{GraphRag, GraphRagBuilder};
pub use retriever::Text2CypherRetriever;
pub use template::{RagTemplate, DEFAULT_RAG_TEMPLATE};
pub use types::{RagAnswer, RetrievalResult, SearchOptions};
