use crate::error::RagError;

const CONTEXT: &str = "{context}";
const EXAMPLES: &str = "{examples}";
const QUERY_TEXT: &str = "{query_text}";

pub const DEFAULT_RAG_TEMPLATE: &str = r#"You are a helpful assistant answering questions about data stored in a graph database.

INSTRUCTIONS:
- Answer the question using only the records in the context below
- If the context says no matching records were found, say that the database holds no data for the question
- Do not invent records, names or numbers that are not in the context
- Keep your answer concise and factual

CONTEXT:
{context}

EXAMPLES:
{examples}

USER QUESTION: {query_text}

ANSWER:"#;

/// Answer-generation prompt with `{context}`, `{examples}` and `{query_text}` slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagTemplate {
    template: String,
}

impl Default for RagTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_RAG_TEMPLATE.to_string(),
        }
    }
}

impl RagTemplate {
    /// A custom template must keep the context and question slots.
    pub fn new(template: impl Into<String>) -> Result<Self, RagError> {
        let template = template.into();
        for required in [CONTEXT, QUERY_TEXT] {
            if !template.contains(required) {
                return Err(RagError::Configuration(format!(
                    "RAG prompt template is missing the {} placeholder",
                    required
                )));
            }
        }
        Ok(Self { template })
    }

    /// Fills every slot in one pass, so text inside the values is never re-expanded.
    pub fn format(&self, query_text: &str, context: &str, examples: &str) -> String {
        let examples = if examples.trim().is_empty() { "(none)" } else { examples };
        let slots = [(CONTEXT, context), (EXAMPLES, examples), (QUERY_TEXT, query_text)];

        let mut prompt = String::with_capacity(self.template.len() + context.len() + query_text.len());
        let mut rest = self.template.as_str();

        while let Some(pos) = rest.find('{') {
            prompt.push_str(&rest[..pos]);
            rest = &rest[pos..];

            match slots.iter().find(|(slot, _)| rest.starts_with(slot)) {
                Some((slot, value)) => {
                    prompt.push_str(value);
                    rest = &rest[slot.len()..];
                }
                None => {
                    prompt.push('{');
                    rest = &rest[1..];
                }
            }
        }
        prompt.push_str(rest);

        prompt
    }
}
