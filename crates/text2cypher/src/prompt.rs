use crate::schema::SchemaContext;

/// Placeholder replaced by the user question in custom prompts.
pub const QUERY_TEXT_PLACEHOLDER: &str = "{query_text}";

/// Where the translation prompt comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// Built from the schema text and few-shot examples.
    Schema(SchemaContext),
    /// Used as given; only `{query_text}` is substituted. Schema and examples are not merged in.
    Custom(String),
}

impl PromptSource {
    /// A custom prompt, when given, replaces the schema-driven one entirely.
    pub fn from_parts(context: SchemaContext, custom_prompt: Option<String>) -> Self {
        match custom_prompt {
            Some(template) => PromptSource::Custom(template),
            None => PromptSource::Schema(context),
        }
    }

    pub fn render(&self, question: &str) -> String {
        match self {
            PromptSource::Schema(context) => build_text2cypher_prompt(context, question),
            PromptSource::Custom(template) => template.replace(QUERY_TEXT_PLACEHOLDER, question),
        }
    }
}

pub fn build_text2cypher_prompt(context: &SchemaContext, question: &str) -> String {
    let mut prompt = String::from(
        r#"Task: Generate a Cypher statement for querying a Neo4j graph database from a user input.

INSTRUCTIONS:
- Translate the user input into exactly one read-only Cypher statement
- Use only the node labels, relationship types and properties given in the schema
- Do not include triple backticks, explanations or any text other than the Cypher statement
"#,
    );

    if context.has_schema() {
        prompt.push_str("\nSchema:\n");
        prompt.push_str(context.schema_text());
        prompt.push('\n');
    }

    if !context.examples().is_empty() {
        prompt.push_str("\nExamples:\n");
        for example in context.examples() {
            prompt.push_str(&format!(
                "USER INPUT: {}\nCYPHER QUERY: {}\n",
                example.question, example.query
            ));
        }
    }

    prompt.push_str(&format!("\nInput:\n{}\n\nCypher query:", question));

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FewShotExample;

    fn context() -> SchemaContext {
        SchemaContext::new(
            "Node properties:\nPerson {name: STRING}",
            vec![
                FewShotExample::new("How many people?", "MATCH (p:Person) RETURN count(p)"),
                FewShotExample::new("List names", "MATCH (p:Person) RETURN p.name"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let prompt = build_text2cypher_prompt(&context(), "Who is Alice?");

        let task = prompt.find("Task:").unwrap();
        let schema = prompt.find("Schema:\nNode properties:").unwrap();
        let first = prompt.find("USER INPUT: How many people?").unwrap();
        let second = prompt.find("USER INPUT: List names").unwrap();
        let input = prompt.find("Input:\nWho is Alice?").unwrap();

        assert!(task < schema && schema < first && first < second && second < input);
        assert!(prompt.ends_with("Cypher query:"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let prompt = build_text2cypher_prompt(&SchemaContext::empty(), "Who is Alice?");
        assert!(!prompt.contains("Schema:"));
        assert!(!prompt.contains("Examples:"));
        assert!(prompt.contains("Input:\nWho is Alice?"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_text2cypher_prompt(&context(), "q");
        let b = build_text2cypher_prompt(&context(), "q");
        assert_eq!(a, b);
    }

    #[test]
    fn test_custom_prompt_only_substitutes_question() {
        let source = PromptSource::Custom("Q={query_text}; again {query_text}".to_string());
        assert_eq!(source.render("hi"), "Q=hi; again hi");

        let verbatim = PromptSource::Custom("fixed prompt".to_string());
        assert_eq!(verbatim.render("ignored"), "fixed prompt");
    }
}
