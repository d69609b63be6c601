//! Reduces free-form model output to a single Cypher statement.
//!
//! Policy, applied in order:
//! 1. If the response holds a fenced code block, the first block's body is used
//!    (an unterminated fence runs to the end of the response).
//! 2. Otherwise a leading label such as `Cypher query:` is dropped and the
//!    statement starts at the first line that opens with a Cypher clause
//!    keyword, running until the next blank line. Lines that only read like
//!    a lead-in (`Use the following query:`, `With this schema ...`) are
//!    skipped.
//! 3. Surrounding backticks and trailing semicolons are removed.
//!
//! The result must be non-empty, start with a clause keyword, hold one
//! statement only, and have balanced brackets and closed string literals.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)(?:```|\z)").expect("valid fence regex"));

static LEADING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:generated\s+)?(?:cypher\s+query|cypher\s+statement|cypher|query)\s*:\s*")
        .expect("valid label regex")
});

const CLAUSE_KEYWORDS: &[&str] = &[
    "MATCH", "OPTIONAL", "WITH", "UNWIND", "CALL", "RETURN", "CREATE", "MERGE", "USE", "SHOW",
    "DETACH", "DELETE", "SET", "REMOVE", "FOREACH", "LOAD", "EXPLAIN", "PROFILE",
];

/// Words that follow a clause keyword in English but not in Cypher.
const LEAD_IN_WORDS: &[&str] = &[
    "the", "this", "that", "these", "those", "following", "below", "above", "me", "my", "your", "our",
    "up", "is", "are", "you", "we", "to", "for", "of", "here",
];

const WRITE_KEYWORDS: &[&str] = &["CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "FOREACH"];

/// Lower-cased name prefixes of procedures that can modify the graph or the database.
const WRITE_PROCEDURES: &[&str] = &[
    "apoc.create.",
    "apoc.merge.",
    "apoc.refactor.",
    "apoc.cypher.runwrite",
    "apoc.cypher.doit",
    "apoc.cypher.runschema",
    "apoc.periodic.",
    "apoc.nodes.delete",
    "apoc.nodes.link",
    "apoc.atomic.",
    "apoc.lock.",
    "apoc.schema.assert",
    "apoc.trigger.",
    "apoc.do.",
    "db.create",
    "db.index.fulltext.create",
    "dbms.",
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("empty or malformed query: model returned no query text")]
    Empty,
    #[error("empty or malformed query: response does not start with a Cypher clause ({0})")]
    NotCypher(String),
    #[error("empty or malformed query: response contains more than one statement")]
    MultipleStatements,
    #[error("empty or malformed query: unbalanced brackets or unterminated string")]
    Unbalanced,
    #[error("query contains write clause {0} but only read queries are allowed")]
    WriteClause(String),
    #[error("query calls write procedure {0} but only read queries are allowed")]
    WriteProcedure(String),
}

/// Pulls one Cypher statement out of a raw model response.
pub fn extract_cypher(raw: &str) -> Result<String, ExtractionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let candidate = match FENCED_BLOCK.captures(raw) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).to_string(),
        None => locate_statement(raw),
    };

    let query = clean(&candidate);
    if query.is_empty() {
        return Err(ExtractionError::Empty);
    }

    if !opens_statement(query.lines().next().unwrap_or("")) {
        return Err(ExtractionError::NotCypher(snippet(&query)));
    }

    let scan = scan(&query)?;
    if scan.has_separator {
        return Err(ExtractionError::MultipleStatements);
    }

    Ok(query)
}

/// Rejects statements that would modify the graph.
pub fn ensure_read_only(query: &str) -> Result<(), ExtractionError> {
    let scan = scan(query)?;

    for (i, word) in scan.keywords.iter().enumerate() {
        if WRITE_KEYWORDS.contains(&word.as_str()) {
            return Err(ExtractionError::WriteClause(word.clone()));
        }
        if word == "LOAD" && scan.keywords.get(i + 1).is_some_and(|next| next == "CSV") {
            return Err(ExtractionError::WriteClause("LOAD CSV".to_string()));
        }
    }

    if let Some(name) = scan.procedures.iter().find(|name| is_write_procedure(name)) {
        return Err(ExtractionError::WriteProcedure(name.clone()));
    }

    Ok(())
}

fn is_write_procedure(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    WRITE_PROCEDURES.iter().any(|prefix| name.starts_with(prefix))
}

fn locate_statement(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();

    let start = lines.iter().position(|line| opens_statement(&strip_line(line)));

    match start {
        Some(start) => {
            let mut statement = Vec::new();
            for (offset, line) in lines[start..].iter().enumerate() {
                if line.trim().is_empty() {
                    break;
                }
                if offset == 0 {
                    statement.push(strip_line(line));
                } else {
                    statement.push(line.trim_end().to_string());
                }
            }
            statement.join("\n")
        }
        // Nothing recognisable: hand back the first line so the caller can report it
        None => lines
            .iter()
            .map(|line| strip_line(line))
            .find(|line| !line.is_empty())
            .unwrap_or_default(),
    }
}

fn strip_line(line: &str) -> String {
    let line = LEADING_LABEL.replace(line, "");
    line.trim().trim_start_matches('`').trim().to_string()
}

fn clean(candidate: &str) -> String {
    let mut query = candidate.trim().trim_matches('`').trim();
    while let Some(stripped) = query.strip_suffix(';') {
        query = stripped.trim_end();
    }
    query.to_string()
}

fn starts_with_clause(text: &str) -> bool {
    let first = text
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .next()
        .unwrap_or("");
    CLAUSE_KEYWORDS.contains(&first.to_ascii_uppercase().as_str())
}

/// A clause keyword that starts real Cypher rather than an English sentence.
fn opens_statement(line: &str) -> bool {
    if !starts_with_clause(line) || line.trim_end().ends_with(':') {
        return false;
    }

    let mut words = line.split_whitespace();
    let first = words.next().unwrap_or("");
    let next = if first.eq_ignore_ascii_case("OPTIONAL") {
        words.nth(1)
    } else {
        words.next()
    };

    match next {
        Some(word) if word.starts_with(|c: char| c.is_ascii_alphabetic()) => {
            let word = word
                .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
                .to_ascii_lowercase();
            !LEAD_IN_WORDS.contains(&word.as_str())
        }
        _ => true,
    }
}

fn snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    match line.char_indices().nth(80) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}

struct Scan {
    /// Upper-cased bare words outside literals, skipping property and label names.
    keywords: Vec<String>,
    /// Dotted names following `CALL`, as written.
    procedures: Vec<String>,
    has_separator: bool,
}

fn scan(query: &str) -> Result<Scan, ExtractionError> {
    let chars: Vec<char> = query.chars().collect();
    let mut keywords: Vec<String> = Vec::new();
    let mut procedures = Vec::new();
    let mut stack = Vec::new();
    let mut has_separator = false;
    let mut prev_sig: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let quote = c;
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '\\' && quote != '`' {
                        i += 2;
                        continue;
                    }
                    if chars[i] == quote {
                        closed = true;
                        break;
                    }
                    i += 1;
                }
                if !closed {
                    return Err(ExtractionError::Unbalanced);
                }
                prev_sig = Some(quote);
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '(' | '[' | '{' => {
                stack.push(c);
                prev_sig = Some(c);
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(ExtractionError::Unbalanced);
                }
                prev_sig = Some(c);
            }
            ';' => {
                has_separator = true;
                prev_sig = Some(c);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if !matches!(prev_sig, Some('.') | Some(':') | Some('$')) {
                    if keywords.last().is_some_and(|last| last == "CALL") {
                        let mut name = word.clone();
                        while chars.get(i) == Some(&'.')
                            && chars.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic() || *c == '_')
                        {
                            let segment_start = i;
                            i += 1;
                            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                                i += 1;
                            }
                            name.extend(&chars[segment_start..i]);
                        }
                        procedures.push(name);
                    }
                    keywords.push(word.to_ascii_uppercase());
                }
                prev_sig = Some('a');
                continue;
            }
            c if c.is_whitespace() => {}
            _ => prev_sig = Some(c),
        }
        i += 1;
    }

    if !stack.is_empty() {
        return Err(ExtractionError::Unbalanced);
    }

    Ok(Scan {
        keywords,
        procedures,
        has_separator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_query_passes_through() {
        let q = extract_cypher("MATCH (p:Person) RETURN p.name").unwrap();
        assert_eq!(q, "MATCH (p:Person) RETURN p.name");
    }

    #[test]
    fn test_fenced_block_with_language_tag() {
        let raw = "Here is the query:\n```cypher\nMATCH (m:Movie)\nRETURN m.title\n```\nIt lists all movies.";
        assert_eq!(extract_cypher(raw).unwrap(), "MATCH (m:Movie)\nRETURN m.title");
    }

    #[test]
    fn test_unterminated_fence() {
        let raw = "```\nMATCH (n) RETURN count(n)";
        assert_eq!(extract_cypher(raw).unwrap(), "MATCH (n) RETURN count(n)");
    }

    #[test]
    fn test_first_fenced_block_wins() {
        let raw = "```cypher\nMATCH (a) RETURN a\n```\nor\n```cypher\nMATCH (b) RETURN b\n```";
        assert_eq!(extract_cypher(raw).unwrap(), "MATCH (a) RETURN a");
    }

    #[test]
    fn test_label_and_trailing_semicolon() {
        let raw = "Cypher query: MATCH (n:Person) RETURN n.name;";
        assert_eq!(extract_cypher(raw).unwrap(), "MATCH (n:Person) RETURN n.name");
    }

    #[test]
    fn test_prose_before_and_after() {
        let raw = "Sure! To answer this you can run:\n\nMATCH (p:Person)-[:ACTED_IN]->(m:Movie)\nWHERE m.year > 2000\nRETURN p.name\n\nThis returns actor names.";
        assert_eq!(
            extract_cypher(raw).unwrap(),
            "MATCH (p:Person)-[:ACTED_IN]->(m:Movie)\nWHERE m.year > 2000\nRETURN p.name"
        );
    }

    #[test]
    fn test_inline_backticks() {
        assert_eq!(
            extract_cypher("`MATCH (n) RETURN n LIMIT 5`").unwrap(),
            "MATCH (n) RETURN n LIMIT 5"
        );
    }

    #[test]
    fn test_lowercase_keyword() {
        assert!(extract_cypher("optional match (n) return n").is_ok());
    }

    #[test]
    fn test_empty_response() {
        assert_eq!(extract_cypher("   \n "), Err(ExtractionError::Empty));
        assert_eq!(extract_cypher("```cypher\n```"), Err(ExtractionError::Empty));
        assert_eq!(extract_cypher(";;"), Err(ExtractionError::Empty));
    }

    #[test]
    fn test_prose_only_is_rejected() {
        let err = extract_cypher("I cannot answer that with the given schema.").unwrap_err();
        assert!(matches!(err, ExtractionError::NotCypher(s) if s.starts_with("I cannot")));
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let err = extract_cypher("MATCH (a) RETURN a; MATCH (b) RETURN b").unwrap_err();
        assert_eq!(err, ExtractionError::MultipleStatements);
    }

    #[test]
    fn test_semicolon_inside_string_is_fine() {
        let q = extract_cypher("MATCH (n) WHERE n.note = 'a;b' RETURN n;").unwrap();
        assert_eq!(q, "MATCH (n) WHERE n.note = 'a;b' RETURN n");
    }

    #[test]
    fn test_unbalanced_rejected() {
        assert_eq!(extract_cypher("MATCH (n RETURN n"), Err(ExtractionError::Unbalanced));
        assert_eq!(extract_cypher("MATCH (n) WHERE n.name = 'x RETURN n"), Err(ExtractionError::Unbalanced));
        assert_eq!(extract_cypher("MATCH (n)-[r]->(m)) RETURN n"), Err(ExtractionError::Unbalanced));
    }

    #[test]
    fn test_read_only_guard() {
        assert!(ensure_read_only("MATCH (n:Person) RETURN n.name").is_ok());
        assert_eq!(
            ensure_read_only("MATCH (n) DETACH DELETE n"),
            Err(ExtractionError::WriteClause("DETACH".to_string()))
        );
        assert_eq!(
            ensure_read_only("merge (n:Tag {name: 'x'}) return n"),
            Err(ExtractionError::WriteClause("MERGE".to_string()))
        );
        assert_eq!(
            ensure_read_only("LOAD CSV FROM 'file:///x.csv' AS row RETURN row"),
            Err(ExtractionError::WriteClause("LOAD CSV".to_string()))
        );
    }

    #[test]
    fn test_lead_in_lines_are_skipped() {
        assert_eq!(
            extract_cypher("Use the following query:\nMATCH (n:Person) RETURN n.name").unwrap(),
            "MATCH (n:Person) RETURN n.name"
        );
        assert_eq!(
            extract_cypher("With this schema you can run:\nMATCH (n) RETURN count(n)").unwrap(),
            "MATCH (n) RETURN count(n)"
        );
        assert_eq!(
            extract_cypher("Match the movie by title\nMATCH (m:Movie {title: 'Heat'}) RETURN m").unwrap(),
            "MATCH (m:Movie {title: 'Heat'}) RETURN m"
        );
    }

    #[test]
    fn test_lead_in_without_query_is_rejected() {
        let err = extract_cypher("Return the names of all people.").unwrap_err();
        assert!(matches!(err, ExtractionError::NotCypher(_)));

        let err = extract_cypher("Call me if you need a query:").unwrap_err();
        assert!(matches!(err, ExtractionError::NotCypher(_)));
    }

    #[test]
    fn test_clause_led_cypher_still_starts_statement() {
        assert!(extract_cypher("WITH a, b RETURN a").is_ok());
        assert!(extract_cypher("RETURN 1").is_ok());
        assert!(extract_cypher("CALL db.labels() YIELD label RETURN label").is_ok());
        assert!(extract_cypher("MATCH (you:Person) RETURN you.name").is_ok());
    }

    #[test]
    fn test_read_only_guard_rejects_write_procedures() {
        assert_eq!(
            ensure_read_only("CALL apoc.create.node(['Hacked'], {}) YIELD node RETURN node"),
            Err(ExtractionError::WriteProcedure("apoc.create.node".to_string()))
        );
        assert_eq!(
            ensure_read_only("CALL apoc.cypher.runWrite('MATCH (n) DETACH DELETE n', {}) YIELD value RETURN value"),
            Err(ExtractionError::WriteProcedure("apoc.cypher.runWrite".to_string()))
        );
        assert!(matches!(
            ensure_read_only("MATCH (n) CALL apoc.periodic.iterate('x', 'y', {}) YIELD batches RETURN batches"),
            Err(ExtractionError::WriteProcedure(_))
        ));
    }

    #[test]
    fn test_read_only_guard_allows_read_procedures() {
        assert!(ensure_read_only("CALL db.labels() YIELD label RETURN label").is_ok());
        assert!(ensure_read_only("CALL apoc.meta.schema() YIELD value RETURN value").is_ok());
        assert!(ensure_read_only("CALL { MATCH (n) RETURN n } RETURN n").is_ok());
    }

    #[test]
    fn test_read_only_guard_ignores_names_and_literals() {
        assert!(ensure_read_only("MATCH (n:Setting) WHERE n.set = 'CREATE' RETURN n.delete").is_ok());
        assert!(ensure_read_only("MATCH (n) WHERE n.x = $set RETURN n").is_ok());
        assert!(ensure_read_only("MATCH (n:`CREATE`) RETURN n").is_ok());
    }
}
