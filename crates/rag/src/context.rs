use graph::ResultRecord;
use serde_json::Value;

/// Context used in place of records when the query matched nothing.
pub const NO_RECORDS_MARKER: &str = "No matching records were found in the graph for this question.";

/// Serializes records for the answer prompt, bounded so large result sets
/// stay inside the model's input window.
///
/// Records are kept in retrieval order until `max_records` or `max_chars`
/// would be exceeded; the remainder is dropped and counted in a trailing
/// `... N more records omitted` line. The first record is always kept, cut
/// at `max_chars` if it is longer on its own.
#[derive(Debug, Clone)]
pub struct ContextFormatter {
    max_records: usize,
    max_chars: usize,
}

impl Default for ContextFormatter {
    fn default() -> Self {
        Self {
            max_records: 100,
            max_chars: 12_000,
        }
    }
}

impl ContextFormatter {
    pub fn new(max_records: usize, max_chars: usize) -> Self {
        Self {
            max_records: max_records.max(1),
            max_chars: max_chars.max(1),
        }
    }

    pub fn format(&self, records: &[ResultRecord]) -> String {
        if records.is_empty() {
            return NO_RECORDS_MARKER.to_string();
        }

        let mut context = String::new();
        let mut included = 0;

        for record in records.iter().take(self.max_records) {
            let line = format_record(record);
            let needed = line.len() + usize::from(!context.is_empty());

            if context.len() + needed > self.max_chars {
                if included == 0 {
                    context.push_str(truncate_at_char_boundary(&line, self.max_chars));
                    included = 1;
                }
                break;
            }

            if !context.is_empty() {
                context.push('\n');
            }
            context.push_str(&line);
            included += 1;
        }

        let omitted = records.len() - included;
        if omitted > 0 {
            context.push_str(&format!("\n... {} more records omitted", omitted));
        }

        context
    }
}

/// `field: value` pairs in projection order. Strings are written bare.
pub fn format_record(record: &ResultRecord) -> String {
    let pairs: Vec<String> = record
        .fields()
        .map(|(key, value)| format!("{}: {}", key, format_value(value)))
        .collect();
    format!("- {}", pairs.join(", "))
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
