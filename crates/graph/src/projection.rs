use serde_json::{Map, Value};

use crate::record::ResultRecord;

/// Column names of the final `RETURN` of a query, in the order the server
/// projects them.
///
/// Unaliased items keep their expression text, as Neo4j names them. An empty
/// list means the columns cannot be told from the text (`RETURN *`, no
/// `RETURN` at all, procedure calls that only `YIELD`).
pub(crate) fn projection_columns(query: &str) -> Vec<String> {
    let masked = mask_literals(query);
    let depth = nesting_depth(&masked);
    let words = top_level_words(&masked, &depth);

    let Some(ret) = words.iter().rposition(|w| w.upper == "RETURN") else {
        return Vec::new();
    };

    let mut body_start = words[ret].end;
    let mut rest = &words[ret + 1..];
    if rest.first().is_some_and(|w| w.upper == "DISTINCT") {
        body_start = rest[0].end;
        rest = &rest[1..];
    }
    let body_end = rest
        .iter()
        .find(|w| matches!(w.upper.as_str(), "ORDER" | "SKIP" | "LIMIT" | "UNION"))
        .map(|w| w.start)
        .unwrap_or(query.len());

    let mut items = Vec::new();
    let mut item_start = body_start;
    for i in body_start..body_end {
        if masked[i] == b',' && depth[i] == 0 {
            items.push((item_start, i));
            item_start = i + 1;
        }
    }
    items.push((item_start, body_end));

    let mut columns = Vec::with_capacity(items.len());
    for (start, end) in items {
        let alias = words
            .iter()
            .rev()
            .find(|w| w.start >= start && w.end <= end && w.upper == "AS");
        let name = match alias {
            Some(word) => query[word.end..end].trim().trim_matches('`'),
            None => query[start..end].trim(),
        };
        if name.is_empty() || name.starts_with('*') {
            return Vec::new();
        }
        columns.push(name.to_string());
    }
    columns
}

/// Builds a record whose fields follow `columns`; anything the columns do not
/// name comes after them, sorted by key.
pub(crate) fn order_fields(mut fields: Map<String, Value>, columns: &[String]) -> ResultRecord {
    let mut ordered = Map::with_capacity(fields.len());
    for column in columns {
        if let Some(value) = fields.remove(column) {
            ordered.insert(column.clone(), value);
        }
    }

    let mut rest: Vec<(String, Value)> = fields.into_iter().collect();
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    ordered.extend(rest);

    ResultRecord::from(ordered)
}

struct Word {
    start: usize,
    end: usize,
    upper: String,
}

/// Blanks out the inside of quoted text and comments so brackets, commas and
/// keywords in them are not seen. Byte offsets are unchanged.
fn mask_literals(query: &str) -> Vec<u8> {
    let mut out = query.as_bytes().to_vec();
    let bytes = query.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && quote != b'`' && i + 1 < bytes.len() {
                        out[i] = b'_';
                        i += 1;
                    }
                    out[i] = b'_';
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    out[i] = b' ';
                    i += 1;
                }
                if i < bytes.len() {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 2;
                }
            }
            _ => i += 1,
        }
    }
    out
}

/// Bracket depth at every byte. Brackets themselves sit at the outer depth.
fn nesting_depth(masked: &[u8]) -> Vec<usize> {
    let mut depth = Vec::with_capacity(masked.len());
    let mut current = 0usize;
    for &b in masked {
        match b {
            b'(' | b'[' | b'{' => {
                depth.push(current);
                current += 1;
            }
            b')' | b']' | b'}' => {
                current = current.saturating_sub(1);
                depth.push(current);
            }
            _ => depth.push(current),
        }
    }
    depth
}

fn top_level_words(masked: &[u8], depth: &[usize]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut i = 0;

    while i < masked.len() {
        let b = masked[i];
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < masked.len() && (masked[i].is_ascii_alphanumeric() || masked[i] == b'_') {
                i += 1;
            }
            let qualified = start > 0 && matches!(masked[start - 1], b'.' | b'$' | b':');
            if depth[start] == 0 && !qualified {
                words.push(Word {
                    start,
                    end: i,
                    upper: String::from_utf8_lossy(&masked[start..i]).to_ascii_uppercase(),
                });
            }
        } else if b.is_ascii_digit() {
            while i < masked.len() && (masked[i].is_ascii_alphanumeric() || masked[i] == b'.') {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    words
}
