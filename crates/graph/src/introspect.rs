use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::record::ResultRecord;
use crate::store::{GraphSession, GraphStore, StoreError};

const NODE_PROPERTIES_QUERY: &str = r#"
CALL db.schema.nodeTypeProperties() YIELD nodeLabels, propertyName, propertyTypes
RETURN nodeLabels, propertyName, propertyTypes
"#;

const REL_PROPERTIES_QUERY: &str = r#"
CALL db.schema.relTypeProperties() YIELD relType, propertyName, propertyTypes
RETURN relType, propertyName, propertyTypes
"#;

const RELATIONSHIPS_QUERY: &str = r#"
MATCH (a)-[r]->(b)
WITH a, r, b LIMIT 10000
RETURN DISTINCT labels(a) AS from, type(r) AS rel, labels(b) AS to
"#;

/// Reads the graph's labels, relationship types and properties and renders
/// them as schema text for the translation prompt.
pub async fn introspect_schema(store: &dyn GraphStore) -> Result<String, StoreError> {
    let mut session = store.session().await?;
    let outcome = read_schema(session.as_mut()).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "failed to close graph session after schema introspection");
    }
    let schema = outcome?;
    info!(chars = schema.len(), "discovered graph schema");
    Ok(schema)
}

async fn read_schema(session: &mut dyn GraphSession) -> Result<String, StoreError> {
    let node_rows = session.run(NODE_PROPERTIES_QUERY).await?;
    let rel_rows = session.run(REL_PROPERTIES_QUERY).await?;
    let pattern_rows = session.run(RELATIONSHIPS_QUERY).await?;

    let mut nodes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in &node_rows {
        let label = string_list(row.get("nodeLabels")).join(":");
        if label.is_empty() {
            continue;
        }
        let props = nodes.entry(label).or_default();
        if let Some(prop) = property(row) {
            props.push(prop);
        }
    }

    let mut rels: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in &rel_rows {
        let Some(rel_type) = row.get("relType").and_then(Value::as_str) else {
            continue;
        };
        let rel_type = rel_type.trim_start_matches(':').trim_matches('`').to_string();
        let props = rels.entry(rel_type).or_default();
        if let Some(prop) = property(row) {
            props.push(prop);
        }
    }

    let mut patterns = BTreeSet::new();
    for row in &pattern_rows {
        let from = string_list(row.get("from")).join(":");
        let to = string_list(row.get("to")).join(":");
        if let Some(rel) = row.get("rel").and_then(Value::as_str) {
            patterns.insert(format!("(:{})-[:{}]->(:{})", from, rel, to));
        }
    }

    let mut schema = String::from("Node properties:\n");
    for (label, props) in &nodes {
        schema.push_str(&format!("{} {{{}}}\n", label, props.join(", ")));
    }

    schema.push_str("Relationship properties:\n");
    for (rel_type, props) in rels.iter().filter(|(_, props)| !props.is_empty()) {
        schema.push_str(&format!("{} {{{}}}\n", rel_type, props.join(", ")));
    }

    schema.push_str("The relationships:\n");
    for pattern in &patterns {
        schema.push_str(pattern);
        schema.push('\n');
    }

    Ok(schema.trim_end().to_string())
}

fn property(row: &ResultRecord) -> Option<String> {
    let name = row.get("propertyName").and_then(Value::as_str)?;
    let types: Vec<String> = string_list(row.get("propertyTypes"))
        .into_iter()
        .map(|t| t.to_uppercase())
        .collect();
    Some(format!("{}: {}", name, types.join("|")))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
