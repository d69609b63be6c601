use async_trait::async_trait;
use neo4rs::{Graph, Query, Row};
use serde_json::{Map, Value};
use tracing::debug;

use crate::projection::{order_fields, projection_columns};
use crate::record::ResultRecord;
use crate::store::{GraphSession, GraphStore, StoreError};

/// Neo4j-backed store.
///
/// `Graph` is a connection pool; each session borrows a pooled connection per
/// query and hands it back when the row stream is dropped.
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, StoreError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self::new(graph))
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        Ok(Box::new(Neo4jSession {
            graph: Some(self.graph.clone()),
        }))
    }
}

pub struct Neo4jSession {
    graph: Option<Graph>,
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(&mut self, query: &str) -> Result<Vec<ResultRecord>, StoreError> {
        let graph = self.graph
            .as_ref()
            .ok_or_else(|| StoreError::Connection("session already closed".to_string()))?;

        let mut result = graph
            .execute(Query::new(query.to_string()))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let columns = projection_columns(query);
        let mut records = Vec::new();
        while let Some(row) = result.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            records.push(record_from_row(&row, &columns)?);
        }

        debug!(record_count = records.len(), "neo4j query drained");
        Ok(records)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.graph = None;
        Ok(())
    }
}

/// Neo4j rows are hash maps, so field order is restored from the query's
/// projection rather than taken from the row.
fn record_from_row(row: &Row, columns: &[String]) -> Result<ResultRecord, StoreError> {
    let fields: Map<String, Value> = row.to().map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(order_fields(fields, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo4rs::{BoltList, BoltType};
    use serde_json::json;

    fn row(pairs: &[(&str, BoltType)]) -> Row {
        let mut fields = BoltList::new();
        let mut data = BoltList::new();
        for (name, value) in pairs {
            fields.push(BoltType::from(*name));
            data.push(value.clone());
        }
        Row::new(fields, data)
    }

    #[test]
    fn test_row_fields_follow_projection_order() {
        let query = "MATCH (m:Movie)<-[:ACTED_IN]-(p) \
                     RETURN m.title AS title, m.released AS released, count(p) AS cast_size, m.tagline AS tagline";
        let columns = projection_columns(query);

        for _ in 0..20 {
            let row = row(&[
                ("tagline", BoltType::from("Welcome to the Real World")),
                ("cast_size", BoltType::from(5i64)),
                ("title", BoltType::from("The Matrix")),
                ("released", BoltType::from(1999i64)),
            ]);
            let record = record_from_row(&row, &columns).unwrap();

            let keys: Vec<&str> = record.fields().map(|(k, _)| k).collect();
            assert_eq!(keys, vec!["title", "released", "cast_size", "tagline"]);
            assert_eq!(record.get("released"), Some(&json!(1999)));
        }
    }

    #[test]
    fn test_unknown_projection_gives_stable_sorted_order() {
        let columns = projection_columns("MATCH (n) RETURN *");

        for _ in 0..20 {
            let row = row(&[("n", BoltType::from(1i64)), ("m", BoltType::from(2i64)), ("a", BoltType::from(3i64))]);
            let record = record_from_row(&row, &columns).unwrap();
            let keys: Vec<&str> = record.fields().map(|(k, _)| k).collect();
            assert_eq!(keys, vec!["a", "m", "n"]);
        }
    }
}
