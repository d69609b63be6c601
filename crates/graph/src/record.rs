use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row returned by a query, with fields in projection order.
///
/// Field order is insertion order; stores are responsible for inserting in
/// the order the query projects its columns.
///
/// Values are carried as-is; nothing downstream interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRecord {
    fields: Map<String, Value>,
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for ResultRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projection_order_is_kept() {
        let record = ResultRecord::from_pairs([
            ("zeta", json!(1)),
            ("alpha", json!("a")),
            ("mid", json!(null)),
        ]);
        let keys: Vec<&str> = record.fields().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"zeta":1,"alpha":"a","mid":null}"#);
    }
}
