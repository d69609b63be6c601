use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::record::ResultRecord;
use crate::store::{GraphSession, GraphStore, StoreError};

#[derive(Clone)]
pub enum StoreReply {
    Records(Vec<ResultRecord>),
    /// Replies keyed by a substring of the query; unmatched queries get no rows.
    ByQuery(Vec<(&'static str, Vec<ResultRecord>)>),
    Error(String),
    Hang,
}

pub struct MockStore {
    reply: StoreReply,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockStore {
    pub fn new(reply: StoreReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

struct MockSession {
    reply: StoreReply,
    closed: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl GraphStore for MockStore {
    async fn session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            reply: self.reply.clone(),
            closed: self.closed.clone(),
            queries: self.queries.clone(),
        }))
    }
}

#[async_trait]
impl GraphSession for MockSession {
    async fn run(&mut self, query: &str) -> Result<Vec<ResultRecord>, StoreError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.reply {
            StoreReply::Records(records) => Ok(records.clone()),
            StoreReply::ByQuery(replies) => Ok(replies
                .iter()
                .find(|(needle, _)| query.contains(needle))
                .map(|(_, records)| records.clone())
                .unwrap_or_default()),
            StoreReply::Error(message) => Err(StoreError::Query(message.clone())),
            StoreReply::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
