#![allow(dead_code)]

use async_trait::async_trait;
use graph::{GraphSession, GraphStore, QueryExecutor, ResultRecord, StoreError};
use rag::{GraphRag, Text2CypherRetriever};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use text2cypher::{GeneratorConfig, LanguageModel, LlmError, PromptSource, QueryGenerator, SchemaContext};

/// Replies in the order given and records every prompt it was sent.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// In-memory store returning canned records or a canned rejection.
pub struct FakeStore {
    reply: Result<Vec<ResultRecord>, String>,
    queries: Arc<Mutex<Vec<String>>>,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
}

impl FakeStore {
    pub fn with_records(records: Vec<ResultRecord>) -> Arc<Self> {
        Self::build(Ok(records))
    }

    pub fn rejecting(message: &str) -> Arc<Self> {
        Self::build(Err(message.to_string()))
    }

    fn build(reply: Result<Vec<ResultRecord>, String>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            queries: Arc::new(Mutex::new(Vec::new())),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    reply: Result<Vec<ResultRecord>, String>,
    queries: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl GraphStore for FakeStore {
    async fn session(&self) -> Result<Box<dyn GraphSession>, StoreError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            reply: self.reply.clone(),
            queries: self.queries.clone(),
            closed: self.closed.clone(),
        }))
    }
}

#[async_trait]
impl GraphSession for FakeSession {
    async fn run(&mut self, query: &str) -> Result<Vec<ResultRecord>, StoreError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.reply.clone().map_err(StoreError::Query)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn movie_schema() -> SchemaContext {
    SchemaContext::new(
        "Node properties:\nPerson {name: STRING, born: INTEGER}\nMovie {title: STRING}\nThe relationships:\n(:Person)-[:ACTED_IN]->(:Movie)",
        vec![],
    )
    .unwrap()
}

pub fn pipeline(llm: Arc<ScriptedModel>, store: Arc<FakeStore>, prompt_source: PromptSource) -> GraphRag {
    let generator = QueryGenerator::new(llm.clone(), prompt_source, GeneratorConfig::default());
    let executor = QueryExecutor::new(store, Duration::from_secs(5));
    let retriever = Arc::new(Text2CypherRetriever::new(generator, executor));

    GraphRag::builder()
        .retriever(retriever)
        .llm(llm)
        .build()
        .unwrap()
}
