mod config;
mod handlers;
mod metrics;
mod retry;
mod session;

use anyhow::{Context, Result};
use graph::{introspect_schema, GraphStore, Neo4jStore, QueryExecutor};
use rag::{ContextFormatter, GraphRag, RagTemplate, Text2CypherRetriever};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use text2cypher::{
    AzureOpenAiClient, FewShotExample, GeneratorConfig, LanguageModel, OllamaClient, PromptSource, QueryGenerator,
    SchemaContext,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LlmConfig, LlmProvider, PipelineConfig};
use crate::handlers::AppState;
use crate::metrics::Metrics;
use crate::retry::StartupBackoff;
use crate::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let config = AppConfig::from_env().inspect_err(|e| error!(error = %e, "invalid configuration"))?;

    // Step 1: Connect to Neo4j, waiting while it comes up
    let backoff = StartupBackoff::from_config(&config.retry);
    let neo4j = &config.neo4j;
    let store = backoff
        .wait_for("neo4j", || async move {
            let store = Neo4jStore::connect(&neo4j.uri, &neo4j.username, neo4j.password.expose()).await?;
            store.verify_connectivity().await?;
            Ok::<_, graph::StoreError>(store)
        })
        .await
        .with_context(|| format!("failed to connect to Neo4j at {}", neo4j.uri))?;
    let store: Arc<dyn GraphStore> = Arc::new(store);
    info!(uri = %neo4j.uri, "connected to Neo4j");

    // Step 2: Schema, examples and prompts
    let schema_text = load_schema(&config.pipeline, store.as_ref()).await?;
    let examples = load_examples(config.pipeline.examples_file.as_deref())?;
    let context = SchemaContext::new(schema_text, examples).context("invalid few-shot examples")?;
    let custom_prompt = read_optional(config.pipeline.text2cypher_prompt_file.as_deref())?;
    let template = match read_optional(config.pipeline.rag_prompt_file.as_deref())? {
        Some(text) => RagTemplate::new(text)?,
        None => RagTemplate::default(),
    };

    // Step 3: Wire the pipeline
    let llm = build_llm(&config.llm);
    info!(model = llm.model_name(), "using language model");

    let generator = QueryGenerator::new(
        llm.clone(),
        PromptSource::from_parts(context, custom_prompt),
        GeneratorConfig {
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.timeout_secs),
            allow_writes: config.pipeline.allow_write_queries,
        },
    );
    let executor = QueryExecutor::new(store.clone(), Duration::from_secs(config.pipeline.query_timeout_secs));
    let retriever = Arc::new(Text2CypherRetriever::new(generator, executor));

    let rag = GraphRag::builder()
        .retriever(retriever)
        .llm(llm)
        .template(template)
        .context_formatter(ContextFormatter::new(
            config.pipeline.max_context_records,
            config.pipeline.max_context_chars,
        ))
        .temperature(config.llm.temperature)
        .timeout(Duration::from_secs(config.llm.timeout_secs))
        .build()?;

    let state = AppState {
        rag: Arc::new(rag),
        store,
        sessions: Arc::new(SessionStore::new(config.sessions.max_sessions, config.sessions.max_messages)),
        metrics: Metrics::new(),
    };

    // Build router
    let app = handlers::router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;

    info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_llm(config: &LlmConfig) -> Arc<dyn LanguageModel> {
    match &config.provider {
        LlmProvider::Azure {
            endpoint,
            api_key,
            api_version,
            model_name,
        } => Arc::new(AzureOpenAiClient::new(
            endpoint.clone(),
            api_key.expose().to_string(),
            api_version.clone(),
            model_name.clone(),
        )),
        LlmProvider::Ollama { base_url, model } => Arc::new(OllamaClient::new(base_url.clone(), model.clone())),
    }
}

/// A schema file wins; otherwise the live database is introspected when allowed.
async fn load_schema(config: &PipelineConfig, store: &dyn GraphStore) -> Result<String> {
    if let Some(text) = read_optional(config.schema_file.as_deref())? {
        return Ok(text);
    }

    if !config.schema_discovery {
        warn!("no graph schema configured; queries will be generated without one");
        return Ok(String::new());
    }

    introspect_schema(store).await.or_else(|e| {
        warn!(error = %e, "schema discovery failed; continuing without a schema");
        Ok(String::new())
    })
}

fn load_examples(path: Option<&Path>) -> Result<Vec<FewShotExample>> {
    match read_optional(path)? {
        Some(json) => serde_json::from_str(&json)
            .with_context(|| format!("failed to parse examples file {}", path.map(|p| p.display().to_string()).unwrap_or_default())),
        None => Ok(Vec::new()),
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("failed to read {}", path.display())),
        None => Ok(None),
    }
}
