use anyhow::{anyhow, bail, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Everything the binary needs, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub neo4j: Neo4jConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub retry: RetryConfig,
    pub sessions: SessionConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    pub password: Secret,
}

#[derive(Debug, Clone)]
pub enum LlmProvider {
    Azure {
        endpoint: String,
        api_key: Secret,
        api_version: String,
        model_name: String,
    },
    Ollama {
        base_url: String,
        model: String,
    },
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub query_timeout_secs: u64,
    pub schema_file: Option<PathBuf>,
    pub schema_discovery: bool,
    pub examples_file: Option<PathBuf>,
    pub text2cypher_prompt_file: Option<PathBuf>,
    pub rag_prompt_file: Option<PathBuf>,
    pub max_context_records: usize,
    pub max_context_chars: usize,
    pub allow_write_queries: bool,
}

/// Backoff for the startup connectivity check. Questions are never retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

/// Limits on the in-memory conversation logs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_sessions: usize,
    pub max_messages: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl AppConfig {
    /// Reads the process environment. `main` loads `.env` into it beforehand.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let neo4j = Neo4jConfig {
            uri: env.required("NEO4J_URI")?,
            username: env.required("NEO4J_USERNAME")?,
            password: Secret(env.required("NEO4J_PASSWORD")?),
        };

        let provider = match env.optional("LLM_PROVIDER").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("azure") => LlmProvider::Azure {
                endpoint: env.required("AZURE_OPENAI_ENDPOINT")?,
                api_key: Secret(env.required("AZURE_OPENAI_API_KEY")?),
                api_version: env.required("AZURE_OPENAI_API_KEY_VERSION")?,
                model_name: env.required("AZURE_OPENAI_MODEL_NAME")?,
            },
            Some("ollama") => LlmProvider::Ollama {
                base_url: env.optional("OLLAMA_BASE_URL").unwrap_or_else(|| "http://localhost:11434".to_string()),
                model: env.optional("OLLAMA_MODEL").unwrap_or_else(|| "llama3".to_string()),
            },
            Some(other) => bail!("invalid value for LLM_PROVIDER: {other} (expected azure or ollama)"),
        };

        let llm = LlmConfig {
            provider,
            temperature: env.parse_or("LLM_TEMPERATURE", 0.0)?,
            timeout_secs: env.parse_or("LLM_TIMEOUT_SECS", 60)?,
        };

        let pipeline = PipelineConfig {
            query_timeout_secs: env.parse_or("QUERY_TIMEOUT_SECS", 30)?,
            schema_file: env.optional("GRAPH_SCHEMA_FILE").map(PathBuf::from),
            schema_discovery: env.flag_or("GRAPH_SCHEMA_DISCOVERY", true)?,
            examples_file: env.optional("TEXT2CYPHER_EXAMPLES_FILE").map(PathBuf::from),
            text2cypher_prompt_file: env.optional("TEXT2CYPHER_PROMPT_FILE").map(PathBuf::from),
            rag_prompt_file: env.optional("RAG_PROMPT_FILE").map(PathBuf::from),
            max_context_records: env.parse_or("RAG_MAX_CONTEXT_RECORDS", 100)?,
            max_context_chars: env.parse_or("RAG_MAX_CONTEXT_CHARS", 12_000)?,
            allow_write_queries: env.flag_or("ALLOW_WRITE_QUERIES", false)?,
        };

        let retry = RetryConfig {
            max_retries: env.parse_or("STARTUP_MAX_RETRIES", 3)?,
            initial_backoff_ms: env.parse_or("STARTUP_BACKOFF_MS", 1000)?,
            max_backoff_ms: env.parse_or("STARTUP_MAX_BACKOFF_MS", 10_000)?,
        };

        let sessions = SessionConfig {
            max_sessions: env.parse_or("SESSION_MAX_ENTRIES", 10_000)?,
            max_messages: env.parse_or("SESSION_MAX_MESSAGES", 200)?,
        };

        let server = ServerConfig {
            bind_addr: env.optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        Ok(Self {
            neo4j,
            llm,
            pipeline,
            retry,
            sessions,
            server,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| anyhow!("missing required environment variable {key}"))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow!("invalid value for {key}: {raw} ({e})")),
        }
    }

    fn flag_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.optional(key).map(|v| v.to_lowercase()).as_deref() {
            None => Ok(default),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some("false" | "0" | "no" | "off") => Ok(false),
            Some(other) => bail!("invalid value for {key}: {other} (expected true or false)"),
        }
    }
}
