use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures talking to a language model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("failed to reach language model: {0}")]
    Transport(String),
    #[error("language model rejected credentials: {0}")]
    Auth(String),
    #[error("language model request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse language model response: {0}")]
    Decode(String),
    #[error("language model returned an empty response")]
    EmptyResponse,
    #[error("language model call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Black-box text completion used by both the query and answer stages.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// Runs one completion under a deadline. The timeout surfaces as [`LlmError::Timeout`].
pub async fn complete_with_timeout(
    llm: &dyn LanguageModel,
    prompt: &str,
    temperature: f32,
    timeout: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(timeout, llm.complete(prompt, temperature)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(timeout)),
    }
}

pub(crate) fn classify_status(status: reqwest::StatusCode, body: String) -> LlmError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        LlmError::Auth(body)
    } else {
        LlmError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions { temperature },
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        if ollama_response.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(ollama_response.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
