use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{classify_status, LanguageModel, LlmError};

/// Chat-completions client for an Azure OpenAI deployment.
///
/// The deployment name doubles as the model identifier.
#[derive(Clone)]
pub struct AzureOpenAiClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl AzureOpenAiClient {
    pub fn new(endpoint: String, api_key: String, api_version: String, deployment: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version,
            deployment,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        let request = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
        };

        let response = self.client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }
}
