use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LlmProvider;
use crate::error::{check_status, decode_json, ApiError};

/// Remote LLM provider using OpenAI-compatible HTTP API
pub struct RemoteLlmProvider {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    /// `base_url` is the API root (e.g. `https://api.openai.com/v1`);
    /// trailing slashes are dropped.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &common::LlmConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            config.base_url.clone(),
            config.resolve_api_key()?,
            config.model_name.clone(),
            config.temperature(),
        ))
    }

    /// Share one connection pool between providers
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let endpoint = self.endpoint();

        let req_body = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "sending chat completion");

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&req_body)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                endpoint: self.base_url.clone(),
                source: e,
            })?;

        let response = check_status(response, &self.base_url).await?;
        let resp_body: ChatResponse = decode_json(response, &endpoint).await?;

        let choice = resp_body
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or(ApiError::MissingChoices)?;

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(ApiError::EmptyCompletion),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
