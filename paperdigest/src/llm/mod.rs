use crate::error::ApiError;

/// Core trait for chat-completion backends
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `prompt` as a single user message and return the reply text.
    ///
    /// One request, no streaming and no retry.
    async fn complete(&self, prompt: &str) -> Result<String, ApiError>;

    /// Model identifier, used in note headings
    fn model(&self) -> &str;
}

pub mod remote;
pub mod summarizer;
