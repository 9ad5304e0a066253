// Summarizer module
use futures::future::try_join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::LlmProvider;
use crate::documents::TextChunk;
use crate::error::ApiError;
use crate::progress::{milestone, ProgressSink};
use crate::prompts::SummaryPrompts;

/// Result of a summarization that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Markdown summary of the whole document
    Summary(String),
    /// Too many chunks: nothing was requested and nothing is produced
    Aborted { chunks: usize, max_chunk: usize },
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("document has no text chunks")]
    EmptyDocument,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Stuff / map-reduce summarization of a chunked document
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    prompts: Arc<SummaryPrompts>,
    max_chunk: usize,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, prompts: Arc<SummaryPrompts>, max_chunk: usize) -> Self {
        Self {
            provider,
            prompts,
            max_chunk,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Summarize `chunks` of the paper titled `title`.
    ///
    /// - one chunk: a single `stuff` request
    /// - `chunks.len() >= max_chunk`: `Aborted`, no request issued
    /// - otherwise: one `map` request per chunk, all in flight at once, then
    ///   a single `reduce` request over the joined map results
    ///
    /// The first failing map request fails the whole call; the remaining
    /// in-flight map requests are dropped and reduce is never issued.
    pub async fn summarize(
        &self,
        title: &str,
        chunks: &[TextChunk],
        progress: &dyn ProgressSink,
    ) -> Result<SummaryOutcome, SummarizeError> {
        match chunks {
            [] => Err(SummarizeError::EmptyDocument),
            [only] => {
                debug!(title, "single chunk, using stuff prompt");
                let prompt = self
                    .prompts
                    .stuff
                    .render(&[("title", title), ("text", &only.content)]);
                let summary = self.provider.complete(&prompt).await?;
                Ok(SummaryOutcome::Summary(summary))
            }
            _ if chunks.len() >= self.max_chunk => {
                warn!(
                    title,
                    chunks = chunks.len(),
                    max_chunk = self.max_chunk,
                    "too many chunks, skipping summarization"
                );
                Ok(SummaryOutcome::Aborted {
                    chunks: chunks.len(),
                    max_chunk: self.max_chunk,
                })
            }
            _ => {
                info!(title, chunks = chunks.len(), "map-reduce summarization");
                let summaries = self.map(title, chunks).await?;
                progress.report(milestone::REDUCING, "Combining chunk summaries...");
                let summary = self.reduce(title, &summaries).await?;
                Ok(SummaryOutcome::Summary(summary))
            }
        }
    }

    /// Summarize every chunk concurrently; results keep chunk order.
    async fn map(&self, title: &str, chunks: &[TextChunk]) -> Result<Vec<String>, ApiError> {
        let requests = chunks.iter().enumerate().map(|(index, chunk)| {
            let prompt = self
                .prompts
                .map
                .render(&[("title", title), ("text", &chunk.content)]);
            async move {
                let summary = self.provider.complete(&prompt).await?;
                debug!(title, chunk = index, chars = summary.len(), "chunk summarized");
                Ok::<_, ApiError>(summary)
            }
        });
        try_join_all(requests).await
    }

    /// Join chunk summaries with a blank line and issue the `reduce` request.
    ///
    /// The combined text is sent as-is, however long it is.
    pub async fn reduce(&self, title: &str, summaries: &[String]) -> Result<String, ApiError> {
        let combined = summaries.join("\n\n");
        let prompt = self
            .prompts
            .reduce
            .render(&[("title", title), ("text", &combined)]);
        self.provider.complete(&prompt).await
    }
}
