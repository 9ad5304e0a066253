use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::info;

use crate::cache::CachedSummary;
use crate::documents::DocumentService;
use crate::llm::LlmProvider;
use crate::template::PromptTemplate;

/// Merges the summaries of several papers into one literature review
pub struct LiteratureReview {
    provider: Arc<dyn LlmProvider>,
    documents: Arc<DocumentService>,
    prompt: PromptTemplate,
}

impl LiteratureReview {
    pub fn new(provider: Arc<dyn LlmProvider>, documents: Arc<DocumentService>, prompt: PromptTemplate) -> Self {
        Self {
            provider,
            documents,
            prompt,
        }
    }

    /// Build the merge prompt for `papers`
    pub fn prompt_for(&self, papers: &[CachedSummary]) -> String {
        let summaries = papers
            .iter()
            .map(|p| format!("Title: {}\nLink: {}\nSummary: {}\n", p.title, p.link, p.markdown))
            .collect::<Vec<_>>()
            .join("\n---\n\n");
        let count = papers.len().to_string();
        self.prompt
            .render(&[("papers_count", &count), ("summaries", &summaries)])
    }

    /// Generate the review and return it as an HTML note
    pub async fn generate(&self, papers: &[CachedSummary]) -> Result<String> {
        if papers.is_empty() {
            anyhow::bail!("No paper summaries to review");
        }
        info!("Generating literature review over {} papers", papers.len());

        let prompt = self.prompt_for(papers);
        let markdown = self
            .provider
            .complete(&prompt)
            .await
            .context("LLM generation failed")?;

        let content = self
            .documents
            .markdown_to_html("", &markdown, self.provider.model())
            .await?;

        Ok(review_note(self.provider.model(), papers.len(), Local::now(), &content))
    }
}

fn review_note(model: &str, papers: usize, generated_at: DateTime<Local>, content: &str) -> String {
    format!(
        "<h1>Literature Review</h1>\n\
         <h2>AI Generated Review ({model})</h2>\n\
         <div class=\"papers-info\">\n\
         <p>Papers: {papers}</p>\n\
         <p>Generated: {time}</p>\n\
         </div>\n\
         <div class=\"merged-summary\">\n{content}\n</div>\n",
        model = model,
        papers = papers,
        time = generated_at.format("%Y-%m-%d %H:%M:%S"),
        content = content,
    )
}
