use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use tracing::info;

use crate::cache::CachedSummary;
use crate::documents::DocumentService;
use crate::llm::LlmProvider;
use crate::template::PromptTemplate;

/// At most this many papers are put into one question prompt
pub const MAX_QA_PAPERS: usize = 20;

/// Answers a free-form question from the summaries of a set of papers
pub struct LibraryQa {
    provider: Arc<dyn LlmProvider>,
    documents: Arc<DocumentService>,
    prompt: PromptTemplate,
}

impl LibraryQa {
    pub fn new(provider: Arc<dyn LlmProvider>, documents: Arc<DocumentService>, prompt: PromptTemplate) -> Self {
        Self {
            provider,
            documents,
            prompt,
        }
    }

    pub fn prompt_for(&self, question: &str, papers: &[CachedSummary]) -> String {
        let papers_summary = papers
            .iter()
            .take(MAX_QA_PAPERS)
            .map(|p| {
                format!(
                    "[title]:{}\n[link]:{}\n[ai_note_abstract]:{}",
                    p.title, p.link, p.markdown
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        self.prompt
            .render(&[("question", question), ("papers_summary", &papers_summary)])
    }

    /// Ask `question` over `papers`; returns an HTML note
    pub async fn answer(&self, question: &str, papers: &[CachedSummary]) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            anyhow::bail!("No question given");
        }
        let used = papers.len().min(MAX_QA_PAPERS);
        info!(question, papers = used, "answering question");

        let prompt = self.prompt_for(question, papers);
        let markdown = self
            .provider
            .complete(&prompt)
            .await
            .context("LLM generation failed")?;
        let content = self
            .documents
            .markdown_to_html("", &markdown, self.provider.model())
            .await?;

        Ok(format!(
            "<h1>QA LLM: {question} ({model})</h1>\n\
             <div class=\"papers-info\">\n\
             <p>Papers: {used}</p>\n\
             <p>Generated: {time}</p>\n\
             </div>\n\
             <div class=\"merged-summary\">\n{content}\n</div>\n",
            question = question,
            model = self.provider.model(),
            used = used,
            time = Local::now().format("%Y-%m-%d %H:%M:%S"),
            content = content,
        ))
    }
}
