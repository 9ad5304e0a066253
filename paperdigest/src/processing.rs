use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cache::{CachedSummary, SummaryCache};
use crate::documents::DocumentService;
use crate::llm::summarizer::{SummaryOutcome, Summarizer};
use crate::progress::{milestone, LogProgress, ProgressSink};
use crate::source::PaperSource;

/// How a single paper run ended, short of an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// A new summary note was generated and saved
    Saved,
    /// A cached summary was attached without calling the LLM
    FromCache,
    /// The paper already carries a summary note
    AlreadySummarized,
    /// The paper has too many chunks to be summarized
    TooManyChunks { chunks: usize, max_chunk: usize },
}

impl PipelineOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, PipelineOutcome::Saved | PipelineOutcome::FromCache)
    }
}

/// Paper -> chunks -> summary -> HTML note
pub struct SummaryPipeline {
    summarizer: Summarizer,
    documents: Arc<DocumentService>,
    cache: Option<SummaryCache>,
}

impl SummaryPipeline {
    pub fn new(summarizer: Summarizer, documents: Arc<DocumentService>) -> Self {
        Self {
            summarizer,
            documents,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: SummaryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Summarize one paper, reporting milestones to `progress`.
    ///
    /// Errors are reported with `progress.fail` and then returned.
    pub async fn run(&self, source: &dyn PaperSource, progress: &dyn ProgressSink) -> Result<PipelineOutcome> {
        match self.run_inner(source, progress).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                progress.fail(&format!("Error processing item: {:#}", e));
                Err(e)
            }
        }
    }

    async fn run_inner(&self, source: &dyn PaperSource, progress: &dyn ProgressSink) -> Result<PipelineOutcome> {
        let title = source.title();
        progress.report(milestone::RETRIEVING, "Retrieving PDF...");

        if source.has_existing_summary().await? {
            progress.report(milestone::DONE, "Summary already exists.");
            return Ok(PipelineOutcome::AlreadySummarized);
        }

        let pdf_hash = match &self.cache {
            Some(_) => source.content_hash().await?,
            None => None,
        };

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lookup(pdf_hash.as_deref(), source.link(), title).await? {
                info!(title, model = %hit.model_name, "using cached summary");
                source.save_summary(&hit.html).await?;
                progress.report(milestone::DONE, "Summary restored from cache.");
                return Ok(PipelineOutcome::FromCache);
            }
        }

        progress.report(milestone::PARSING, "Parsing PDF...");
        let chunks = source.chunks().await.context("Failed to parse PDF")?;

        progress.report(milestone::SUMMARIZING, "Generating summary...");
        let markdown = match self.summarizer.summarize(title, &chunks, progress).await? {
            SummaryOutcome::Summary(markdown) => markdown,
            SummaryOutcome::Aborted { chunks, max_chunk } => {
                progress.report(
                    milestone::DONE,
                    &format!("Skipped: {} chunks reaches the limit of {}", chunks, max_chunk),
                );
                return Ok(PipelineOutcome::TooManyChunks { chunks, max_chunk });
            }
        };

        if markdown.trim().is_empty() {
            anyhow::bail!("summary error: the model returned an empty summary");
        }

        progress.report(milestone::FORMATTING, "Formatting summary to HTML...");
        let model_name = self.summarizer.provider().model().to_string();
        let html = self
            .documents
            .markdown_to_html(title, &markdown, &model_name)
            .await?;

        if let (Some(cache), Some(hash)) = (&self.cache, pdf_hash) {
            let entry = CachedSummary {
                pdf_hash: hash,
                title: title.to_string(),
                link: source.link().to_string(),
                markdown,
                html: html.clone(),
                model_name,
                created_at: chrono::Utc::now(),
            };
            if let Err(e) = cache.store(&entry).await {
                warn!(title, "failed to cache summary: {:#}", e);
            }
        }

        source.save_summary(&html).await?;
        progress.report(milestone::DONE, "Summary generated successfully!");
        Ok(PipelineOutcome::Saved)
    }
}

/// Tally of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: success = {} / total = {} (skipped {}, failed {})",
            self.succeeded, self.total, self.skipped, self.failed
        )
    }
}

/// Summarize many papers, at most `concurrency` at a time.
///
/// Papers are independent: one failure is logged and counted, the others go on.
pub async fn summarize_batch(
    pipeline: &SummaryPipeline,
    sources: &[Arc<dyn PaperSource>],
    concurrency: usize,
) -> BatchReport {
    info!("Summarizing {} papers ({} at a time)", sources.len(), concurrency.max(1));

    let outcomes: Vec<Result<PipelineOutcome>> = stream::iter(sources.iter())
        .map(|source| async move {
            let progress = LogProgress::new(source.title());
            pipeline.run(source.as_ref(), &progress).await
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = BatchReport {
        total: sources.len(),
        ..BatchReport::default()
    };
    for outcome in outcomes {
        match outcome {
            Ok(outcome) if outcome.is_saved() => report.succeeded += 1,
            Ok(_) => report.skipped += 1,
            Err(e) => {
                error!("paper failed: {:#}", e);
                report.failed += 1;
            }
        }
    }

    info!("{}", report);
    report
}
