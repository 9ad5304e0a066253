mod support;

use anyhow::Result;
use paperdigest::cache::SummaryCache;
use paperdigest::documents::{DocumentService, TextChunk};
use paperdigest::llm::summarizer::Summarizer;
use paperdigest::processing::{summarize_batch, BatchReport, PipelineOutcome, SummaryPipeline};
use paperdigest::source::PaperSource;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};
use support::{test_prompts, RecordingProgress, ScriptedProvider};

/// In-memory paper with a scripted chunk list
struct FakeSource {
    title: String,
    chunks: Option<Vec<String>>,
    existing: bool,
    hash: Option<String>,
    saved: Mutex<Option<String>>,
}

impl FakeSource {
    fn new(title: &str, chunks: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            chunks: Some(chunks.iter().map(|c| c.to_string()).collect()),
            existing: false,
            hash: None,
            saved: Mutex::new(None),
        }
    }

    fn unreadable(title: &str) -> Self {
        Self {
            chunks: None,
            ..Self::new(title, &[])
        }
    }

    fn already_summarized(mut self) -> Self {
        self.existing = true;
        self
    }

    fn with_hash(mut self, hash: &str) -> Self {
        self.hash = Some(hash.to_string());
        self
    }

    fn saved(&self) -> Option<String> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PaperSource for FakeSource {
    fn title(&self) -> &str {
        &self.title
    }

    fn link(&self) -> &str {
        ""
    }

    async fn has_existing_summary(&self) -> Result<bool> {
        Ok(self.existing)
    }

    async fn chunks(&self) -> Result<Vec<TextChunk>> {
        match &self.chunks {
            Some(chunks) => Ok(chunks.iter().map(|c| TextChunk::new(c.as_str())).collect()),
            None => anyhow::bail!("No PDF attachment found: {}", self.title),
        }
    }

    async fn save_summary(&self, html: &str) -> Result<()> {
        *self.saved.lock().unwrap() = Some(html.to_string());
        Ok(())
    }

    async fn content_hash(&self) -> Result<Option<String>> {
        Ok(self.hash.clone())
    }
}

const NOTE_HTML: &str = "<h2>AI Generated Summary (mock-model)</h2><p>summary</p>";

async fn html_mock(server: &mut mockito::ServerGuard, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/md_to_html")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(serde_json::json!({ "html": NOTE_HTML }).to_string())
        .expect(hits)
        .create_async()
        .await
}

fn pipeline(provider: &Arc<ScriptedProvider>, server_url: String, max_chunk: usize) -> SummaryPipeline {
    let summarizer = Summarizer::new(provider.clone(), Arc::new(test_prompts()), max_chunk);
    SummaryPipeline::new(summarizer, Arc::new(DocumentService::new(server_url)))
}

#[tokio::test]
async fn map_reduce_paper_is_saved_with_all_milestones() {
    let mut server = mockito::Server::new_async().await;
    let mock = html_mock(&mut server, 1).await;
    let provider = Arc::new(ScriptedProvider::new());
    let source = FakeSource::new("Attention", &["A", "B"]);
    let progress = RecordingProgress::default();

    let outcome = pipeline(&provider, server.url(), 10)
        .run(&source, &progress)
        .await
        .expect("pipeline");

    assert_eq!(outcome, PipelineOutcome::Saved);
    assert_eq!(progress.percents(), vec![0, 20, 40, 60, 80, 100]);
    assert_eq!(progress.last_text().as_deref(), Some("Summary generated successfully!"));
    assert_eq!(source.saved().as_deref(), Some(NOTE_HTML));
    mock.assert_async().await;
}

#[tokio::test]
async fn existing_summary_skips_everything() {
    let mut server = mockito::Server::new_async().await;
    let mock = html_mock(&mut server, 0).await;
    let provider = Arc::new(ScriptedProvider::new());
    let source = FakeSource::new("Attention", &["A"]).already_summarized();
    let progress = RecordingProgress::default();

    let outcome = pipeline(&provider, server.url(), 10)
        .run(&source, &progress)
        .await
        .unwrap();

    assert_eq!(outcome, PipelineOutcome::AlreadySummarized);
    assert_eq!(progress.percents(), vec![0, 100]);
    assert!(provider.prompts().is_empty());
    assert!(source.saved().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn too_many_chunks_saves_nothing() {
    let mut server = mockito::Server::new_async().await;
    let mock = html_mock(&mut server, 0).await;
    let provider = Arc::new(ScriptedProvider::new());
    let texts: Vec<String> = (0..12).map(|i| format!("c{}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let source = FakeSource::new("Huge survey", &refs);
    let progress = RecordingProgress::default();

    let outcome = pipeline(&provider, server.url(), 10)
        .run(&source, &progress)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        PipelineOutcome::TooManyChunks {
            chunks: 12,
            max_chunk: 10
        }
    );
    assert!(!outcome.is_saved());
    assert_eq!(progress.percents(), vec![0, 20, 40, 100]);
    assert!(progress.last_text().unwrap().starts_with("Skipped"));
    assert!(provider.prompts().is_empty());
    assert!(source.saved().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn llm_failure_is_reported_and_returned() {
    let mut server = mockito::Server::new_async().await;
    let mock = html_mock(&mut server, 0).await;
    let provider = Arc::new(ScriptedProvider::new().failing_on("B"));
    let source = FakeSource::new("Attention", &["A", "B"]);
    let progress = RecordingProgress::default();

    let err = pipeline(&provider, server.url(), 10)
        .run(&source, &progress)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("500 Internal Server Error"));
    let failures = progress.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("Error processing item: "));
    assert!(failures[0].contains("chunk B exploded"));
    assert!(!progress.percents().contains(&100));
    assert!(source.saved().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn empty_summary_is_a_failure_and_nothing_is_kept() {
    let mut server = mockito::Server::new_async().await;
    let mock = html_mock(&mut server, 0).await;
    let provider = Arc::new(ScriptedProvider::new().with_stuff_reply(""));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let cache = SummaryCache::new(pool).await.unwrap();
    let pipeline = pipeline(&provider, server.url(), 10).with_cache(cache.clone());

    let source = FakeSource::new("Attention", &["A"]).with_hash("abc123");
    let progress = RecordingProgress::default();
    let err = pipeline.run(&source, &progress).await.unwrap_err();

    assert!(err.to_string().contains("empty summary"), "{}", err);
    assert_eq!(progress.failures().len(), 1);
    assert!(!progress.percents().contains(&80));
    assert!(source.saved().is_none());
    assert!(cache.lookup(Some("abc123"), "", "Attention").await.unwrap().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn cached_summary_is_reused_without_llm() {
    let mut server = mockito::Server::new_async().await;
    let mock = html_mock(&mut server, 1).await;
    let provider = Arc::new(ScriptedProvider::new());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let cache = SummaryCache::new(pool).await.unwrap();
    let pipeline = pipeline(&provider, server.url(), 10).with_cache(cache.clone());

    let first = FakeSource::new("Attention", &["A"]).with_hash("abc123");
    let outcome = pipeline.run(&first, &RecordingProgress::default()).await.unwrap();
    assert_eq!(outcome, PipelineOutcome::Saved);
    assert_eq!(provider.prompts().len(), 1);

    let cached = cache.lookup(Some("abc123"), "", "").await.unwrap().unwrap();
    assert_eq!(cached.markdown, "stuffResult");
    assert_eq!(cached.model_name, "mock-model");

    let copy = FakeSource::new("Attention (copy)", &["A"]).with_hash("abc123");
    let progress = RecordingProgress::default();
    let outcome = pipeline.run(&copy, &progress).await.unwrap();

    assert_eq!(outcome, PipelineOutcome::FromCache);
    assert!(outcome.is_saved());
    assert_eq!(progress.percents(), vec![0, 100]);
    assert_eq!(provider.prompts().len(), 1);
    assert_eq!(copy.saved().as_deref(), Some(NOTE_HTML));
    mock.assert_async().await;
}

#[tokio::test]
async fn batch_counts_each_paper_independently() {
    let mut server = mockito::Server::new_async().await;
    let _mock = html_mock(&mut server, 1).await;
    let provider = Arc::new(ScriptedProvider::new());

    let ok = Arc::new(FakeSource::new("Good paper", &["A"]));
    let sources: Vec<Arc<dyn PaperSource>> = vec![
        ok.clone(),
        Arc::new(FakeSource::new("Done paper", &["A"]).already_summarized()),
        Arc::new(FakeSource::unreadable("Broken paper")),
    ];

    let report = summarize_batch(&pipeline(&provider, server.url(), 10), &sources, 2).await;

    assert_eq!(
        report,
        BatchReport {
            total: 3,
            succeeded: 1,
            skipped: 1,
            failed: 1
        }
    );
    assert_eq!(
        report.to_string(),
        "processed: success = 1 / total = 3 (skipped 1, failed 1)"
    );
    assert!(ok.saved().is_some());
}
