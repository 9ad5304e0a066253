use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::content_hash;
use crate::documents::{DocumentService, ParseRequest, TextChunk};

/// Marker heading that identifies a generated summary note
pub const SUMMARY_MARKER: &str = "<h2>AI Generated Summary";

/// Where a paper comes from and where its summary note goes.
///
/// The pipeline only talks to papers through this trait.
#[async_trait::async_trait]
pub trait PaperSource: Send + Sync {
    fn title(&self) -> &str;

    fn link(&self) -> &str;

    /// Whether a generated summary note is already attached
    async fn has_existing_summary(&self) -> Result<bool>;

    /// Ordered text chunks of the paper
    async fn chunks(&self) -> Result<Vec<TextChunk>>;

    /// Attach the rendered HTML summary to the paper
    async fn save_summary(&self, html: &str) -> Result<()>;

    /// Fingerprint of the paper content, used as the cache key
    async fn content_hash(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Chunking parameters sent to the document service
#[derive(Debug, Clone, Copy)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// A PDF on the local filesystem. Its note lives at `{notes_dir}/{stem}.html`.
pub struct PdfFileSource {
    path: PathBuf,
    title: String,
    link: String,
    notes_dir: PathBuf,
    documents: Arc<DocumentService>,
    chunking: ChunkSettings,
    wait_for_file: Duration,
}

impl PdfFileSource {
    /// The title defaults to the file stem.
    pub fn new(
        path: impl Into<PathBuf>,
        notes_dir: impl Into<PathBuf>,
        documents: Arc<DocumentService>,
        chunking: ChunkSettings,
    ) -> Self {
        let path = path.into();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            title,
            link: String::new(),
            notes_dir: notes_dir.into(),
            documents,
            chunking,
            wait_for_file: Duration::ZERO,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Poll for up to `timeout` for the PDF to appear before reading it
    pub fn with_wait(mut self, timeout: Duration) -> Self {
        self.wait_for_file = timeout;
        self
    }

    pub fn note_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "summary".to_string());
        self.notes_dir.join(format!("{}.html", stem))
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string())
    }

    async fn read_pdf(&self) -> Result<Vec<u8>> {
        wait_for_file(&self.path, self.wait_for_file).await?;
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read PDF {}", self.path.display()))
    }
}

/// Wait (polling once per second) until `path` exists or `timeout` elapses.
async fn wait_for_file(path: &Path, timeout: Duration) -> Result<()> {
    let mut waited = Duration::ZERO;
    while !tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("Failed to check PDF {}", path.display()))?
    {
        if waited >= timeout {
            anyhow::bail!("No PDF attachment found: {}", path.display());
        }
        debug!(path = %path.display(), "waiting for PDF to appear");
        tokio::time::sleep(Duration::from_secs(1)).await;
        waited += Duration::from_secs(1);
    }
    Ok(())
}

#[async_trait::async_trait]
impl PaperSource for PdfFileSource {
    fn title(&self) -> &str {
        &self.title
    }

    fn link(&self) -> &str {
        &self.link
    }

    async fn has_existing_summary(&self) -> Result<bool> {
        let note = self.note_path();
        let exists = tokio::fs::try_exists(&note)
            .await
            .with_context(|| format!("Failed to check note {}", note.display()))?;
        if !exists {
            return Ok(false);
        }
        let content = tokio::fs::read_to_string(&note)
            .await
            .with_context(|| format!("Failed to read note {}", note.display()))?;
        Ok(content.contains(SUMMARY_MARKER))
    }

    async fn chunks(&self) -> Result<Vec<TextChunk>> {
        let pdf = self.read_pdf().await?;
        let file_name = self.file_name();
        let chunks = self
            .documents
            .parse_pdf(ParseRequest {
                title: &self.title,
                link: &self.link,
                chunk_size: self.chunking.chunk_size,
                chunk_overlap: self.chunking.chunk_overlap,
                file_name: &file_name,
                pdf,
            })
            .await?;
        Ok(chunks)
    }

    async fn save_summary(&self, html: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.notes_dir)
            .await
            .with_context(|| format!("Failed to create notes directory {}", self.notes_dir.display()))?;
        let note = self.note_path();
        tokio::fs::write(&note, html)
            .await
            .with_context(|| format!("Failed to write note {}", note.display()))?;
        info!(note = %note.display(), "summary note saved");
        Ok(())
    }

    async fn content_hash(&self) -> Result<Option<String>> {
        let pdf = self.read_pdf().await?;
        Ok(Some(content_hash(&pdf)))
    }
}
