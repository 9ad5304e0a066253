use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::template::PromptTemplate;

/// The three prompts driving single-document summarization
#[derive(Debug, Clone)]
pub struct SummaryPrompts {
    /// Whole document in one request
    pub stuff: PromptTemplate,
    /// One request per chunk
    pub map: PromptTemplate,
    /// Combines the per-chunk summaries
    pub reduce: PromptTemplate,
}

/// All prompts of a session. `merge` and `qa` are only needed by the
/// review and question-answering commands.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    pub summary: SummaryPrompts,
    pub merge: Option<PromptTemplate>,
    pub qa: Option<PromptTemplate>,
}

impl PromptLibrary {
    /// Load `{name}_prompt.txt` files from `dir`.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let summary = SummaryPrompts {
            stuff: load_prompt(dir, "stuff").await?,
            map: load_prompt(dir, "map").await?,
            reduce: load_prompt(dir, "reduce").await?,
        };
        let merge = load_optional_prompt(dir, "merge").await?;
        let qa = load_optional_prompt(dir, "qa").await?;

        info!(
            dir = %dir.display(),
            merge = merge.is_some(),
            qa = qa.is_some(),
            "prompts loaded"
        );
        Ok(Self { summary, merge, qa })
    }
}

fn prompt_path(dir: &Path, name: &str) -> std::path::PathBuf {
    dir.join(format!("{}_prompt.txt", name))
}

async fn load_prompt(dir: &Path, name: &str) -> Result<PromptTemplate> {
    let path = prompt_path(dir, name);
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
    Ok(PromptTemplate::new(text))
}

async fn load_optional_prompt(dir: &Path, name: &str) -> Result<Option<PromptTemplate>> {
    let path = prompt_path(dir, name);
    let exists = tokio::fs::try_exists(&path)
        .await
        .with_context(|| format!("Failed to check prompt file {}", path.display()))?;
    if !exists {
        debug!(path = %path.display(), "optional prompt not present");
        return Ok(None);
    }
    load_prompt(dir, name).await.map(Some)
}
