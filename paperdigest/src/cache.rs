use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// A cached paper summary, also the unit the review and Q&A commands work on
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CachedSummary {
    pub pdf_hash: String,
    pub title: String,
    pub link: String,
    pub markdown: String,
    pub html: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

/// Summaries keyed by PDF content hash, backed by SQLite
#[derive(Debug, Clone)]
pub struct SummaryCache {
    pool: SqlitePool,
}

const SELECT_COLUMNS: &str =
    "SELECT pdf_hash, title, link, markdown, html, model_name, created_at FROM summaries";

impl SummaryCache {
    /// Wrap `pool` and make sure the table exists
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summaries (
                pdf_hash TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                link TEXT NOT NULL DEFAULT '',
                markdown TEXT NOT NULL,
                html TEXT NOT NULL,
                model_name TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create summaries table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_summaries_title ON summaries (title)")
            .execute(&self.pool)
            .await
            .context("Failed to create summaries title index")?;
        Ok(())
    }

    /// Find a summary for a paper: by content hash first, then by link
    /// (when non-empty), then by title.
    pub async fn lookup(&self, pdf_hash: Option<&str>, link: &str, title: &str) -> Result<Option<CachedSummary>> {
        if let Some(hash) = pdf_hash {
            let hit = self.fetch_one_where("pdf_hash = ?", hash).await?;
            if hit.is_some() {
                debug!(hash, "cache hit by hash");
                return Ok(hit);
            }
        }

        if !link.is_empty() {
            let hit = self.fetch_one_where("link = ?", link).await?;
            if hit.is_some() {
                debug!(link, "cache hit by link");
                return Ok(hit);
            }
        }

        self.fetch_one_where("title = ?", title).await
    }

    async fn fetch_one_where(&self, condition: &str, value: &str) -> Result<Option<CachedSummary>> {
        let sql = format!("{} WHERE {} ORDER BY created_at DESC LIMIT 1", SELECT_COLUMNS, condition);
        sqlx::query_as::<_, CachedSummary>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to query summary cache ({})", condition))
    }

    /// Insert or replace the entry for `summary.pdf_hash`
    pub async fn store(&self, summary: &CachedSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO summaries (pdf_hash, title, link, markdown, html, model_name, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(pdf_hash) DO UPDATE SET
                title = excluded.title,
                link = excluded.link,
                markdown = excluded.markdown,
                html = excluded.html,
                model_name = excluded.model_name,
                created_at = excluded.created_at
            "#,
        )
        .bind(&summary.pdf_hash)
        .bind(&summary.title)
        .bind(&summary.link)
        .bind(&summary.markdown)
        .bind(&summary.html)
        .bind(&summary.model_name)
        .bind(summary.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to cache summary for '{}'", summary.title))?;

        info!(title = %summary.title, "summary cached");
        Ok(())
    }

    /// Entries whose title matches one of `titles` exactly, newest first
    pub async fn find_by_titles(&self, titles: &[String]) -> Result<Vec<CachedSummary>> {
        let mut found = Vec::with_capacity(titles.len());
        for title in titles {
            if let Some(entry) = self.fetch_one_where("title = ?", title).await? {
                found.push(entry);
            }
        }
        Ok(found)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<CachedSummary>> {
        let sql = format!("{} ORDER BY created_at DESC LIMIT ?", SELECT_COLUMNS);
        sqlx::query_as::<_, CachedSummary>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list recent summaries")
    }

    /// Case-insensitive substring search over title and Markdown summary
    pub async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<CachedSummary>> {
        let pattern = format!("%{}%", escape_like(&keyword.to_lowercase()));
        let sql = format!(
            "{} WHERE lower(title) LIKE ?1 ESCAPE '\\' OR lower(markdown) LIKE ?1 ESCAPE '\\' \
             ORDER BY created_at DESC LIMIT ?2",
            SELECT_COLUMNS
        );
        sqlx::query_as::<_, CachedSummary>(&sql)
            .bind(pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to search summaries for '{}'", keyword))
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Lowercase hex SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
