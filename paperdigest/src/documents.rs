//! Client for the document service: PDF parsing into text chunks and
//! Markdown-to-HTML rendering. Both are stateless multipart endpoints.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{check_status, decode_json, ApiError};

/// A bounded slice of a document's extracted text. Order is the position in
/// the `splits` array returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextChunk {
    pub content: String,
}

impl TextChunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Everything `/parse_pdf` needs for one document
#[derive(Debug, Clone)]
pub struct ParseRequest<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub file_name: &'a str,
    pub pdf: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    splits: Vec<TextChunk>,
    #[serde(default)]
    total_pages: Option<u64>,
    #[serde(default)]
    total_chars: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HtmlResponse {
    html: String,
}

pub struct DocumentService {
    base_url: String,
    client: reqwest::Client,
}

impl DocumentService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload a PDF and get back its ordered text chunks
    pub async fn parse_pdf(&self, request: ParseRequest<'_>) -> Result<Vec<TextChunk>, ApiError> {
        let endpoint = format!("{}/parse_pdf", self.base_url);
        let pdf_len = request.pdf.len();

        let pdf_part = Part::bytes(request.pdf)
            .file_name(request.file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| ApiError::InvalidRequest {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let form = Form::new()
            .text("title", request.title.to_string())
            .text("link", request.link.to_string())
            .text("chunk_size", request.chunk_size.to_string())
            .text("chunk_overlap", request.chunk_overlap.to_string())
            .part("pdf", pdf_part);

        debug!(file = %request.file_name, bytes = pdf_len, "uploading PDF for parsing");
        let response = self.post_form(&endpoint, form).await?;
        let parsed: ParseResponse = decode_json(response, &endpoint).await?;

        info!(
            file = %request.file_name,
            splits = parsed.splits.len(),
            pages = parsed.total_pages.unwrap_or(0),
            chars = parsed.total_chars.unwrap_or(0),
            "PDF parsed"
        );
        Ok(parsed.splits)
    }

    /// Render Markdown to an HTML note fragment
    pub async fn markdown_to_html(
        &self,
        title: &str,
        markdown: &str,
        model_name: &str,
    ) -> Result<String, ApiError> {
        let endpoint = format!("{}/md_to_html", self.base_url);
        let form = Form::new()
            .text("title", title.to_string())
            .text("markdown", markdown.to_string())
            .text("model_name", model_name.to_string());

        let response = self.post_form(&endpoint, form).await?;
        let rendered: HtmlResponse = decode_json(response, &endpoint).await?;
        Ok(rendered.html)
    }

    async fn post_form(&self, endpoint: &str, form: Form) -> Result<reqwest::Response, ApiError> {
        let response = self
            .client
            .post(endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                endpoint: self.base_url.clone(),
                source: e,
            })?;
        check_status(response, &self.base_url).await
    }
}
