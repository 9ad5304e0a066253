/*
paperdigest - command line entry point.
Summarizes PDFs through the document service and an OpenAI-compatible LLM,
and builds literature reviews and answers questions over cached summaries.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use paperdigest::cache::SummaryCache;
use paperdigest::documents::DocumentService;
use paperdigest::llm::remote::RemoteLlmProvider;
use paperdigest::llm::summarizer::Summarizer;
use paperdigest::llm::LlmProvider;
use paperdigest::processing::{summarize_batch, SummaryPipeline};
use paperdigest::prompts::PromptLibrary;
use paperdigest::qa::{LibraryQa, MAX_QA_PAPERS};
use paperdigest::review::LiteratureReview;
use paperdigest::source::{ChunkSettings, PaperSource, PdfFileSource};

#[derive(Parser, Debug)]
#[command(name = "paperdigest", about = "AI summaries, reviews and Q&A for research papers")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize one or more PDFs into HTML notes
    Summarize {
        #[arg(required = true, value_name = "PDF")]
        pdfs: Vec<PathBuf>,

        /// Paper title (single PDF only; defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Paper URL (single PDF only)
        #[arg(long)]
        link: Option<String>,
    },
    /// Merge cached summaries into a literature review
    Review {
        /// Titles of the papers to include (default: most recent)
        #[arg(long = "title")]
        titles: Vec<String>,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Ask a question over cached summaries
    Ask {
        question: String,

        /// Search keyword selecting the papers (default: the question)
        #[arg(long)]
        keyword: Option<String>,

        #[arg(long, default_value_t = MAX_QA_PAPERS)]
        limit: usize,

        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = match load_config(args.config.as_deref()).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("paperdigest/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build reqwest client")?;

    let provider: Arc<dyn LlmProvider> =
        Arc::new(RemoteLlmProvider::from_config(&config.llm)?.with_client(client.clone()));
    let documents = Arc::new(DocumentService::new(config.server.url.clone()).with_client(client));
    let prompts = PromptLibrary::load(config.prompts_dir()).await?;
    info!(model = %provider.model(), server = %documents.base_url(), "services configured");

    match args.command {
        Command::Summarize { pdfs, title, link } => {
            if pdfs.len() > 1 && (title.is_some() || link.is_some()) {
                anyhow::bail!("--title and --link can only be used with a single PDF");
            }

            let summarizer = Summarizer::new(
                provider.clone(),
                Arc::new(prompts.summary),
                config.summary.max_chunk(),
            );
            let mut pipeline = SummaryPipeline::new(summarizer, documents.clone());
            if let Some(cache) = open_cache(&config).await? {
                pipeline = pipeline.with_cache(cache);
            }

            let chunking = ChunkSettings {
                chunk_size: config.summary.chunk_size(),
                chunk_overlap: config.summary.chunk_overlap(),
            };
            let wait = Duration::from_secs(config.server.attachment_timeout_seconds.unwrap_or(0));

            let sources: Vec<Arc<dyn PaperSource>> = pdfs
                .into_iter()
                .map(|pdf| {
                    let mut source =
                        PdfFileSource::new(pdf, config.summary.notes_dir(), documents.clone(), chunking)
                            .with_wait(wait);
                    if let Some(title) = &title {
                        source = source.with_title(title.clone());
                    }
                    if let Some(link) = &link {
                        source = source.with_link(link.clone());
                    }
                    Arc::new(source) as Arc<dyn PaperSource>
                })
                .collect();

            let report = summarize_batch(&pipeline, &sources, config.summary.max_concurrent_papers()).await;
            println!("{}", report);
            if report.failed > 0 {
                anyhow::bail!("{} of {} papers failed", report.failed, report.total);
            }
        }
        Command::Review { titles, limit, out } => {
            let prompt = prompts
                .merge
                .context("merge_prompt.txt is required for reviews")?;
            let cache = open_cache(&config)
                .await?
                .context("a [database] section is required for reviews")?;

            let papers = if titles.is_empty() {
                cache.recent(limit).await?
            } else {
                cache.find_by_titles(&titles).await?
            };

            let review = LiteratureReview::new(provider, documents, prompt);
            let html = review.generate(&papers).await?;
            write_output(&out, &html).await?;
        }
        Command::Ask {
            question,
            keyword,
            limit,
            out,
        } => {
            let prompt = prompts.qa.context("qa_prompt.txt is required for questions")?;
            let cache = open_cache(&config)
                .await?
                .context("a [database] section is required for questions")?;

            let keyword = keyword.unwrap_or_else(|| question.clone());
            let papers = cache.search(&keyword, limit.min(MAX_QA_PAPERS)).await?;
            info!(keyword = %keyword, found = papers.len(), "papers selected");

            let qa = LibraryQa::new(provider, documents, prompt);
            let html = qa.answer(&question, &papers).await?;
            write_output(&out, &html).await?;
        }
    }

    Ok(())
}

/// config.default.toml is merged under config.toml, or under --config when given.
async fn load_config(explicit: Option<&std::path::Path>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = match explicit {
        Some(p) => {
            if !tokio::fs::try_exists(p).await.unwrap_or(false) {
                anyhow::bail!("Config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => PathBuf::from("config.toml"),
    };

    // Missing files are skipped by the loader
    let config = Config::load_with_defaults(Some(default_path.as_path()), Some(override_path.as_path())).await?;
    config.validate()?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

async fn open_cache(config: &Config) -> Result<Option<SummaryCache>> {
    let Some(db) = &config.database else {
        return Ok(None);
    };
    let pool = common::init_db_pool(&db.path).await?;
    Ok(Some(SummaryCache::new(pool).await?))
}

async fn write_output(path: &std::path::Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "note written");
    Ok(())
}
