/*
newscurator - command-line entry point.
Loads articles from feeds and JSON dumps, scores them against a query with the configured
LLM and prints the curated feed as JSON on stdout.
*/

use anyhow::{Context, Result};
use clap::Parser;
use common::Config;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newscurator::ingestion;
use newscurator::llm::remote::RemoteLlmProvider;
use newscurator::llm::LlmProvider;
use newscurator::{Article, FeedCurator, LlmRelevanceScorer, SystemPrompt};

#[derive(Parser, Debug)]
#[command(name = "newscurator", about = "Curate a news feed for a query with an LLM relevance scorer")]
struct Args {
    /// Natural-language description of the feed to build
    #[arg(long, short)]
    query: String,

    /// RSS/Atom feed to read articles from (URL or file); repeatable
    #[arg(long, value_name = "SOURCE")]
    feed: Vec<String>,

    /// JSON file holding an array of articles; repeatable
    #[arg(long, value_name = "FILE")]
    articles: Vec<PathBuf>,

    /// Minimum relevance score (0.0-1.0, inclusive); overrides config
    #[arg(long)]
    min_score: Option<f32>,

    /// Articles per scorer call; overrides config
    #[arg(long)]
    batch_size: Option<usize>,

    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the curation output
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config.clone() {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    // Load configuration with defaults
    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref()
    ).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    validate_query(&args.query)?;

    let curation = config.curation();
    let min_score = args.min_score.unwrap_or(curation.min_relevance_score);
    if !(0.0..=1.0).contains(&min_score) {
        anyhow::bail!("Minimum score must be between 0.0 and 1.0, got {}", min_score);
    }
    let batch_size = match args.batch_size.or(curation.max_articles_per_batch) {
        Some(n) => Some(NonZeroUsize::new(n).context("Batch size must be a positive integer")?),
        None => None,
    };

    let articles = collect_articles(&args, &config).await?;
    info!("Loaded {} unique articles", articles.len());

    let llm_config = config.llm.clone().unwrap_or_default();
    let provider: Arc<dyn LlmProvider> = Arc::from(create_llm_provider(&llm_config)?);

    let mut scorer = LlmRelevanceScorer::new(
        provider,
        curation.system_prompt.clone().map(SystemPrompt::new),
    );
    if let Some(max_chars) = curation.summary_max_chars {
        scorer = scorer.with_summary_max_chars(max_chars);
    }
    if let Some(endpoint) = llm_config.scoring_endpoint() {
        if let Some(max_tokens) = endpoint.max_tokens {
            scorer = scorer.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = endpoint.temperature {
            scorer = scorer.with_temperature(temperature);
        }
    }

    let curator = FeedCurator::new(Arc::new(scorer));
    let result = curator
        .curate(&args.query, &articles, min_score, batch_size)
        .await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to serialize curation result")?
    );
    Ok(())
}

/// Reject blank queries from the command line before any work is done
fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("Query must not be blank");
    }
    Ok(())
}

/// Gather articles from every `--feed` and `--articles` source, dropping repeated URLs
async fn collect_articles(args: &Args, config: &Config) -> Result<Vec<Article>> {
    let ingestion_config = config.ingestion();
    let timeout = ingestion_config.fetch_timeout_seconds.unwrap_or(10);
    let user_agent = ingestion_config.user_agent.as_deref();
    let mut articles = Vec::new();

    for source in &args.feed {
        let feed = ingestion::load_feed_source(source, timeout, user_agent).await?;
        let from_feed = ingestion::articles_from_feed(&feed);
        info!("Read {} articles from feed '{}'", from_feed.len(), source);
        articles.extend(from_feed);
    }

    for path in &args.articles {
        let from_file = ingestion::load_articles_json(path).await?;
        info!("Read {} articles from {}", from_file.len(), path.display());
        articles.extend(from_file);
    }

    if articles.is_empty() {
        warn!("No articles to curate; pass --feed or --articles");
    }

    Ok(ingestion::dedup_by_url(articles))
}

/// Create the scoring LLM provider from configuration
fn create_llm_provider(llm_config: &common::LlmConfig) -> anyhow::Result<Box<dyn LlmProvider>> {
    let adapter = llm_config.adapter.as_deref().unwrap_or("remote");
    match adapter {
        "remote" => {
            let remote_config = llm_config
                .scoring_endpoint()
                .context("Remote adapter selected but no [llm.scoring] or [llm.remote] config found")?;

            // Fetch API key from env var
            let api_key_env = remote_config.api_key_env.as_deref()
                .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in remote config"))?;

            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote_config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = remote_config.api_url.clone().unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());
            let timeout_secs = remote_config.timeout_seconds.unwrap_or(60);
            let max_tokens = remote_config.max_tokens.unwrap_or(2000);
            let temperature = remote_config.temperature.unwrap_or(0.2);

            let provider = RemoteLlmProvider::new(api_url, api_key, model)
                .with_defaults(timeout_secs, max_tokens, temperature);
            info!("Scoring LLM provider initialized: {}", provider.model());
            Ok(Box::new(provider))
        }
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_query_is_rejected() {
        for query in ["", "   ", "\t\n"] {
            let err = validate_query(query).unwrap_err();
            assert_eq!(err.to_string(), "Query must not be blank");
        }
        assert!(validate_query("climate policy").is_ok());
    }
}
