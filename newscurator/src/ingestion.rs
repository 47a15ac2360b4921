use anyhow::{Context, Result};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::article::Article;

/// User agent sent when the configuration names none
pub const DEFAULT_USER_AGENT: &str = "newscurator/0.1.0";

/// Fetches a feed from the given URL and parses it.
/// Retries network errors, 5xx and 429 responses with exponential backoff.
pub async fn fetch_and_parse_feed(url: &str, timeout_secs: u64, user_agent: Option<&str>) -> Result<Feed> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .build()
        .context("failed to build reqwest client")?;

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        if attempt > 1 {
            let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s, 4s...
            info!("Retrying feed fetch for {} (attempt {}/{}) after {:?}...", url, attempt, max_retries, backoff);
            tokio::time::sleep(backoff).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let bytes = response.bytes().await.context("failed to read response body")?;
                    return parse_feed(bytes.as_ref());
                } else if status.is_server_error() { // 5xx
                    last_error = Some(anyhow::anyhow!("server error: {}", status));
                    continue; // Retry
                } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                    continue; // Retry
                } else {
                    // Client error (4xx) - likely permanent, don't retry
                    return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
                }
            }
            Err(e) => {
                // Network error - retry
                last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
}

/// Parse an RSS/Atom/JSON feed document
pub fn parse_feed(bytes: &[u8]) -> Result<Feed> {
    parser::parse(bytes).context("failed to parse feed")
}

/// Load a feed from an `http(s)://` URL or a local file path
pub async fn load_feed_source(source: &str, timeout_secs: u64, user_agent: Option<&str>) -> Result<Feed> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return fetch_and_parse_feed(source, timeout_secs, user_agent)
            .await
            .with_context(|| format!("failed to fetch feed {}", source));
    }

    let bytes = tokio::fs::read(source)
        .await
        .with_context(|| format!("failed to read feed file: {}", source))?;
    parse_feed(&bytes).with_context(|| format!("failed to parse feed file: {}", source))
}

/// Convert feed entries into articles.
/// Entries without an absolute link are skipped; repeated URLs keep their first entry.
pub fn articles_from_feed(feed: &Feed) -> Vec<Article> {
    let source = feed.title.as_ref().map(|t| t.content.trim().to_string());
    let articles = feed
        .entries
        .iter()
        .filter_map(|entry| article_from_entry(entry, source.as_deref()));
    dedup_by_url(articles)
}

fn article_from_entry(entry: &Entry, source: Option<&str>) -> Option<Article> {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "(untitled)".to_string());

    // Use the first link as the URL
    let Some(link) = entry.links.first() else {
        debug!("Skipping entry without URL: {:?}", title);
        return None;
    };
    let url = match url::Url::parse(link.href.trim()) {
        Ok(u) => u.to_string(),
        Err(e) => {
            debug!("Skipping entry with invalid URL '{}': {}", link.href, e);
            return None;
        }
    };

    let summary = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .map(|html| html_to_text(&html))
        .filter(|s| !s.is_empty());

    Some(Article {
        url,
        title,
        summary,
        source: source.map(str::to_string),
        published_at: entry.published.or(entry.updated),
    })
}

/// Read a JSON array of articles from disk
pub async fn load_articles_json<P: AsRef<Path>>(path: P) -> Result<Vec<Article>> {
    let path = path.as_ref();
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read articles file: {}", path.display()))?;
    let articles: Vec<Article> = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse articles file: {}", path.display()))?;
    Ok(dedup_by_url(articles))
}

/// Drop articles whose URL was already seen, keeping the first occurrence
pub fn dedup_by_url(articles: impl IntoIterator<Item = Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.url.clone()))
        .collect()
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 120) {
        Ok(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Err(_) => html.trim().to_string(),
    }
}
