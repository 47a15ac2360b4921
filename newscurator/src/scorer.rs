use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::article::{Article, Score};
use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};

/// Scores returned for one batch, in the same order as the articles that were sent
#[derive(Debug, Clone, Default)]
pub struct ScorerResponse {
    pub scores: Vec<Score>,
}

/// Produces one relevance score per article for a query.
///
/// Implementations must return exactly one score per input article, positionally
/// aligned with `articles`. Any failure is fatal for the curation call that issued it.
#[async_trait::async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score_articles(&self, articles: &[Article], query: &str) -> Result<ScorerResponse>;
}

/// Low temperature for consistent scoring
const DEFAULT_TEMPERATURE: f32 = 0.2;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a news editor curating a personalized feed. \
You judge how relevant each article is to the reader's request, using only the \
information given. Be strict: tangential mentions are not relevant.";

/// System prompt handed to the scoring model, fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct SystemPrompt(String);

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        Self(DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

/// Relevance scorer backed by an LLM provider
pub struct LlmRelevanceScorer {
    provider: Arc<dyn LlmProvider>,
    system_prompt: SystemPrompt,
    summary_max_chars: usize,
    max_tokens: Option<usize>,
    temperature: f32,
}

impl LlmRelevanceScorer {
    pub fn new(provider: Arc<dyn LlmProvider>, system_prompt: Option<SystemPrompt>) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.unwrap_or_default(),
            summary_max_chars: 600,
            max_tokens: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Article summaries longer than this are cut in the prompt
    pub fn with_summary_max_chars(mut self, max_chars: usize) -> Self {
        self.summary_max_chars = max_chars;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn system_prompt(&self) -> &SystemPrompt {
        &self.system_prompt
    }

    fn build_prompt(&self, articles: &[Article], query: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("Rate how relevant each of the following news articles is to the reader's request.\n\n");
        let _ = writeln!(prompt, "READER REQUEST:\n{}\n", query.trim());
        let _ = writeln!(prompt, "ARTICLES ({}):", articles.len());

        for (index, article) in articles.iter().enumerate() {
            let _ = writeln!(prompt, "\n[{}] {}", index, article.title);
            let _ = writeln!(prompt, "URL: {}", article.url);
            if let Some(source) = &article.source {
                let _ = writeln!(prompt, "Source: {}", source);
            }
            if let Some(published_at) = &article.published_at {
                let _ = writeln!(prompt, "Published: {}", published_at.to_rfc3339());
            }
            if let Some(summary) = &article.summary {
                let _ = writeln!(prompt, "Summary: {}", truncate_chars(summary.trim(), self.summary_max_chars));
            }
        }

        let _ = write!(
            prompt,
            r#"
OUTPUT FORMAT (strict JSON):
{{
  "scores": [
    {{"index": 0, "url": "article url", "score": 0.0, "reasoning": "one or two sentences"}}
  ]
}}

Return exactly {} entries, one per article, in the same order as listed above.
"score" is a number between 0.0 (unrelated) and 1.0 (exactly what the reader asked for).
"#,
            articles.len()
        );

        prompt
    }
}

#[async_trait::async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    async fn score_articles(&self, articles: &[Article], query: &str) -> Result<ScorerResponse> {
        if articles.is_empty() {
            return Ok(ScorerResponse::default());
        }

        let request = LlmRequest {
            system: Some(self.system_prompt.as_str().to_string()),
            prompt: self.build_prompt(articles, query),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            timeout_seconds: None,
        };

        let response = self
            .provider
            .generate(request)
            .await
            .context("LLM relevance scoring failed")?;

        debug!(
            "Relevance scoring used {} tokens (model: {})",
            response.usage.total_tokens, response.model
        );

        parse_scores(&response.content, articles)
    }
}

// Internal structures for parsing scorer JSON
#[derive(Debug, Deserialize)]
struct ScoresJson {
    scores: Vec<ScoreEntry>,
}

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    url: Option<String>,
    score: f32,
    #[serde(default)]
    reasoning: String,
}

/// Turn a model reply into scores aligned with `articles`.
///
/// Echoed indices and URLs are checked against the article at the same position when
/// present; the position itself is what ties a score to its article.
fn parse_scores(content: &str, articles: &[Article]) -> Result<ScorerResponse> {
    let cleaned_json = extract_json_from_text(content)
        .context("No valid JSON found in LLM scoring response")?;

    let parsed: ScoresJson = serde_json::from_str(&cleaned_json)
        .with_context(|| format!("Failed to parse LLM scores as JSON. Input was: {}", cleaned_json))?;

    if parsed.scores.len() != articles.len() {
        anyhow::bail!(
            "LLM returned {} scores for {} articles",
            parsed.scores.len(),
            articles.len()
        );
    }

    let mut scores = Vec::with_capacity(articles.len());
    for (position, (entry, article)) in parsed.scores.into_iter().zip(articles).enumerate() {
        if let Some(index) = entry.index {
            if index != position {
                anyhow::bail!(
                    "LLM score at position {} refers to article index {}",
                    position,
                    index
                );
            }
        }
        if let Some(url) = &entry.url {
            if url.trim() != article.url {
                anyhow::bail!(
                    "LLM score at position {} is for '{}', expected '{}'",
                    position,
                    url,
                    article.url
                );
            }
        }
        if !entry.score.is_finite() {
            anyhow::bail!("LLM score at position {} is not a number", position);
        }

        let clamped = entry.score.clamp(0.0, 1.0);
        if clamped != entry.score {
            warn!(
                "LLM score {} for '{}' is outside [0, 1], clamped to {}",
                entry.score, article.url, clamped
            );
        }
        scores.push(Score::new(clamped, entry.reasoning));
    }

    Ok(ScorerResponse { scores })
}

/// Cut `s` to at most `max_chars` characters, marking the cut with an ellipsis
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
    }
}
