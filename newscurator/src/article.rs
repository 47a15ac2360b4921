use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the relevance dimension in [`CurationItem::scores`]
pub const RELEVANCE: &str = "relevance";

/// A news article, identified by its URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    /// Plain-text summary or lead paragraph
    #[serde(default)]
    pub summary: Option<String>,
    /// Feed or site the article came from
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            summary: None,
            source: None,
            published_at: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Relevance score (0.0 to 1.0) with the scorer's rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub score: f32,
    pub reasoning: String,
}

impl Score {
    pub fn new(score: f32, reasoning: impl Into<String>) -> Self {
        Self {
            score,
            reasoning: reasoning.into(),
        }
    }
}

/// An article paired with the score it received within one curation run
pub type ScoredArticle = (Article, Score);

/// Score for one dimension of a curation item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: f32,
    pub reasoning: String,
}

impl From<Score> for DimensionScore {
    fn from(s: Score) -> Self {
        Self {
            score: s.score,
            reasoning: s.reasoning,
        }
    }
}

/// A selected article and its scores, keyed by dimension name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationItem {
    pub item: Article,
    pub scores: BTreeMap<String, DimensionScore>,
}

impl CurationItem {
    /// Item carrying a single relevance dimension
    pub fn with_relevance(article: Article, relevance: Score) -> Self {
        let mut scores = BTreeMap::new();
        scores.insert(RELEVANCE.to_string(), DimensionScore::from(relevance));
        Self {
            item: article,
            scores,
        }
    }

    pub fn relevance(&self) -> Option<&DimensionScore> {
        self.scores.get(RELEVANCE)
    }
}

/// Outcome of a curation call: the query and the selected articles, most relevant first.
/// An empty `items` list is a valid outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationResult {
    pub query: String,
    pub items: Vec<CurationItem>,
}

impl CurationResult {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// URLs of the selected articles, in result order
    pub fn urls(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.item.url.as_str()).collect()
    }
}
