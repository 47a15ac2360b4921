use anyhow::Result;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::article::{Article, CurationItem, CurationResult, ScoredArticle};
use crate::scorer::RelevanceScorer;

/// Selects and ranks articles for a query using a relevance scorer
pub struct FeedCurator {
    relevance_scorer: Arc<dyn RelevanceScorer>,
}

impl FeedCurator {
    pub fn new(relevance_scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { relevance_scorer }
    }

    /// Curate a news feed from `articles` for `query`.
    ///
    /// Articles are scored in consecutive batches of `batch_size` (`None` sends them all at
    /// once), batches strictly one after another. Articles scoring at least `min_score` are
    /// returned most relevant first; equal scores keep their input order. Finding nothing
    /// relevant yields an empty result, not an error.
    ///
    /// A scorer failure in any batch fails the whole call and discards earlier batches.
    ///
    /// # Panics
    ///
    /// Panics if `query` is empty or only whitespace.
    pub async fn curate(
        &self,
        query: &str,
        articles: &[Article],
        min_score: f32,
        batch_size: Option<NonZeroUsize>,
    ) -> Result<CurationResult> {
        assert!(!query.trim().is_empty(), "curation query must not be blank");

        info!(
            "Starting news curation job; query: \"{}\"; considering {} articles; articles per batch: {:?}",
            query.chars().take(100).collect::<String>(),
            articles.len(),
            batch_size
        );

        match self.select_relevant(query, articles, min_score, batch_size).await {
            Ok(relevant) => Ok(build_result(query, relevant)),
            Err(e) => {
                error!("Error during curation: {:#}", e);
                Err(e)
            }
        }
    }

    /// Score every batch and keep the articles at or above `min_score`, in input order
    async fn select_relevant(
        &self,
        query: &str,
        articles: &[Article],
        min_score: f32,
        batch_size: Option<NonZeroUsize>,
    ) -> Result<Vec<ScoredArticle>> {
        let batches = partition(articles, batch_size);
        let total_batches = batches.len();
        let mut relevant_articles: Vec<ScoredArticle> = Vec::new();

        for (i, batch) in batches.into_iter().enumerate() {
            debug!(
                "Scoring batch ({}/{}) of {} articles",
                i + 1,
                total_batches,
                batch.len()
            );

            let response = self.relevance_scorer.score_articles(batch, query).await?;
            if response.scores.len() != batch.len() {
                anyhow::bail!(
                    "scorer returned {} scores for a batch of {} articles",
                    response.scores.len(),
                    batch.len()
                );
            }

            let before = relevant_articles.len();
            relevant_articles.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(response.scores)
                    .filter(|(_, score)| score.score >= min_score),
            );

            debug!(
                "Found {} relevant articles in batch",
                relevant_articles.len() - before
            );
        }

        Ok(relevant_articles)
    }
}

/// Split `articles` into consecutive batches; `None` means a single batch.
/// An empty slice yields no batches.
fn partition(articles: &[Article], batch_size: Option<NonZeroUsize>) -> Vec<&[Article]> {
    if articles.is_empty() {
        return Vec::new();
    }
    match batch_size {
        Some(size) => articles.chunks(size.get()).collect(),
        None => vec![articles],
    }
}

fn build_result(query: &str, mut relevant: Vec<ScoredArticle>) -> CurationResult {
    if relevant.is_empty() {
        warn!("No articles met the minimum relevance criteria");
        return CurationResult::empty(query);
    }

    // Stable: ties keep their input order
    relevant.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

    let items: Vec<CurationItem> = relevant
        .into_iter()
        .map(|(article, score)| CurationItem::with_relevance(article, score))
        .collect();

    info!("Curation selected {} articles", items.len());

    CurationResult {
        query: query.to_string(),
        items,
    }
}
