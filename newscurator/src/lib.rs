// Library interface for newscurator modules
// This allows tests and other binaries to import modules

pub mod article;
pub mod curator;
pub mod ingestion;
pub mod llm;
pub mod scorer;

pub use article::{Article, CurationItem, CurationResult, DimensionScore, Score, RELEVANCE};
pub use curator::FeedCurator;
pub use scorer::{LlmRelevanceScorer, RelevanceScorer, ScorerResponse, SystemPrompt};
