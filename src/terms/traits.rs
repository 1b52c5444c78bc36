// Candidate source traits for term expansion.
//
// The expander only needs two things from the outside world: related
// candidate strings for a seed, and a way to score how close a candidate is
// to that seed. Wikipedia and the local sentence embedder are the default
// implementations; tests plug in fixed in-memory sources.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

/// A lexical reference source that proposes related terms.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Human-readable name used in logs and error messages.
    fn name(&self) -> &str;

    /// Candidate related strings for a term. An unknown term yields an
    /// empty list; a transport failure yields an error.
    async fn candidates(&self, term: &str) -> Result<Vec<String>>;

    /// The subset of `titles` that are valid entries in the source.
    ///
    /// Default: every candidate the source itself proposed is valid.
    async fn existing(&self, titles: &[String]) -> Result<HashSet<String>> {
        Ok(titles.iter().cloned().collect())
    }
}

/// Scores semantic similarity between a seed and its candidates.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// One score per candidate, in the same order, between -1.0 and 1.0.
    async fn similarities(&self, seed: &str, candidates: &[String]) -> Result<Vec<f64>>;
}
