// Term expansion: seeds -> reference candidates -> filters -> expanded set.
//
// Each seed is queried independently through a bounded pool of concurrent
// requests. A failed or timed-out seed is logged and skipped; the rest of
// the expansion carries on. Results are merged in seed order, so the same
// source answers always produce the same term set.

use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::category::{term_key, Category, ExpandedTermSet, SeedTermSet};
use super::traits::{ReferenceSource, SimilarityScorer};
use crate::error::PipelineError;

/// Tunables for a single expansion run.
#[derive(Debug, Clone)]
pub struct ExpansionParams {
    /// Candidates scoring below this cosine similarity are dropped
    pub similarity_threshold: f64,
    /// At most this many candidates survive per seed
    pub max_candidates_per_seed: usize,
    /// Longer candidate phrases are rejected
    pub max_words: usize,
    /// Seed queries in flight at once
    pub concurrency: usize,
    /// Per-request budget; a seed that exceeds it is skipped
    pub request_timeout: Duration,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.35,
            max_candidates_per_seed: 25,
            max_words: 3,
            concurrency: 4,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// A seed whose candidate query failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSeed {
    pub category: Category,
    pub seed: String,
    pub error: String,
}

/// Counts from one expansion run, printed as the stage summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpansionReport {
    pub seeds_queried: usize,
    pub failed: Vec<FailedSeed>,
    pub candidates_seen: usize,
    pub candidates_rejected: usize,
    pub terms_added: usize,
}

impl ExpansionReport {
    pub fn seeds_succeeded(&self) -> usize {
        self.seeds_queried - self.failed.len()
    }

    /// True when at least one seed was queried and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.seeds_queried > 0 && self.failed.len() == self.seeds_queried
    }
}

/// Candidates that survived every filter for one seed.
struct SeedCandidates {
    kept: Vec<String>,
    seen: usize,
}

/// Expands seed terms through a reference source and an optional scorer.
pub struct TermExpander<'a> {
    source: &'a dyn ReferenceSource,
    scorer: Option<&'a dyn SimilarityScorer>,
    params: ExpansionParams,
}

impl<'a> TermExpander<'a> {
    pub fn new(source: &'a dyn ReferenceSource, params: ExpansionParams) -> Self {
        Self {
            source,
            scorer: None,
            params,
        }
    }

    /// Rank and threshold candidates by semantic similarity to the seed.
    pub fn with_scorer(mut self, scorer: &'a dyn SimilarityScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Expand every category's seeds.
    ///
    /// The result always contains every seed. Fails only when every seed
    /// query failed, which means the source itself is unreachable.
    pub async fn expand(&self, seeds: &SeedTermSet) -> Result<(ExpandedTermSet, ExpansionReport)> {
        let mut expanded = ExpandedTermSet::from_seeds(seeds);
        let mut report = ExpansionReport::default();
        let pairs = seeds.pairs();
        report.seeds_queried = pairs.len();

        if self.scorer.is_none() {
            info!("No similarity scorer configured, candidates are not ranked");
        }

        let pb = ProgressBar::new(pairs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar().template("  Expanding [{bar:30}] {pos}/{len} ({eta})")?,
        );

        let concurrency = self.params.concurrency.max(1);
        let results: Vec<(Category, String, Result<SeedCandidates>)> =
            stream::iter(pairs.into_iter().map(|(category, seed)| {
                let pb = pb.clone();
                async move {
                    let outcome = self.candidates_for(&seed).await;
                    pb.inc(1);
                    (category, seed, outcome)
                }
            }))
            .buffered(concurrency)
            .collect()
            .await;
        pb.finish_and_clear();

        for (category, seed, outcome) in results {
            match outcome {
                Ok(candidates) => {
                    report.candidates_seen += candidates.seen;
                    report.candidates_rejected += candidates.seen - candidates.kept.len();
                    let mut added = 0;
                    for term in &candidates.kept {
                        if expanded.insert(category, term) {
                            added += 1;
                        }
                    }
                    report.terms_added += added;
                    debug!(category = %category, seed = seed, added = added, "Seed expanded");
                }
                Err(e) => {
                    warn!(category = %category, seed = seed, error = %e, "Seed query failed, skipping");
                    report.failed.push(FailedSeed {
                        category,
                        seed,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.all_failed() {
            return Err(PipelineError::external(
                self.source.name(),
                format!("all {} seed queries failed", report.seeds_queried),
            )
            .into());
        }

        info!(
            seeds = report.seeds_queried,
            failed = report.failed.len(),
            added = report.terms_added,
            total_terms = expanded.len(),
            "Term expansion complete"
        );

        Ok((expanded, report))
    }

    /// Query, filter and rank candidates for one seed.
    async fn candidates_for(&self, seed: &str) -> Result<SeedCandidates> {
        let timeout = self.params.request_timeout;

        let raw = tokio::time::timeout(timeout, self.source.candidates(seed))
            .await
            .map_err(|_| anyhow::anyhow!("candidate query timed out after {timeout:?}"))??;
        let seen = raw.len();

        let seed_key = term_key(seed);
        let shaped: Vec<String> = raw
            .into_iter()
            .filter(|c| term_key(c) != seed_key)
            .filter(|c| acceptable_shape(c, self.params.max_words))
            .collect();

        if shaped.is_empty() {
            return Ok(SeedCandidates {
                kept: Vec::new(),
                seen,
            });
        }

        let existing = tokio::time::timeout(timeout, self.source.existing(&shaped))
            .await
            .map_err(|_| anyhow::anyhow!("existence check timed out after {timeout:?}"))??;
        let valid: Vec<String> = shaped
            .into_iter()
            .filter(|c| existing.contains(c))
            .collect();

        let kept = match self.scorer {
            Some(scorer) if !valid.is_empty() => {
                let scores = scorer.similarities(seed, &valid).await?;
                rank_by_similarity(
                    valid,
                    &scores,
                    self.params.similarity_threshold,
                    self.params.max_candidates_per_seed,
                )
            }
            _ => {
                let mut valid = valid;
                valid.truncate(self.params.max_candidates_per_seed);
                valid
            }
        };

        Ok(SeedCandidates { kept, seen })
    }
}

/// Reject long phrases and compound titles ("X and Y", "X in Y").
pub fn acceptable_shape(candidate: &str, max_words: usize) -> bool {
    let words: Vec<String> = candidate
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if words.is_empty() || words.len() > max_words {
        return false;
    }
    !words.iter().any(|w| matches!(w.as_str(), "and" | "or" | "in"))
}

/// Keep candidates at or above the threshold, best first, at most `limit`.
///
/// Ties keep source order. A score list of the wrong length keeps nothing.
pub fn rank_by_similarity(
    candidates: Vec<String>,
    scores: &[f64],
    threshold: f64,
    limit: usize,
) -> Vec<String> {
    if scores.len() != candidates.len() {
        warn!(
            candidates = candidates.len(),
            scores = scores.len(),
            "Similarity scorer returned a mismatched score list"
        );
        return Vec::new();
    }

    let mut scored: Vec<(String, f64)> = candidates
        .into_iter()
        .zip(scores.iter().copied())
        .filter(|(_, s)| *s >= threshold)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored.into_iter().map(|(c, _)| c).collect()
}
