// Unit tests for term expansion.
//
// The reference source and similarity scorer are replaced by in-process
// implementations, so these run without network access or model files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use epitrace::error::PipelineError;
use epitrace::terms::category::{Category, SeedTermSet};
use epitrace::terms::expander::{ExpansionParams, TermExpander};
use epitrace::terms::traits::{ReferenceSource, SimilarityScorer};

/// Answers from a fixed table; unknown terms return no candidates.
#[derive(Default)]
struct FixedSource {
    answers: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    slow: HashSet<String>,
    missing_titles: HashSet<String>,
}

impl FixedSource {
    fn answer(mut self, term: &str, candidates: &[&str]) -> Self {
        self.answers.insert(
            term.to_string(),
            candidates.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn fail(mut self, term: &str) -> Self {
        self.failing.insert(term.to_string());
        self
    }

    fn slow(mut self, term: &str) -> Self {
        self.slow.insert(term.to_string());
        self
    }

    fn missing(mut self, title: &str) -> Self {
        self.missing_titles.insert(title.to_string());
        self
    }
}

#[async_trait]
impl ReferenceSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn candidates(&self, term: &str) -> Result<Vec<String>> {
        if self.failing.contains(term) {
            anyhow::bail!("connection reset while querying {term}");
        }
        if self.slow.contains(term) {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(self.answers.get(term).cloned().unwrap_or_default())
    }

    async fn existing(&self, titles: &[String]) -> Result<HashSet<String>> {
        Ok(titles
            .iter()
            .filter(|t| !self.missing_titles.contains(*t))
            .cloned()
            .collect())
    }
}

/// Scores candidates from a fixed table; unknown candidates score 0.
struct FixedScorer(HashMap<String, f64>);

#[async_trait]
impl SimilarityScorer for FixedScorer {
    async fn similarities(&self, _seed: &str, candidates: &[String]) -> Result<Vec<f64>> {
        Ok(candidates
            .iter()
            .map(|c| self.0.get(c).copied().unwrap_or(0.0))
            .collect())
    }
}

fn seeds(entries: &[(Category, &[&str])]) -> SeedTermSet {
    let mut map = BTreeMap::new();
    for (category, terms) in entries {
        map.insert(*category, terms.iter().map(|s| s.to_string()).collect());
    }
    SeedTermSet::new(map)
}

fn fast_params() -> ExpansionParams {
    ExpansionParams {
        request_timeout: Duration::from_millis(100),
        ..ExpansionParams::default()
    }
}

// ============================================================
// Seeds are never dropped
// ============================================================

#[tokio::test]
async fn ptsd_seed_expands_to_full_name() {
    let source = FixedSource::default().answer("PTSD", &["PTSD", "post-traumatic stress disorder"]);
    let seeds = seeds(&[(Category::MentalHealth, &["PTSD"])]);

    let (expanded, report) = TermExpander::new(&source, fast_params())
        .expand(&seeds)
        .await
        .unwrap();

    let mental = expanded.get(Category::MentalHealth);
    assert!(mental.contains(&"PTSD".to_string()));
    assert!(mental.contains(&"post-traumatic stress disorder".to_string()));
    assert_eq!(mental.len(), 2);
    assert_eq!(report.terms_added, 1);
}

#[tokio::test]
async fn expanded_set_is_superset_of_default_seeds() {
    let source = FixedSource::default()
        .answer("depression", &["Major depressive disorder", "Depression and anxiety"])
        .answer("methylation", &["DNA methylation", "Histone"]);
    let seeds = SeedTermSet::default();

    let (expanded, _) = TermExpander::new(&source, fast_params())
        .expand(&seeds)
        .await
        .unwrap();

    for category in Category::ALL {
        for seed in seeds.get(category) {
            assert!(
                expanded.contains(category, seed),
                "seed {seed:?} missing from {category}"
            );
        }
    }
    assert!(expanded.contains(Category::Epigenetics, "DNA methylation"));
    // Compound titles are rejected
    assert!(!expanded.contains(Category::MentalHealth, "Depression and anxiety"));
}

// ============================================================
// Partial failure tolerance
// ============================================================

#[tokio::test]
async fn one_failing_seed_does_not_abort_expansion() {
    let source = FixedSource::default()
        .answer("depression", &["Dysthymia"])
        .answer("anxiety", &["Panic disorder"])
        .fail("suicide")
        .answer("bipolar", &["Mania"])
        .answer("PTSD", &["Complex PTSD"]);
    let seeds = seeds(&[(
        Category::MentalHealth,
        &["depression", "anxiety", "suicide", "bipolar", "PTSD"],
    )]);

    let (expanded, report) = TermExpander::new(&source, fast_params())
        .expand(&seeds)
        .await
        .unwrap();

    assert_eq!(report.seeds_queried, 5);
    assert_eq!(report.seeds_succeeded(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].seed, "suicide");

    for added in ["Dysthymia", "Panic disorder", "Mania", "Complex PTSD"] {
        assert!(expanded.contains(Category::MentalHealth, added), "missing {added}");
    }
    // The failed seed itself is still present
    assert!(expanded.contains(Category::MentalHealth, "suicide"));
}

#[tokio::test]
async fn slow_seed_times_out_and_is_skipped() {
    let source = FixedSource::default()
        .answer("FKBP5", &["Glucocorticoid receptor"])
        .slow("OXTR");
    let seeds = seeds(&[(Category::Epigenetics, &["FKBP5", "OXTR"])]);

    let (expanded, report) = TermExpander::new(&source, fast_params())
        .expand(&seeds)
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].seed, "OXTR");
    assert!(report.failed[0].error.contains("timed out"));
    assert!(expanded.contains(Category::Epigenetics, "Glucocorticoid receptor"));
}

#[tokio::test]
async fn every_seed_failing_is_an_external_resource_error() {
    let source = FixedSource::default().fail("poverty").fail("illiteracy");
    let seeds = seeds(&[(Category::Socioeconomic, &["poverty", "illiteracy"])]);

    let err = TermExpander::new(&source, fast_params())
        .expand(&seeds)
        .await
        .unwrap_err();

    let typed = err.downcast_ref::<PipelineError>().expect("typed error");
    assert!(matches!(typed, PipelineError::ExternalResource { .. }));
}

// ============================================================
// Filters
// ============================================================

#[tokio::test]
async fn nonexistent_titles_are_rejected() {
    let source = FixedSource::default()
        .answer("BDNF", &["Neurotrophin", "Brain derived factor"])
        .missing("Brain derived factor");
    let seeds = seeds(&[(Category::Epigenetics, &["BDNF"])]);

    let (expanded, report) = TermExpander::new(&source, fast_params())
        .expand(&seeds)
        .await
        .unwrap();

    assert!(expanded.contains(Category::Epigenetics, "Neurotrophin"));
    assert!(!expanded.contains(Category::Epigenetics, "Brain derived factor"));
    assert_eq!(report.candidates_rejected, 1);
}

#[tokio::test]
async fn similarity_threshold_and_limit_apply() {
    let source = FixedSource::default().answer(
        "anxiety",
        &["Panic disorder", "Phobia", "Worry", "Ancient Greece"],
    );
    let scorer = FixedScorer(
        [
            ("Panic disorder", 0.8),
            ("Phobia", 0.6),
            ("Worry", 0.5),
            ("Ancient Greece", 0.1),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
    );
    let params = ExpansionParams {
        similarity_threshold: 0.4,
        max_candidates_per_seed: 2,
        ..fast_params()
    };
    let seeds = seeds(&[(Category::MentalHealth, &["anxiety"])]);

    let (expanded, _) = TermExpander::new(&source, params)
        .with_scorer(&scorer)
        .expand(&seeds)
        .await
        .unwrap();

    assert_eq!(
        expanded.get(Category::MentalHealth),
        &["anxiety".to_string(), "Panic disorder".to_string(), "Phobia".to_string()]
    );
}

#[tokio::test]
async fn duplicates_across_seeds_are_merged_case_insensitively() {
    let source = FixedSource::default()
        .answer("methylation", &["DNA methylation"])
        .answer("demethylation", &["DNA Methylation", "TET enzymes"]);
    let seeds = seeds(&[(Category::Epigenetics, &["methylation", "demethylation"])]);

    let (expanded, _) = TermExpander::new(&source, fast_params())
        .expand(&seeds)
        .await
        .unwrap();

    let epi = expanded.get(Category::Epigenetics);
    assert_eq!(epi.iter().filter(|t| t.eq_ignore_ascii_case("dna methylation")).count(), 1);
    assert!(epi.contains(&"DNA methylation".to_string()));
    assert!(epi.contains(&"TET enzymes".to_string()));
}

#[tokio::test]
async fn expansion_is_deterministic() {
    let source = FixedSource::default()
        .answer("latino", &["Latin Americans", "Chicano"])
        .answer("hispanic", &["Hispanic Americans", "Chicano"]);
    let seeds = seeds(&[(Category::Ethnicity, &["latino", "hispanic"])]);
    let params = ExpansionParams {
        concurrency: 2,
        ..fast_params()
    };

    let first = TermExpander::new(&source, params.clone()).expand(&seeds).await.unwrap().0;
    let second = TermExpander::new(&source, params).expand(&seeds).await.unwrap().0;
    assert_eq!(first, second);
}
