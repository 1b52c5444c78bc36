// Categorize stage: raw_documents.json + expanded_terms.json ->
// preprocessed_articles.json.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::StageSummary;
use crate::artifacts::ArtifactStore;
use crate::models::CategorizedDocument;
use crate::text::Categorizer;

pub fn run(store: &ArtifactStore) -> Result<(StageSummary, Vec<CategorizedDocument>)> {
    let mut summary = StageSummary::new("categorize");

    let terms = store.read_expanded_terms()?;
    let documents = store.read_documents()?;
    summary.skipped = terms.skipped + documents.skipped;

    let categorizer = Categorizer::new(&terms.value);
    info!(
        terms = terms.value.len(),
        patterns = categorizer.pattern_count(),
        documents = documents.value.len(),
        "Categorizing documents"
    );

    let pb = ProgressBar::new(documents.value.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar().template("  Categorizing [{bar:30}] {pos}/{len} ({eta})")?,
    );

    let mut corpus = Vec::with_capacity(documents.value.len());
    for doc in &documents.value {
        let categorized = categorizer.categorize(doc);
        debug_assert!(categorized.out_of_vocabulary(&terms.value).is_empty());
        if categorized.processing_error.is_some() {
            summary.failed += 1;
        } else {
            summary.processed += 1;
        }
        corpus.push(categorized);
        pb.inc(1);
    }
    pb.finish_and_clear();

    summary.output = Some(
        store
            .write_categorized(&corpus)
            .context("Failed to write categorized articles")?,
    );

    Ok((summary, corpus))
}
