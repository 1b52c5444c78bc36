// Co-occurrence stage: preprocessed_articles.json -> modeling_output.json.

use anyhow::{Context, Result};

use super::StageSummary;
use crate::artifacts::ArtifactStore;
use crate::cooccurrence::{build, CooccurrenceMatrix, CooccurrenceOptions};

pub fn run(
    store: &ArtifactStore,
    options: CooccurrenceOptions,
) -> Result<(StageSummary, CooccurrenceMatrix)> {
    let mut summary = StageSummary::new("cooccur");

    let corpus = store.read_categorized()?;
    let matrix = build(&corpus.value, options);

    summary.processed = matrix.document_count();
    summary.skipped = corpus.skipped + matrix.skipped_documents();
    summary.output = Some(
        store
            .write_modeling_output(&matrix.to_output())
            .context("Failed to write co-occurrence output")?,
    );

    Ok((summary, matrix))
}
