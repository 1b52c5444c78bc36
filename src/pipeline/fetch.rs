// Fetch stage: query or directory -> raw_documents.json.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::StageSummary;
use crate::artifacts::{ArtifactStore, EXPANDED_TERMS};
use crate::fetch::local::load_directory;
use crate::fetch::query::{build_query, DEFAULT_TERMS_PER_CATEGORY};
use crate::fetch::{DocumentSource, FetchOutcome};
use crate::terms::category::{ExpandedTermSet, SeedTermSet};

/// Query built from the expanded terms, or from the seeds when no
/// expansion has been written yet.
pub fn default_query(store: &ArtifactStore, seeds: &SeedTermSet) -> String {
    let terms = if store.exists(EXPANDED_TERMS) {
        match store.read_expanded_terms() {
            Ok(loaded) => loaded.value,
            Err(e) => {
                warn!(error = %e, "Could not read expanded terms, building query from seeds");
                ExpandedTermSet::from_seeds(seeds)
            }
        }
    } else {
        ExpandedTermSet::from_seeds(seeds)
    };
    build_query(&terms, DEFAULT_TERMS_PER_CATEGORY)
}

/// Fetch up to `limit` documents for `query` and persist them.
pub async fn run(
    store: &ArtifactStore,
    source: &dyn DocumentSource,
    query: &str,
    limit: usize,
) -> Result<StageSummary> {
    if query.trim().is_empty() {
        anyhow::bail!("No query to run: the term vocabulary is empty. Pass --query explicitly.");
    }
    info!(source = source.name(), query = query, limit = limit, "Fetching documents");
    let outcome = source
        .fetch(query, limit)
        .await
        .with_context(|| format!("Failed to fetch documents from {}", source.name()))?;
    persist(store, outcome)
}

/// Ingest a local directory of `*.txt` files and persist them.
pub fn run_directory(store: &ArtifactStore, dir: &Path) -> Result<StageSummary> {
    let outcome = load_directory(dir)?;
    persist(store, outcome)
}

fn persist(store: &ArtifactStore, outcome: FetchOutcome) -> Result<StageSummary> {
    let mut summary = StageSummary::new("fetch");
    summary.skipped = outcome.skipped;
    summary.failed = outcome.failed;

    let mut seen: HashSet<String> = HashSet::new();
    let mut documents = Vec::with_capacity(outcome.documents.len());
    for doc in outcome.documents {
        if seen.insert(doc.id.clone()) {
            documents.push(doc);
        } else {
            warn!(document = doc.id, "Duplicate document id, keeping the first");
            summary.skipped += 1;
        }
    }

    if documents.is_empty() {
        warn!("No documents fetched; downstream stages will see an empty corpus");
    }

    summary.processed = documents.len();
    summary.output = Some(
        store
            .write_documents(&documents)
            .context("Failed to write fetched documents")?,
    );
    Ok(summary)
}
