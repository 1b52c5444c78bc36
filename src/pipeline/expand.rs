// Expand stage: seeds -> expanded_terms.json.
//
// An existing artifact is reused unless a refresh is requested. When the
// reference source is entirely unreachable, a previously written artifact
// is used instead; only with no artifact at all does the stage fail.

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::StageSummary;
use crate::artifacts::{ArtifactStore, EXPANDED_TERMS};
use crate::terms::category::{ExpandedTermSet, SeedTermSet};
use crate::terms::expander::{ExpansionParams, ExpansionReport, TermExpander};
use crate::terms::traits::{ReferenceSource, SimilarityScorer};

/// The vocabulary every later stage reads, and how it was obtained.
#[derive(Debug)]
pub struct ExpandOutcome {
    pub terms: ExpandedTermSet,
    /// None when the artifact was reused without querying the source
    pub report: Option<ExpansionReport>,
    pub summary: StageSummary,
}

/// Previously expanded terms with the current seeds folded back in, so a
/// seed list edited since the last run is still fully present. The merged
/// set is written back when it gained seeds, since later stages read the
/// artifact rather than this return value.
fn cached_with_seeds(store: &ArtifactStore, seeds: &SeedTermSet) -> Result<(ExpandedTermSet, usize)> {
    let loaded = store.read_expanded_terms()?;
    let mut terms = ExpandedTermSet::from_seeds(seeds);
    for (category, list) in loaded.value.iter() {
        for term in list {
            terms.insert(category, term);
        }
    }

    let added = terms.len().saturating_sub(loaded.value.len());
    if added > 0 {
        info!(added = added, "Cached expanded terms were missing seeds, rewriting");
        store
            .write_expanded_terms(&terms)
            .context("Failed to write expanded terms")?;
    }
    Ok((terms, loaded.skipped))
}

pub async fn run(
    store: &ArtifactStore,
    source: &dyn ReferenceSource,
    scorer: Option<&dyn SimilarityScorer>,
    params: ExpansionParams,
    seeds: &SeedTermSet,
    refresh: bool,
) -> Result<ExpandOutcome> {
    let mut summary = StageSummary::new("expand");

    if !refresh && store.exists(EXPANDED_TERMS) {
        let (terms, skipped) = cached_with_seeds(store, seeds)?;
        info!(terms = terms.len(), "Reusing cached expanded terms");
        summary.processed = terms.len();
        summary.skipped = skipped;
        summary.cached = true;
        summary.output = Some(store.path(EXPANDED_TERMS));
        return Ok(ExpandOutcome {
            terms,
            report: None,
            summary,
        });
    }

    let mut expander = TermExpander::new(source, params);
    if let Some(scorer) = scorer {
        expander = expander.with_scorer(scorer);
    }

    match expander.expand(seeds).await {
        Ok((terms, report)) => {
            let collisions = terms.cross_category_collisions();
            if !collisions.is_empty() {
                info!(
                    count = collisions.len(),
                    terms = ?collisions,
                    "Terms listed in more than one category"
                );
            }

            summary.processed = report.seeds_succeeded();
            summary.skipped = report.candidates_rejected;
            summary.failed = report.failed.len();
            summary.output = Some(
                store
                    .write_expanded_terms(&terms)
                    .context("Failed to write expanded terms")?,
            );

            Ok(ExpandOutcome {
                terms,
                report: Some(report),
                summary,
            })
        }
        Err(e) if store.exists(EXPANDED_TERMS) => {
            warn!(error = %e, "Reference source unreachable, falling back to cached expanded terms");
            let (terms, skipped) = cached_with_seeds(store, seeds)?;
            summary.processed = terms.len();
            summary.skipped = skipped;
            summary.failed = seeds.len();
            summary.cached = true;
            summary.output = Some(store.path(EXPANDED_TERMS));
            Ok(ExpandOutcome {
                terms,
                report: None,
                summary,
            })
        }
        Err(e) => Err(e.context("Term expansion failed and no cached expanded terms exist")),
    }
}
