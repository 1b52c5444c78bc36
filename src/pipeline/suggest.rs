// Keyword suggestions over the categorized corpus.

use anyhow::Result;

use crate::artifacts::ArtifactStore;
use crate::terms::suggest::{KeywordSuggester, KeywordSuggestion};

/// Top corpus keywords not yet covered by the expanded terms.
pub fn run(store: &ArtifactStore, top: usize) -> Result<Vec<KeywordSuggestion>> {
    let terms = store.read_expanded_terms()?;
    let corpus = store.read_categorized()?;

    let texts: Vec<String> = corpus
        .value
        .into_iter()
        .filter(|c| c.processing_error.is_none() && !c.cleaned_text.is_empty())
        .map(|c| c.cleaned_text)
        .collect();

    KeywordSuggester::default().suggest(&texts, &terms.value, top)
}
