// Build the co-occurrence matrix from a categorized corpus.
//
// Documents are tallied independently on the rayon pool and the partial
// matrices are summed. Addition commutes, so the result is identical to a
// sequential pass regardless of how the corpus is split.

use rayon::prelude::*;
use tracing::info;

use super::matrix::CooccurrenceMatrix;
use crate::models::CategorizedDocument;

#[derive(Debug, Clone, Copy)]
pub struct CooccurrenceOptions {
    /// Only count pairs whose terms belong to different categories
    pub cross_category_only: bool,
}

impl Default for CooccurrenceOptions {
    fn default() -> Self {
        Self {
            cross_category_only: true,
        }
    }
}

/// Tally every document of `corpus` into one matrix.
pub fn build(corpus: &[CategorizedDocument], options: CooccurrenceOptions) -> CooccurrenceMatrix {
    let matrix = corpus
        .par_iter()
        .fold(
            || CooccurrenceMatrix::new(options.cross_category_only),
            |mut partial, doc| {
                partial.add_document(doc);
                partial
            },
        )
        .reduce(
            || CooccurrenceMatrix::new(options.cross_category_only),
            CooccurrenceMatrix::merge,
        );

    info!(
        documents = matrix.document_count(),
        skipped = matrix.skipped_documents(),
        pairs = matrix.len(),
        cross_category_only = options.cross_category_only,
        "Co-occurrence matrix built"
    );

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, DocumentMetadata};
    use crate::terms::category::Category;

    fn categorized(id: usize, entries: &[(Category, &str)]) -> CategorizedDocument {
        let doc = Document {
            id: format!("doc-{id}"),
            text: "x".to_string(),
            metadata: DocumentMetadata::default(),
        };
        let mut c = CategorizedDocument::empty(&doc);
        for &(category, term) in entries {
            c.categories
                .entry(category)
                .or_default()
                .insert(term.to_string(), 1);
        }
        c
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let corpus: Vec<CategorizedDocument> = (0..200)
            .map(|i| {
                let mut entries = vec![(Category::MentalHealth, "PTSD")];
                if i % 2 == 0 {
                    entries.push((Category::Epigenetics, "methylation"));
                }
                if i % 3 == 0 {
                    entries.push((Category::Socioeconomic, "poverty"));
                }
                categorized(i, &entries)
            })
            .collect();

        let parallel = build(&corpus, CooccurrenceOptions::default());
        let mut sequential = CooccurrenceMatrix::new(true);
        corpus.iter().for_each(|d| sequential.add_document(d));

        assert_eq!(parallel, sequential);
        assert_eq!(parallel.count("PTSD", "methylation"), 100);
        assert_eq!(parallel.count("PTSD", "poverty"), 67);
        assert_eq!(parallel.count("methylation", "poverty"), 34);
        assert_eq!(parallel.document_count(), 200);
    }

    #[test]
    fn test_empty_corpus() {
        let matrix = build(&[], CooccurrenceOptions::default());
        assert!(matrix.is_empty());
        assert_eq!(matrix.document_count(), 0);
    }
}
