// Unit tests for the co-occurrence builder.
//
// Documents are categorized from real text through the categorizer, so
// these also cover the categorize -> cooccur hand-off.

use epitrace::cooccurrence::{build, CooccurrenceOptions};
use epitrace::models::{CategorizedDocument, Document, DocumentMetadata};
use epitrace::terms::category::{Category, ExpandedTermSet};
use epitrace::text::Categorizer;

fn vocabulary() -> ExpandedTermSet {
    let mut terms = ExpandedTermSet::default();
    terms.insert(Category::MentalHealth, "PTSD");
    terms.insert(Category::MentalHealth, "anxiety");
    terms.insert(Category::Epigenetics, "methylation");
    terms.insert(Category::Epigenetics, "FKBP5");
    terms.insert(Category::Socioeconomic, "poverty");
    terms.insert(Category::Ethnicity, "latino");
    terms
}

fn corpus(texts: &[&str]) -> Vec<CategorizedDocument> {
    let categorizer = Categorizer::new(&vocabulary());
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            categorizer.categorize(&Document {
                id: format!("PMID:{i}"),
                text: text.to_string(),
                metadata: DocumentMetadata::default(),
            })
        })
        .collect()
}

// ============================================================
// Document-level counting
// ============================================================

#[test]
fn repeated_terms_contribute_once_per_document() {
    let docs = corpus(&["PTSD was common. Patients with PTSD showed altered methylation."]);
    let matrix = build(&docs, CooccurrenceOptions::default());
    assert_eq!(matrix.count("PTSD", "methylation"), 1);
}

#[test]
fn only_documents_with_both_terms_count() {
    let docs = corpus(&[
        "PTSD and methylation were both measured.",
        "PTSD alone was measured here.",
    ]);
    let matrix = build(&docs, CooccurrenceOptions::default());
    assert_eq!(matrix.count("PTSD", "methylation"), 1);
    assert_eq!(matrix.document_count(), 2);
}

#[test]
fn counts_are_symmetric_and_bounded_by_corpus_size() {
    let docs = corpus(&[
        "PTSD, anxiety and FKBP5 methylation in latino adults living in poverty.",
        "Anxiety and methylation.",
        "FKBP5 and poverty.",
        "PTSD among latino veterans.",
        "",
    ]);
    let matrix = build(&docs, CooccurrenceOptions::default());

    assert!(!matrix.is_empty());
    for (a, b, n) in matrix.pairs() {
        assert_eq!(matrix.count(a, b), matrix.count(b, a));
        assert_eq!(matrix.count(a, b), n);
        assert!(n as usize <= docs.len());
        assert!(n > 0);
    }
    for term in ["PTSD", "anxiety", "methylation"] {
        assert_eq!(matrix.count(term, term), 0);
    }
    assert_eq!(matrix.skipped_documents(), 1);
}

// ============================================================
// Options and determinism
// ============================================================

#[test]
fn same_category_pairs_only_when_enabled() {
    let docs = corpus(&["PTSD and anxiety with methylation."]);

    let cross = build(&docs, CooccurrenceOptions::default());
    assert_eq!(cross.count("PTSD", "anxiety"), 0);
    assert_eq!(cross.count("PTSD", "methylation"), 1);

    let all = build(
        &docs,
        CooccurrenceOptions {
            cross_category_only: false,
        },
    );
    assert_eq!(all.count("PTSD", "anxiety"), 1);
}

#[test]
fn rebuilding_unchanged_corpus_is_identical() {
    let texts: Vec<String> = (0..50)
        .map(|i| match i % 4 {
            0 => "PTSD and methylation".to_string(),
            1 => "anxiety, poverty and FKBP5".to_string(),
            2 => "latino adults with PTSD in poverty".to_string(),
            _ => "methylation of FKBP5 and anxiety".to_string(),
        })
        .collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let docs = corpus(&refs);

    let first = build(&docs, CooccurrenceOptions::default());
    let second = build(&docs, CooccurrenceOptions::default());
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.to_output()).unwrap(),
        serde_json::to_string(&second.to_output()).unwrap()
    );
}

#[test]
fn category_totals_summarize_mentions() {
    let docs = corpus(&[
        "PTSD, PTSD and anxiety with methylation.",
        "Anxiety in poverty.",
    ]);
    let matrix = build(&docs, CooccurrenceOptions::default());
    let totals = matrix.category_totals();

    assert_eq!(totals[&Category::MentalHealth].mentions, 4);
    assert_eq!(totals[&Category::MentalHealth].documents, 2);
    assert_eq!(totals[&Category::MentalHealth].distinct_terms, 2);
    assert_eq!(totals[&Category::Ethnicity].mentions, 0);
    assert_eq!(matrix.category_count(Category::MentalHealth, Category::Socioeconomic), 1);
    assert_eq!(matrix.category_count(Category::MentalHealth, Category::Epigenetics), 1);
}
