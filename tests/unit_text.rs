// Unit tests for normalization and categorization.
//
// Checks the per-document contract: every category key present, counts
// only for vocabulary terms, multi-word terms matched as contiguous
// tokens, and empty text flagged rather than dropped.

use epitrace::models::{CategorizedDocument, Document, DocumentMetadata};
use epitrace::terms::category::{Category, ExpandedTermSet};
use epitrace::text::{categorize, Categorizer, Normalizer};

fn doc(id: &str, text: &str) -> Document {
    Document {
        id: id.to_string(),
        text: text.to_string(),
        metadata: DocumentMetadata {
            title: Some(format!("Paper {id}")),
            ..Default::default()
        },
    }
}

fn vocabulary() -> ExpandedTermSet {
    let mut terms = ExpandedTermSet::default();
    for t in ["PTSD", "anxiety", "chronic stress", "generational trauma"] {
        terms.insert(Category::MentalHealth, t);
    }
    for t in ["methylation", "FKBP5", "histone modification", "5mC"] {
        terms.insert(Category::Epigenetics, t);
    }
    for t in ["low-income", "high-income", "poverty", "socioeconomic status"] {
        terms.insert(Category::Socioeconomic, t);
    }
    for t in ["african american", "latino", "indigenous"] {
        terms.insert(Category::Ethnicity, t);
    }
    terms
}

// ============================================================
// Counting
// ============================================================

#[test]
fn ptsd_twice_and_methylation_once() {
    let c = categorize(
        &doc("1", "PTSD was common. Patients with PTSD showed altered methylation."),
        &vocabulary(),
    );

    assert_eq!(c.counts(Category::MentalHealth).unwrap().get("PTSD"), Some(&2));
    assert_eq!(c.counts(Category::MentalHealth).unwrap().len(), 1);
    assert_eq!(c.counts(Category::Epigenetics).unwrap().get("methylation"), Some(&1));
    assert_eq!(c.counts(Category::Epigenetics).unwrap().len(), 1);
    assert_eq!(c.paper_name, "Paper 1");
}

#[test]
fn category_without_matches_is_present_and_empty() {
    let c = categorize(&doc("2", "Histone modification at FKBP5 after chronic stress."), &vocabulary());

    let socio = c.counts(Category::Socioeconomic).expect("key present");
    assert!(socio.is_empty());
    assert_eq!(c.categories.len(), Category::ALL.len());

    let json = serde_json::to_value(&c).unwrap();
    assert!(json["categories"]["Socioeconomic"].as_object().unwrap().is_empty());
}

#[test]
fn hyphenated_and_inflected_forms_match() {
    let c = categorize(
        &doc(
            "3",
            "Low income households and high-income households differed; \
             Latinos and African-American youth reported more anxiety.",
        ),
        &vocabulary(),
    );
    let socio = c.counts(Category::Socioeconomic).unwrap();
    assert_eq!(socio.get("low-income"), Some(&1));
    assert_eq!(socio.get("high-income"), Some(&1));

    let eth = c.counts(Category::Ethnicity).unwrap();
    assert_eq!(eth.get("latino"), Some(&1));
    assert_eq!(eth.get("african american"), Some(&1));
}

#[test]
fn partial_multi_word_term_does_not_match() {
    let c = categorize(
        &doc("4", "Chronic pain and acute stress were measured separately."),
        &vocabulary(),
    );
    assert!(c.counts(Category::MentalHealth).unwrap().get("chronic stress").is_none());
}

#[test]
fn acronyms_with_digits_match() {
    let c = categorize(&doc("5", "Global 5mC levels dropped."), &vocabulary());
    assert_eq!(c.counts(Category::Epigenetics).unwrap().get("5mC"), Some(&1));
}

// ============================================================
// Vocabulary invariant
// ============================================================

#[test]
fn counted_terms_are_always_in_vocabulary() {
    let terms = vocabulary();
    let categorizer = Categorizer::new(&terms);
    let texts = [
        "PTSD, anxiety and chronic stress among indigenous and latino adults in poverty.",
        "FKBP5 methylation and 5mC in low-income african american youth.",
        "Generational trauma and socioeconomic status shaped histone modification.",
        "Nothing relevant here about astronomy or cooking.",
    ];
    for (i, text) in texts.iter().enumerate() {
        let c = categorizer.categorize(&doc(&i.to_string(), text));
        assert!(c.out_of_vocabulary(&terms).is_empty(), "leak in {text:?}");
        for (category, counts) in &c.categories {
            for (term, n) in counts {
                assert!(*n > 0);
                assert!(terms.get(*category).contains(term));
            }
        }
    }
}

// ============================================================
// Flagged documents and disparity metadata
// ============================================================

#[test]
fn unreadable_text_is_flagged_not_dropped() {
    let categorizer = Categorizer::new(&vocabulary());
    let c = categorizer.categorize(&doc("6", ""));
    assert!(c.processing_error.is_some());
    assert_eq!(c.categories.len(), Category::ALL.len());
    assert!(c.categories.values().all(|m| m.is_empty()));
}

#[test]
fn stop_word_document_is_valid_with_no_matches() {
    let categorizer = Categorizer::new(&vocabulary());
    let c = categorizer.categorize(&doc("8", "The and of it. Which was there, for them?"));
    assert!(c.processing_error.is_none());
    assert!(c.cleaned_text.is_empty());
    assert_eq!(c.categories.len(), Category::ALL.len());
    assert!(c.categories.values().all(|m| m.is_empty()));
}

#[test]
fn disparity_metadata_is_auxiliary() {
    let c = categorize(
        &doc("7", "Among Hispanic and Black participants living in poverty, PTSD was frequent."),
        &vocabulary(),
    );
    assert_eq!(c.disparity_metadata.ethnicity.get("Latino/Hispanic descent"), Some(&1));
    assert_eq!(c.disparity_metadata.ethnicity.get("African descent"), Some(&1));
    assert_eq!(c.disparity_metadata.income.get("Low income"), Some(&1));
    // "Hispanic" is a marker, not a vocabulary term
    assert!(c.counts(Category::Ethnicity).unwrap().is_empty());
}

// ============================================================
// Serialization
// ============================================================

#[test]
fn corpus_json_round_trip_preserves_counts() {
    let categorizer = Categorizer::new(&vocabulary());
    let corpus: Vec<CategorizedDocument> = [
        "PTSD and methylation in latino adults.",
        "Poverty, anxiety and FKBP5.",
        "",
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| categorizer.categorize(&doc(&i.to_string(), text)))
    .collect();

    let json = serde_json::to_string(&corpus).unwrap();
    let back: Vec<CategorizedDocument> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, corpus);
}

#[test]
fn normalizer_matches_terms_and_text_alike() {
    let normalizer = Normalizer::protecting(["socioeconomic status"]);
    assert_eq!(
        normalizer.normalize("Socioeconomic statuses"),
        normalizer.normalize("socioeconomic status")
    );
}
