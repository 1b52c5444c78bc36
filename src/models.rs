// Data models shared between pipeline stages.
//
// Documents come from the fetcher and are read-only afterwards. Each one is
// categorized exactly once into a CategorizedDocument; the corpus of those
// is what the co-occurrence builder consumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::terms::category::{Category, ExpandedTermSet};

/// One fetched article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (e.g. "PMID:12345" or a file name)
    pub id: String,
    /// Raw article text (title and abstract, or full text)
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Optional bibliographic metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    /// Publication date as reported by the source (often just a year)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Where the document came from ("pubmed", "directory")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    /// Display name: the title when known, otherwise the id.
    pub fn paper_name(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// Per-term occurrence counts within one category.
pub type TermCounts = BTreeMap<String, u32>;

/// Auxiliary disparity annotations detected in a document's text.
///
/// These are marker mentions (group -> count), not counted terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisparityMetadata {
    #[serde(default)]
    pub ethnicity: BTreeMap<String, u32>,
    #[serde(default)]
    pub income: BTreeMap<String, u32>,
}

impl DisparityMetadata {
    pub fn is_empty(&self) -> bool {
        self.ethnicity.is_empty() && self.income.is_empty()
    }
}

/// A document after normalization and term matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedDocument {
    pub paper_name: String,
    #[serde(default)]
    pub document_id: String,
    /// Normalized tokens joined by single spaces
    #[serde(default)]
    pub cleaned_text: String,
    /// Every category is present, matched or not
    pub categories: BTreeMap<Category, TermCounts>,
    #[serde(default)]
    pub disparity_metadata: DisparityMetadata,
    /// Set when the source text could not be processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
}

impl CategorizedDocument {
    /// An empty result with every category key present.
    pub fn empty(doc: &Document) -> Self {
        Self {
            paper_name: doc.paper_name().to_string(),
            document_id: doc.id.clone(),
            cleaned_text: String::new(),
            categories: Category::ALL
                .iter()
                .map(|&c| (c, TermCounts::new()))
                .collect(),
            disparity_metadata: DisparityMetadata::default(),
            processing_error: None,
        }
    }

    /// A flagged result for text that could not be processed.
    pub fn failed(doc: &Document, error: impl Into<String>) -> Self {
        let mut categorized = Self::empty(doc);
        categorized.processing_error = Some(error.into());
        categorized
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.cleaned_text.split_whitespace()
    }

    pub fn counts(&self, category: Category) -> Option<&TermCounts> {
        self.categories.get(&category)
    }

    /// Total matched occurrences for one category.
    pub fn mentions(&self, category: Category) -> u64 {
        self.counts(category)
            .map(|c| c.values().map(|&n| n as u64).sum())
            .unwrap_or(0)
    }

    /// Add any category keys missing from an older or hand-edited record.
    pub fn fill_missing_categories(&mut self) {
        for category in Category::ALL {
            self.categories.entry(category).or_default();
        }
    }

    /// Counted terms that are not in the vocabulary for their category.
    pub fn out_of_vocabulary(&self, terms: &ExpandedTermSet) -> Vec<(Category, String)> {
        self.categories
            .iter()
            .flat_map(|(&category, counts)| {
                counts
                    .keys()
                    .filter(move |t| !terms.contains(category, t))
                    .map(move |t| (category, t.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: Option<&str>) -> Document {
        Document {
            id: id.to_string(),
            text: "text".to_string(),
            metadata: DocumentMetadata {
                title: title.map(str::to_string),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_paper_name_prefers_title() {
        assert_eq!(doc("PMID:1", Some("A study")).paper_name(), "A study");
        assert_eq!(doc("PMID:1", Some("  ")).paper_name(), "PMID:1");
        assert_eq!(doc("PMID:1", None).paper_name(), "PMID:1");
    }

    #[test]
    fn test_empty_has_every_category() {
        let c = CategorizedDocument::empty(&doc("x", None));
        assert_eq!(c.categories.len(), Category::ALL.len());
        assert!(c.categories.values().all(|m| m.is_empty()));
    }

    #[test]
    fn test_out_of_vocabulary() {
        let mut terms = ExpandedTermSet::default();
        terms.insert(Category::MentalHealth, "PTSD");
        let mut c = CategorizedDocument::empty(&doc("x", None));
        let mh = c.categories.get_mut(&Category::MentalHealth).unwrap();
        mh.insert("PTSD".to_string(), 2);
        mh.insert("astrology".to_string(), 1);
        mh.insert("anxiety".to_string(), 0);

        let mut leaked = c.out_of_vocabulary(&terms);
        leaked.sort();
        assert_eq!(
            leaked,
            vec![
                (Category::MentalHealth, "anxiety".to_string()),
                (Category::MentalHealth, "astrology".to_string()),
            ]
        );
    }

    #[test]
    fn test_fill_missing_categories_from_partial_json() {
        let json = r#"{"paper_name": "p", "categories": {"Mental Health": {"PTSD": 1}}}"#;
        let mut c: CategorizedDocument = serde_json::from_str(json).unwrap();
        assert_eq!(c.categories.len(), 1);
        c.fill_missing_categories();
        assert_eq!(c.categories.len(), 4);
        assert_eq!(c.mentions(Category::MentalHealth), 1);
    }
}
