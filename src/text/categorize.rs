// Categorize documents by counting expanded-term occurrences.
//
// Terms are normalized once into token patterns. Article text is normalized
// the same way, then every pattern is matched as a contiguous token
// subsequence. Counts are keyed by the term's surface form from the
// expanded set, so nothing outside the vocabulary can be counted.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::disparity::{marker_phrases, DisparityDetector};
use super::normalize::Normalizer;
use crate::models::{CategorizedDocument, Document};
use crate::terms::category::{Category, ExpandedTermSet};

/// One vocabulary term compiled to normalized tokens.
#[derive(Debug, Clone)]
struct TermPattern {
    category: Category,
    term: String,
    tokens: Vec<String>,
}

/// Matches a fixed vocabulary against document text.
pub struct Categorizer {
    normalizer: Normalizer,
    patterns: Vec<TermPattern>,
    /// First token -> indices into `patterns`
    by_first_token: HashMap<String, Vec<usize>>,
    disparity: DisparityDetector,
}

impl Categorizer {
    /// Compile every term of `terms`.
    ///
    /// Two terms of one category that normalize to the same tokens
    /// ("CpG island" and "CpG islands") would double count, so only the
    /// first is kept. The same pattern in two categories counts in both.
    pub fn new(terms: &ExpandedTermSet) -> Self {
        let vocabulary = terms.iter().flat_map(|(_, list)| list.iter().map(String::as_str));
        let normalizer = Normalizer::protecting(vocabulary.chain(marker_phrases().map(|p| p as &str)));

        let mut patterns: Vec<TermPattern> = Vec::new();
        for (category, list) in terms.iter() {
            for term in list {
                let tokens = normalizer.normalize(term);
                if tokens.is_empty() {
                    debug!(category = %category, term = term, "Term normalizes to nothing, never matches");
                    continue;
                }
                let duplicate = patterns
                    .iter()
                    .any(|p| p.category == category && p.tokens == tokens);
                if duplicate {
                    debug!(category = %category, term = term, "Term duplicates an earlier pattern, skipping");
                    continue;
                }
                patterns.push(TermPattern {
                    category,
                    term: term.clone(),
                    tokens,
                });
            }
        }

        let mut by_first_token: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, pattern) in patterns.iter().enumerate() {
            by_first_token
                .entry(pattern.tokens[0].clone())
                .or_default()
                .push(i);
        }

        let disparity = DisparityDetector::new(&normalizer);

        Self {
            normalizer,
            patterns,
            by_first_token,
            disparity,
        }
    }

    /// Number of compiled term patterns.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Categorize one document.
    ///
    /// Never fails: text that cannot be processed yields empty counts with
    /// `processing_error` set.
    pub fn categorize(&self, doc: &Document) -> CategorizedDocument {
        if doc.text.trim().is_empty() {
            warn!(document = doc.id, "Document has no text");
            return CategorizedDocument::failed(doc, "document text is empty");
        }

        // Text made only of stop words or punctuation normalizes to nothing and
        // simply matches nothing.
        let tokens = self.normalizer.normalize_article(&doc.text);
        if tokens.is_empty() {
            debug!(document = doc.id, "Document has no content words");
        }

        let mut categorized = CategorizedDocument::empty(doc);
        for (start, token) in tokens.iter().enumerate() {
            let Some(candidates) = self.by_first_token.get(token) else {
                continue;
            };
            for &i in candidates {
                let pattern = &self.patterns[i];
                if tokens[start..].starts_with(&pattern.tokens) {
                    *categorized
                        .categories
                        .entry(pattern.category)
                        .or_default()
                        .entry(pattern.term.clone())
                        .or_insert(0) += 1;
                }
            }
        }

        categorized.disparity_metadata = self.disparity.detect(&tokens);
        categorized.cleaned_text = tokens.join(" ");
        categorized
    }
}

/// Categorize a single document against `terms`.
///
/// Compiles the vocabulary on every call; use [`Categorizer`] for batches.
pub fn categorize(doc: &Document, terms: &ExpandedTermSet) -> CategorizedDocument {
    Categorizer::new(terms).categorize(doc)
}
