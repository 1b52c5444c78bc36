// Corpus-level co-occurrence counts.
//
// Pairs are stored once under an ordered key (smaller term first), which is
// what makes count(a, b) == count(b, a) hold by construction. Every map is a
// BTreeMap so serialization order never depends on hashing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::CategorizedDocument;
use crate::terms::category::Category;

/// Per-category aggregate over the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    /// Sum of every matched term occurrence
    pub mentions: u64,
    /// Documents with at least one match
    pub documents: u32,
    /// Distinct terms matched anywhere in the corpus
    pub distinct_terms: usize,
}

/// One row of the pairwise matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    pub term_a: String,
    pub term_b: String,
    pub count: u32,
}

/// Documents matching both categories of an unordered category pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPairCount {
    pub category_a: Category,
    pub category_b: Category,
    pub documents: u32,
}

/// The `modeling_output.json` artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelingOutput {
    pub pairs: Vec<PairCount>,
    pub category_totals: BTreeMap<Category, CategoryTotals>,
    #[serde(default)]
    pub category_cooccurrence: Vec<CategoryPairCount>,
    #[serde(default)]
    pub document_count: usize,
    #[serde(default)]
    pub skipped_documents: usize,
    #[serde(default)]
    pub cross_category_only: bool,
}

/// Symmetric term-pair counts plus per-category summaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooccurrenceMatrix {
    pairs: BTreeMap<(String, String), u32>,
    category_pairs: BTreeMap<(Category, Category), u32>,
    mentions: BTreeMap<Category, u64>,
    documents: BTreeMap<Category, u32>,
    terms: BTreeMap<Category, BTreeSet<String>>,
    document_count: usize,
    skipped_documents: usize,
    cross_category_only: bool,
}

/// Ordered key for an unordered pair.
fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// True when the two terms can be attributed to different categories.
fn crosses(a: &BTreeSet<Category>, b: &BTreeSet<Category>) -> bool {
    a.iter().any(|ca| b.iter().any(|cb| ca != cb))
}

impl CooccurrenceMatrix {
    pub fn new(cross_category_only: bool) -> Self {
        Self {
            cross_category_only,
            ..Default::default()
        }
    }

    /// Tally one document. Each pair gains at most 1 per document.
    pub fn add_document(&mut self, doc: &CategorizedDocument) {
        if doc.processing_error.is_some() {
            self.skipped_documents += 1;
            return;
        }
        self.document_count += 1;

        // Surface term -> categories it matched in
        let mut present: BTreeMap<&str, BTreeSet<Category>> = BTreeMap::new();
        let mut matched_categories: Vec<Category> = Vec::new();

        for (&category, counts) in &doc.categories {
            let mut any = false;
            for (term, &n) in counts {
                if n == 0 {
                    continue;
                }
                any = true;
                *self.mentions.entry(category).or_insert(0) += n as u64;
                self.terms.entry(category).or_default().insert(term.clone());
                present.entry(term.as_str()).or_default().insert(category);
            }
            if any {
                *self.documents.entry(category).or_insert(0) += 1;
                matched_categories.push(category);
            }
        }

        let terms: Vec<(&str, &BTreeSet<Category>)> =
            present.iter().map(|(t, c)| (*t, c)).collect();
        for (i, (a, a_cats)) in terms.iter().enumerate() {
            for (b, b_cats) in &terms[i + 1..] {
                if self.cross_category_only && !crosses(a_cats, b_cats) {
                    continue;
                }
                *self.pairs.entry(pair_key(a, b)).or_insert(0) += 1;
            }
        }

        for (i, &ca) in matched_categories.iter().enumerate() {
            for &cb in &matched_categories[i + 1..] {
                *self.category_pairs.entry((ca, cb)).or_insert(0) += 1;
            }
        }
    }

    /// Sum two partial matrices built with the same options.
    pub fn merge(mut self, other: Self) -> Self {
        for (key, n) in other.pairs {
            *self.pairs.entry(key).or_insert(0) += n;
        }
        for (key, n) in other.category_pairs {
            *self.category_pairs.entry(key).or_insert(0) += n;
        }
        for (category, n) in other.mentions {
            *self.mentions.entry(category).or_insert(0) += n;
        }
        for (category, n) in other.documents {
            *self.documents.entry(category).or_insert(0) += n;
        }
        for (category, terms) in other.terms {
            self.terms.entry(category).or_default().extend(terms);
        }
        self.document_count += other.document_count;
        self.skipped_documents += other.skipped_documents;
        self
    }

    /// Documents containing both terms. Zero for a term with itself.
    pub fn count(&self, a: &str, b: &str) -> u32 {
        if a == b {
            return 0;
        }
        self.pairs.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    /// Documents with matches in both categories.
    pub fn category_count(&self, a: Category, b: Category) -> u32 {
        if a == b {
            return 0;
        }
        let key = if a < b { (a, b) } else { (b, a) };
        self.category_pairs.get(&key).copied().unwrap_or(0)
    }

    /// Number of distinct pairs with a nonzero count.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Documents that contributed to the counts.
    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Flagged documents left out of the counts.
    pub fn skipped_documents(&self) -> usize {
        self.skipped_documents
    }

    pub fn cross_category_only(&self) -> bool {
        self.cross_category_only
    }

    /// Pairs in key order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, u32)> {
        self.pairs
            .iter()
            .map(|((a, b), &n)| (a.as_str(), b.as_str(), n))
    }

    /// Highest counts first; ties in key order.
    pub fn top_pairs(&self, n: usize) -> Vec<(&str, &str, u32)> {
        let mut pairs: Vec<(&str, &str, u32)> = self.pairs().collect();
        pairs.sort_by(|x, y| y.2.cmp(&x.2).then_with(|| (x.0, x.1).cmp(&(y.0, y.1))));
        pairs.truncate(n);
        pairs
    }

    /// Totals for every category, including ones with no matches.
    pub fn category_totals(&self) -> BTreeMap<Category, CategoryTotals> {
        Category::ALL
            .iter()
            .map(|&c| {
                let totals = CategoryTotals {
                    mentions: self.mentions.get(&c).copied().unwrap_or(0),
                    documents: self.documents.get(&c).copied().unwrap_or(0),
                    distinct_terms: self.terms.get(&c).map(BTreeSet::len).unwrap_or(0),
                };
                (c, totals)
            })
            .collect()
    }

    /// The serializable artifact form.
    pub fn to_output(&self) -> ModelingOutput {
        ModelingOutput {
            pairs: self
                .pairs()
                .map(|(a, b, count)| PairCount {
                    term_a: a.to_string(),
                    term_b: b.to_string(),
                    count,
                })
                .collect(),
            category_totals: self.category_totals(),
            category_cooccurrence: self
                .category_pairs
                .iter()
                .map(|(&(category_a, category_b), &documents)| CategoryPairCount {
                    category_a,
                    category_b,
                    documents,
                })
                .collect(),
            document_count: self.document_count,
            skipped_documents: self.skipped_documents,
            cross_category_only: self.cross_category_only,
        }
    }
}
