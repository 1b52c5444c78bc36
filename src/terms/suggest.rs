// Corpus keyword suggestions for seed curation.
//
// Uses the `keyword_extraction` crate to rank words across the cleaned
// article texts by TF-IDF, then drops anything already covered by an
// expanded term. What remains are distinctive corpus words nobody has
// put into a category yet.

use std::collections::HashSet;

use anyhow::Result;
use keyword_extraction::tf_idf::{TfIdf, TfIdfParams};
use serde::Serialize;
use stop_words::{get, LANGUAGE};
use tracing::info;

use super::category::ExpandedTermSet;

/// A ranked keyword not yet present in the vocabulary.
#[derive(Debug, Clone, Serialize)]
pub struct KeywordSuggestion {
    pub keyword: String,
    pub score: f32,
}

/// TF-IDF keyword suggester. Each article is one document for IDF.
pub struct KeywordSuggester {
    /// How many keywords to rank before filtering known terms
    pub top_n_keywords: usize,
    /// Keywords shorter than this are ignored
    pub min_length: usize,
}

impl Default for KeywordSuggester {
    fn default() -> Self {
        Self {
            top_n_keywords: 200,
            min_length: 3,
        }
    }
}

impl KeywordSuggester {
    /// Rank corpus keywords and return up to `limit` not covered by `terms`.
    pub fn suggest(
        &self,
        texts: &[String],
        terms: &ExpandedTermSet,
        limit: usize,
    ) -> Result<Vec<KeywordSuggestion>> {
        if texts.is_empty() {
            anyhow::bail!("No article texts to analyze, run `epitrace categorize` first");
        }

        let stop_words: Vec<String> = get(LANGUAGE::English);
        let params = TfIdfParams::UnprocessedDocuments(texts, &stop_words, None);
        let tfidf = TfIdf::new(params);
        let ranked: Vec<(String, f32)> = tfidf.get_ranked_word_scores(self.top_n_keywords);

        // Every word of every known term counts as covered.
        let covered: HashSet<String> = terms
            .iter()
            .flat_map(|(_, list)| list.iter())
            .flat_map(|t| {
                t.split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                    .map(|w| w.to_lowercase())
                    .collect::<Vec<_>>()
            })
            .collect();

        let suggestions: Vec<KeywordSuggestion> = ranked
            .into_iter()
            .filter(|(word, _)| word.chars().count() >= self.min_length)
            .filter(|(word, _)| !word.chars().all(|c| c.is_ascii_digit()))
            .filter(|(word, _)| !covered.contains(&word.to_lowercase()))
            .take(limit)
            .map(|(keyword, score)| KeywordSuggestion { keyword, score })
            .collect();

        info!(
            documents = texts.len(),
            suggestions = suggestions.len(),
            "Ranked corpus keyword suggestions"
        );

        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::category::Category;

    #[test]
    fn test_suggest_skips_known_terms() {
        let texts = vec![
            "glucocorticoid receptor methylation childhood adversity cortisol".to_string(),
            "cortisol reactivity adolescent depression neighborhood deprivation".to_string(),
            "telomere length cortisol deprivation adversity".to_string(),
            "methylation clock aging acceleration".to_string(),
        ];
        let mut terms = ExpandedTermSet::default();
        terms.insert(Category::Epigenetics, "methylation");
        terms.insert(Category::MentalHealth, "depression");

        let suggestions = KeywordSuggester::default().suggest(&texts, &terms, 10).unwrap();
        assert!(!suggestions.is_empty());
        assert!(suggestions.len() <= 10);
        assert!(suggestions.iter().all(|s| s.keyword != "methylation"));
        assert!(suggestions.iter().all(|s| s.keyword != "depression"));
    }

    #[test]
    fn test_suggest_empty_fails() {
        let result = KeywordSuggester::default().suggest(&[], &ExpandedTermSet::default(), 5);
        assert!(result.is_err());
    }
}
