// PubMed query generation from the term vocabulary.
//
// Each category contributes an OR group of its first few terms; the groups
// are ANDed so every hit touches all categories at once. Multi-word and
// hyphenated terms are quoted as phrases.

use crate::terms::category::{Category, ExpandedTermSet};

/// Terms taken from each category when no explicit count is given.
pub const DEFAULT_TERMS_PER_CATEGORY: usize = 5;

fn quote(term: &str) -> String {
    let term = term.trim().replace('"', "");
    if term.contains(char::is_whitespace) || term.contains('-') {
        format!("\"{term}\"")
    } else {
        term
    }
}

/// Build a boolean query. Categories without terms are left out; an empty
/// vocabulary gives an empty string.
pub fn build_query(terms: &ExpandedTermSet, per_category: usize) -> String {
    Category::ALL
        .iter()
        .filter_map(|&category| {
            let group: Vec<String> = terms
                .get(category)
                .iter()
                .filter(|t| !t.trim().is_empty())
                .take(per_category.max(1))
                .map(|t| quote(t))
                .collect();
            match group.len() {
                0 => None,
                1 => group.into_iter().next(),
                _ => Some(format!("({})", group.join(" OR "))),
            }
        })
        .collect::<Vec<String>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_are_anded_and_phrases_quoted() {
        let mut terms = ExpandedTermSet::default();
        terms.insert(Category::MentalHealth, "PTSD");
        terms.insert(Category::MentalHealth, "generational trauma");
        terms.insert(Category::Epigenetics, "methylation");
        terms.insert(Category::Socioeconomic, "low-income");
        terms.insert(Category::Socioeconomic, "poverty");

        assert_eq!(
            build_query(&terms, 5),
            "(PTSD OR \"generational trauma\") AND methylation AND (\"low-income\" OR poverty)"
        );
    }

    #[test]
    fn test_per_category_limit() {
        let mut terms = ExpandedTermSet::default();
        for t in ["a", "b", "c"] {
            terms.insert(Category::Ethnicity, t);
        }
        assert_eq!(build_query(&terms, 2), "(a OR b)");
    }

    #[test]
    fn test_empty_vocabulary() {
        assert_eq!(build_query(&ExpandedTermSet::default(), 5), "");
    }
}
