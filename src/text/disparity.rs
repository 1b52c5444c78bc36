// Disparity markers: ethnicity and income group mentions.
//
// These annotate a document with which population groups it talks about.
// They are reported alongside the category counts but never feed the
// co-occurrence graph.

use std::collections::BTreeMap;

use super::normalize::Normalizer;
use crate::models::DisparityMetadata;

/// Ethnicity group -> marker phrases.
pub const ETHNICITY_MARKERS: &[(&str, &[&str])] = &[
    ("African descent", &["african american", "african", "black"]),
    ("Latino/Hispanic descent", &["latino", "latina", "latinx", "hispanic"]),
    ("Asian descent", &["asian"]),
    (
        "Indigenous descent",
        &[
            "indigenous",
            "native american",
            "first nations",
            "american indian",
            "alaska native",
        ],
    ),
    ("Arab descent", &["arab", "middle eastern"]),
    ("European descent", &["european", "caucasian", "white american"]),
];

/// Income group -> marker phrases.
pub const INCOME_MARKERS: &[(&str, &[&str])] = &[
    ("Low income", &["low income", "poverty", "poor", "deprivation"]),
    ("Middle income", &["middle income"]),
    ("High income", &["high income", "affluent", "wealthy"]),
];

/// Every marker phrase, for stop-word protection.
pub fn marker_phrases() -> impl Iterator<Item = &'static str> {
    ETHNICITY_MARKERS
        .iter()
        .chain(INCOME_MARKERS.iter())
        .flat_map(|(_, phrases)| phrases.iter().copied())
}

type MarkerGroup = (String, Vec<Vec<String>>);

/// Compiled marker patterns, normalized the same way as article text.
pub struct DisparityDetector {
    ethnicity: Vec<MarkerGroup>,
    income: Vec<MarkerGroup>,
}

fn compile(normalizer: &Normalizer, markers: &[(&str, &[&str])]) -> Vec<MarkerGroup> {
    markers
        .iter()
        .map(|(group, phrases)| {
            let patterns: Vec<Vec<String>> = phrases
                .iter()
                .map(|p| normalizer.normalize(p))
                .filter(|p| !p.is_empty())
                .collect();
            (group.to_string(), patterns)
        })
        .collect()
}

impl DisparityDetector {
    pub fn new(normalizer: &Normalizer) -> Self {
        Self {
            ethnicity: compile(normalizer, ETHNICITY_MARKERS),
            income: compile(normalizer, INCOME_MARKERS),
        }
    }

    /// Count marker mentions per group in normalized tokens.
    ///
    /// A longer marker claims its tokens first, so "african american" is one
    /// mention, not an extra "african".
    pub fn detect(&self, tokens: &[String]) -> DisparityMetadata {
        DisparityMetadata {
            ethnicity: detect_groups(&self.ethnicity, tokens),
            income: detect_groups(&self.income, tokens),
        }
    }
}

fn detect_groups(groups: &[MarkerGroup], tokens: &[String]) -> BTreeMap<String, u32> {
    let mut claimed = vec![false; tokens.len()];
    let mut ordered: Vec<(&str, &[String])> = groups
        .iter()
        .flat_map(|(group, patterns)| patterns.iter().map(move |p| (group.as_str(), p.as_slice())))
        .collect();
    ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

    let mut found = BTreeMap::new();
    for (group, pattern) in ordered {
        let mut hits = 0u32;
        let mut i = 0;
        while i + pattern.len() <= tokens.len() {
            let window = &tokens[i..i + pattern.len()];
            if window == pattern && !claimed[i..i + pattern.len()].iter().any(|&c| c) {
                claimed[i..i + pattern.len()].iter_mut().for_each(|c| *c = true);
                hits += 1;
                i += pattern.len();
            } else {
                i += 1;
            }
        }
        if hits > 0 {
            *found.entry(group.to_string()).or_insert(0) += hits;
        }
    }
    found
}
