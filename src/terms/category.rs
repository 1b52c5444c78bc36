// Categories, seed vocabularies and expanded term sets.
//
// The four categories are fixed. Seed terms are hand-curated per category;
// the expanded set adds related terms discovered from the reference source
// and is the vocabulary every later stage reads.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One of the four fixed topical buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    MentalHealth,
    Epigenetics,
    Socioeconomic,
    Ethnicity,
}

impl Category {
    /// All categories, in artifact order.
    pub const ALL: [Category; 4] = [
        Category::MentalHealth,
        Category::Epigenetics,
        Category::Socioeconomic,
        Category::Ethnicity,
    ];

    /// The label used as the JSON key in every artifact.
    pub fn label(self) -> &'static str {
        match self {
            Category::MentalHealth => "Mental Health",
            Category::Epigenetics => "Epigenetics",
            Category::Socioeconomic => "Socioeconomic",
            Category::Ethnicity => "Ethnicity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the current labels and the older `"<x> terms"` key names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('_', " ");
        let key = key.strip_suffix(" terms").unwrap_or(&key);
        match key {
            "mental health" => Ok(Category::MentalHealth),
            "epigenetics" | "epigenetic" => Ok(Category::Epigenetics),
            "socioeconomic" => Ok(Category::Socioeconomic),
            "ethnicity" | "ethnographic" => Ok(Category::Ethnicity),
            _ => Err(format!("unknown category: {s:?}")),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.label().to_string()
    }
}

/// Case- and whitespace-insensitive identity of a term within a category.
pub fn term_key(term: &str) -> String {
    term.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Hand-authored seed keywords per category. Immutable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeedTermSet {
    seeds: BTreeMap<Category, Vec<String>>,
}

impl SeedTermSet {
    pub fn new(seeds: BTreeMap<Category, Vec<String>>) -> Self {
        Self { seeds }
    }

    pub fn get(&self, category: Category) -> &[String] {
        self.seeds.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Flatten into (category, seed) pairs in category order.
    pub fn pairs(&self) -> Vec<(Category, String)> {
        Category::ALL
            .iter()
            .flat_map(|&c| self.get(c).iter().map(move |s| (c, s.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seeds.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SeedTermSet {
    /// The curated vocabulary for trauma, epigenetics and disparity research.
    fn default() -> Self {
        let to_vec = |terms: &[&str]| terms.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut seeds = BTreeMap::new();
        seeds.insert(
            Category::MentalHealth,
            to_vec(&[
                "depression",
                "bipolar",
                "PTSD",
                "anxiety",
                "suicide",
                "generational trauma",
                "chronic stress",
                "mental disorder",
            ]),
        );
        seeds.insert(
            Category::Epigenetics,
            to_vec(&[
                "methylation",
                "demethylation",
                "CpG islands",
                "5mC",
                "histone modification",
                "H3K27me3",
                "epigenetic",
                "epigenomics",
                "BDNF",
                "SLC6A4",
                "FKBP5",
                "OXTR",
                "stress response",
                "HPA axis dysregulation",
                "childhood abuse",
            ]),
        );
        seeds.insert(
            Category::Socioeconomic,
            to_vec(&[
                "low-income",
                "middle-income",
                "high-income",
                "poverty",
                "socioeconomic status",
                "illiteracy",
            ]),
        );
        seeds.insert(
            Category::Ethnicity,
            to_vec(&[
                "african american",
                "black",
                "latino",
                "hispanic",
                "asian",
                "indigenous",
                "native american",
                "first nations",
                "arab",
                "middle eastern",
                "european",
                "caucasian",
            ]),
        );
        Self { seeds }
    }
}

/// Seed terms plus discovered related terms, unique per category.
///
/// Every category key is always present, possibly with an empty list.
/// Uniqueness is case-insensitive; the first surface form inserted wins,
/// so seeds keep their authored spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedTermSet {
    terms: BTreeMap<Category, Vec<String>>,
}

impl Default for ExpandedTermSet {
    fn default() -> Self {
        Self {
            terms: Category::ALL.iter().map(|&c| (c, Vec::new())).collect(),
        }
    }
}

impl ExpandedTermSet {
    /// Start an expansion from the seeds, so no seed is ever dropped.
    pub fn from_seeds(seeds: &SeedTermSet) -> Self {
        let mut set = Self::default();
        for (category, seed) in seeds.pairs() {
            set.insert(category, &seed);
        }
        set
    }

    /// Insert a term; returns false when it is blank or already present
    /// (case-insensitively) in that category.
    pub fn insert(&mut self, category: Category, term: &str) -> bool {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return false;
        }
        let key = term_key(trimmed);
        let list = self.terms.entry(category).or_default();
        if list.iter().any(|t| term_key(t) == key) {
            return false;
        }
        list.push(trimmed.to_string());
        true
    }

    pub fn get(&self, category: Category) -> &[String] {
        self.terms.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Exact surface-form membership, as used for categorized counts.
    pub fn contains(&self, category: Category, term: &str) -> bool {
        self.get(category).iter().any(|t| t == term)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.terms.iter().map(|(c, t)| (*c, t.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.terms.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate a loosely-typed term document.
    ///
    /// Category values may be a list of strings or, as in older files, an
    /// object mapping subgroups to lists (flattened here). Non-string entries
    /// are skipped and counted. Unknown category keys are an error.
    pub fn from_json_value(value: Value) -> Result<(Self, usize), String> {
        let Value::Object(map) = value else {
            return Err("expected an object keyed by category".to_string());
        };

        let mut set = Self::default();
        let mut skipped = 0;

        for (key, entry) in map {
            let category: Category = key.parse()?;
            let mut lists = Vec::new();
            match entry {
                Value::Array(items) => lists.push(items),
                Value::Object(groups) => {
                    for (_group, items) in groups {
                        match items {
                            Value::Array(items) => lists.push(items),
                            _ => skipped += 1,
                        }
                    }
                }
                _ => return Err(format!("category {key:?} must hold a list of terms")),
            }

            for item in lists.into_iter().flatten() {
                match item {
                    Value::String(term) if !term.trim().is_empty() => {
                        set.insert(category, &term);
                    }
                    other => {
                        warn!(category = %category, entry = %other, "Skipping invalid term entry");
                        skipped += 1;
                    }
                }
            }
        }

        Ok((set, skipped))
    }

    /// Terms that appear in more than one category (allowed, reported).
    pub fn cross_category_collisions(&self) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut collisions: Vec<String> = Vec::new();
        for (_, terms) in self.iter() {
            let keys: HashSet<String> = terms.iter().map(|t| term_key(t)).collect();
            for key in keys {
                if !seen.insert(key.clone()) && !collisions.contains(&key) {
                    collisions.push(key);
                }
            }
        }
        collisions.sort();
        collisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parses_labels_and_legacy_keys() {
        assert_eq!("Mental Health".parse::<Category>(), Ok(Category::MentalHealth));
        assert_eq!("mental health terms".parse::<Category>(), Ok(Category::MentalHealth));
        assert_eq!("epigenetic terms".parse::<Category>(), Ok(Category::Epigenetics));
        assert_eq!("ethnographic terms".parse::<Category>(), Ok(Category::Ethnicity));
        assert_eq!("mental_health".parse::<Category>(), Ok(Category::MentalHealth));
        assert!("astrology".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_json_key_round_trip() {
        let mut map = BTreeMap::new();
        map.insert(Category::Socioeconomic, 3u32);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Socioeconomic":3}"#);
        let back: BTreeMap<Category, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_insert_dedups_case_insensitively() {
        let mut set = ExpandedTermSet::default();
        assert!(set.insert(Category::MentalHealth, "PTSD"));
        assert!(!set.insert(Category::MentalHealth, "ptsd"));
        assert!(!set.insert(Category::MentalHealth, "  PTSD "));
        assert!(!set.insert(Category::MentalHealth, "   "));
        assert_eq!(set.get(Category::MentalHealth), &["PTSD".to_string()]);
    }

    #[test]
    fn test_default_has_every_category_key() {
        let set = ExpandedTermSet::default();
        let json = serde_json::to_value(&set).unwrap();
        for category in Category::ALL {
            assert!(json.get(category.label()).is_some(), "missing {category}");
        }
    }

    #[test]
    fn test_from_json_value_flattens_nested_groups() {
        let value = serde_json::json!({
            "ethnographic terms": {
                "african descent": ["black person", "african american"],
                "asian descent": ["asian person"]
            },
            "Mental Health": ["PTSD", 7, "anxiety"]
        });
        let (set, skipped) = ExpandedTermSet::from_json_value(value).unwrap();
        assert_eq!(skipped, 1);
        assert_eq!(set.get(Category::Ethnicity).len(), 3);
        assert_eq!(set.get(Category::MentalHealth).len(), 2);
        assert!(set.get(Category::Socioeconomic).is_empty());
    }

    #[test]
    fn test_collisions_reported() {
        let mut set = ExpandedTermSet::default();
        set.insert(Category::MentalHealth, "stress response");
        set.insert(Category::Epigenetics, "Stress Response");
        assert_eq!(set.cross_category_collisions(), vec!["stress response".to_string()]);
    }
}
