// Text normalization: boilerplate stripping, tokenization, stop words,
// lemmatization.
//
// Both article text and vocabulary terms go through the same pipeline, so a
// term matches whenever its normalized token sequence appears in the
// normalized article. Words that occur inside vocabulary terms are never
// treated as stop words, otherwise "high-income" and "low-income" would
// collapse into the same pattern.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::OnceLock;

use regex_lite::Regex;
use stop_words::{get, LANGUAGE};
use tracing::warn;

/// Domain words that carry no signal in biomedical abstracts.
const CUSTOM_STOP_WORDS: &[&str] = &["study", "results", "control", "significant"];

/// Plurals with no regular singular form.
const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("women", "woman"),
    ("men", "man"),
    ("mice", "mouse"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("analyses", "analysis"),
    ("diagnoses", "diagnosis"),
    ("hypotheses", "hypothesis"),
    ("crises", "crisis"),
    ("indices", "index"),
    ("statuses", "status"),
    ("viruses", "virus"),
    ("censuses", "census"),
    ("loci", "locus"),
    ("foci", "focus"),
    ("nuclei", "nucleus"),
    ("stimuli", "stimulus"),
];

/// Words ending in "s" that are already in base form.
const INVARIANT: &[&str] = &[
    "series",
    "species",
    "diabetes",
    "news",
    "lens",
    "bias",
    "herpes",
    "rabies",
    "scabies",
    "mumps",
    "measles",
];

/// Citation markers, DOIs, URLs, e-mail addresses and copyright lines.
const BOILERPLATE: &[&str] = &[
    // [1], [2, 3], [4-7]
    r"\[\d+(?:\s*[,\-]\s*\d+)*\]",
    // with or without the "doi:" prefix
    r"(?i)\bdoi:?\s*10\.\d{4,9}/\S+",
    r"\b10\.\d{4,9}/\S+",
    r"(?i)\b(?:https?://|www\.)\S+",
    r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b",
    r"(?i)(?:copyright|\(c\)|©)\s*\d{4}[^.]*\.?",
];

/// Compiled [`BOILERPLATE`]. A pattern that fails to compile is logged and
/// left out; stripping is best effort and must not abort categorization.
fn boilerplate_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        BOILERPLATE
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = p, error = %e, "Skipping boilerplate pattern");
                    None
                }
            })
            .collect()
    })
}

/// Remove citations, DOIs, URLs, e-mail addresses and copyright notices.
pub fn strip_boilerplate(text: &str) -> String {
    let mut out = text.to_string();
    for pattern in boilerplate_patterns() {
        out = pattern.replace_all(&out, " ").into_owned();
    }
    out
}

/// Lowercase and split on anything that is not a letter or digit.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reduce an inflected plural to its base form.
///
/// Short tokens and tokens containing digits (acronyms, gene and histone
/// names like "5mc" or "h3k27me3") are left alone.
pub fn lemmatize(token: &str) -> Cow<'_, str> {
    if token.chars().count() <= 3 || token.chars().any(|c| c.is_ascii_digit()) {
        return Cow::Borrowed(token);
    }
    if let Some((_, base)) = IRREGULAR.iter().find(|(plural, _)| *plural == token) {
        return Cow::Borrowed(base);
    }
    if INVARIANT.contains(&token) {
        return Cow::Borrowed(token);
    }
    if let Some(stem) = token.strip_suffix("ies") {
        if stem.len() > 1 {
            return Cow::Owned(format!("{stem}y"));
        }
    }
    if token.ends_with("sses")
        || token.ends_with("xes")
        || token.ends_with("ches")
        || token.ends_with("shes")
    {
        return Cow::Borrowed(&token[..token.len() - 2]);
    }
    if token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") {
        return Cow::Borrowed(token);
    }
    match token.strip_suffix('s') {
        Some(stem) => Cow::Borrowed(stem),
        None => Cow::Borrowed(token),
    }
}

/// Stop-word list plus protected vocabulary words.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stop_words: HashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        let mut stop_words: HashSet<String> = get(LANGUAGE::English).into_iter().collect();
        stop_words.extend(CUSTOM_STOP_WORDS.iter().map(|s| s.to_string()));
        Self { stop_words }
    }
}

impl Normalizer {
    /// A normalizer that never drops any word of the given phrases.
    pub fn protecting<'a>(phrases: impl IntoIterator<Item = &'a str>) -> Self {
        let mut normalizer = Self::default();
        for phrase in phrases {
            for token in tokenize(phrase) {
                normalizer.stop_words.remove(&token);
            }
        }
        normalizer
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Tokenize, drop stop words and lemmatize.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        tokenize(text)
            .into_iter()
            .filter(|t| !self.is_stop_word(t))
            .map(|t| lemmatize(&t).into_owned())
            .collect()
    }

    /// Full article pipeline: strip boilerplate, then normalize.
    pub fn normalize_article(&self, raw: &str) -> Vec<String> {
        self.normalize(&strip_boilerplate(raw))
    }
}
