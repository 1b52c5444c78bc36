use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cooccurrence::CooccurrenceOptions;
use crate::fetch::pubmed::DEFAULT_PUBMED_API_URL;
use crate::terms::expander::ExpansionParams;
use crate::terms::wikipedia::DEFAULT_WIKIPEDIA_API_URL;

/// Central configuration loaded from environment variables.
///
/// Nothing is required: every value has a default, so a bare checkout runs
/// end to end. The .env file is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the pipeline artifacts live (EPITRACE_DATA_DIR)
    pub data_dir: PathBuf,
    /// Directory containing the sentence embedding model files
    pub model_dir: PathBuf,
    pub wikipedia_api_url: String,
    pub pubmed_api_url: String,
    /// Contact address sent to NCBI and Wikipedia with every request
    pub ncbi_email: Option<String>,
    /// Raises the NCBI rate limit from 3 to 10 requests per second
    pub ncbi_api_key: Option<String>,
    pub similarity_threshold: f64,
    pub max_candidates_per_seed: usize,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub cross_category_only: bool,
}

/// Read an optional variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional variable, falling back to `default` when unset.
fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: {raw:?}")),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let defaults = ExpansionParams::default();

        let similarity_threshold: f64 = parsed("EPITRACE_SIMILARITY_THRESHOLD", defaults.similarity_threshold)?;
        if !(-1.0..=1.0).contains(&similarity_threshold) {
            anyhow::bail!(
                "Invalid value for EPITRACE_SIMILARITY_THRESHOLD: {similarity_threshold} \
                 (cosine similarity must be between -1 and 1)"
            );
        }

        let concurrency: usize = parsed("EPITRACE_CONCURRENCY", defaults.concurrency)?;
        if concurrency == 0 {
            anyhow::bail!("Invalid value for EPITRACE_CONCURRENCY: must be at least 1");
        }

        let timeout_secs: u64 = parsed(
            "EPITRACE_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;

        Ok(Self {
            data_dir: optional("EPITRACE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            model_dir: optional("EPITRACE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(crate::terms::download::default_model_dir),
            wikipedia_api_url: optional("WIKIPEDIA_API_URL")
                .unwrap_or_else(|| DEFAULT_WIKIPEDIA_API_URL.to_string()),
            pubmed_api_url: optional("PUBMED_API_URL")
                .unwrap_or_else(|| DEFAULT_PUBMED_API_URL.to_string()),
            ncbi_email: optional("NCBI_EMAIL"),
            ncbi_api_key: optional("NCBI_API_KEY"),
            similarity_threshold,
            max_candidates_per_seed: parsed("EPITRACE_MAX_CANDIDATES", defaults.max_candidates_per_seed)?,
            concurrency,
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            cross_category_only: parsed("EPITRACE_CROSS_CATEGORY_ONLY", true)?,
        })
    }

    /// Expansion tunables derived from this configuration.
    pub fn expansion_params(&self) -> ExpansionParams {
        ExpansionParams {
            similarity_threshold: self.similarity_threshold,
            max_candidates_per_seed: self.max_candidates_per_seed,
            concurrency: self.concurrency,
            request_timeout: self.request_timeout,
            ..ExpansionParams::default()
        }
    }

    pub fn cooccurrence_options(&self) -> CooccurrenceOptions {
        CooccurrenceOptions {
            cross_category_only: self.cross_category_only,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so each test uses its own
    // variable names through `parsed` instead of calling `Config::load`.

    #[test]
    fn test_parsed_default_when_unset() {
        let value: usize = parsed("EPITRACE_TEST_UNSET_VALUE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_parsed_reads_value() {
        env::set_var("EPITRACE_TEST_PARSED_VALUE", " 12 ");
        let value: usize = parsed("EPITRACE_TEST_PARSED_VALUE", 7).unwrap();
        assert_eq!(value, 12);
    }

    #[test]
    fn test_parsed_error_names_variable() {
        env::set_var("EPITRACE_TEST_BAD_VALUE", "lots");
        let err = parsed::<usize>("EPITRACE_TEST_BAD_VALUE", 7).unwrap_err();
        assert!(err.to_string().contains("EPITRACE_TEST_BAD_VALUE"));
    }

    #[test]
    fn test_blank_is_unset() {
        env::set_var("EPITRACE_TEST_BLANK_VALUE", "   ");
        assert_eq!(optional("EPITRACE_TEST_BLANK_VALUE"), None);
    }
}
