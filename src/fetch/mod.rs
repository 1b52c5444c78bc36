// Document fetching: PubMed E-utilities and local text directories.
//
// The pipeline only sees the `DocumentSource` trait. PubMed is the default
// implementation; tests use fixed in-memory sources.

pub mod local;
pub mod pubmed;
pub mod query;
pub mod rate_limiter;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

/// Documents returned by one fetch, with the per-item tallies.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub documents: Vec<Document>,
    /// Records dropped because they carried no usable text
    pub skipped: usize,
    /// Records or batches that failed to download or parse
    pub failed: usize,
}

/// Anything that turns a query into documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` documents matching `query`.
    async fn fetch(&self, query: &str, limit: usize) -> Result<FetchOutcome>;
}
