// PubMed client over NCBI E-utilities.
//
// `esearch` turns a query into PMIDs (JSON), `efetch` returns the article
// records (XML) in batches. Only the handful of fields the pipeline needs
// are pulled out of the XML, so a few targeted patterns do the job without
// a full XML parser. Articles without an abstract carry too little text to
// categorize and are skipped.
//
// API docs: https://www.ncbi.nlm.nih.gov/books/NBK25499/

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex_lite::{Captures, Regex};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::rate_limiter::RateLimiter;
use super::{DocumentSource, FetchOutcome};
use crate::error::PipelineError;
use crate::models::{Document, DocumentMetadata};

pub const DEFAULT_PUBMED_API_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PMIDs per efetch request.
const EFETCH_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

/// Articles parsed out of one efetch response.
#[derive(Debug, Default)]
pub struct ParsedArticles {
    pub documents: Vec<Document>,
    /// Articles without abstract text
    pub without_abstract: usize,
    /// Article records with no PMID
    pub malformed: usize,
}

/// NCBI E-utilities client for the PubMed database.
pub struct PubMedClient {
    client: reqwest::Client,
    base_url: String,
    email: Option<String>,
    api_key: Option<String>,
    rate_limiter: RateLimiter,
    parser: ArticleParser,
}

impl PubMedClient {
    pub fn new(
        base_url: &str,
        email: Option<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("epitrace/0.1 (biomedical term co-occurrence)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let rate_limiter = RateLimiter::for_ncbi(api_key.is_some());

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            api_key,
            rate_limiter,
            parser: ArticleParser::new()?,
        })
    }

    /// Parameters NCBI asks every request to carry.
    fn identity_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("tool", "epitrace".to_string())];
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<reqwest::Response> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&self.identity_params())
            .send()
            .await
            .map_err(|e| PipelineError::external("PubMed", format!("{endpoint} request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PipelineError::external("PubMed", "rate limited (HTTP 429)").into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("PubMed {} returned {}: {}", endpoint, status, body);
        }
        Ok(response)
    }

    /// PMIDs for `query`, most relevant first.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let params = [
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", limit.to_string()),
            ("retmode", "json".to_string()),
            ("sort", "relevance".to_string()),
        ];

        let response: SearchResponse = self
            .get("esearch.fcgi", &params)
            .await?
            .json()
            .await
            .context("Failed to parse esearch response")?;

        if let Some(error) = response.esearchresult.error {
            anyhow::bail!("PubMed rejected the query: {}", error);
        }

        let ids = response.esearchresult.idlist;
        info!(query = query, found = ids.len(), "PubMed search complete");
        Ok(ids)
    }

    /// Download and parse article records for `pmids`.
    ///
    /// A failed batch is logged and counted; the call fails only when every
    /// batch failed.
    pub async fn fetch_documents(&self, pmids: &[String]) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();
        let batches: Vec<&[String]> = pmids.chunks(EFETCH_BATCH).collect();
        let mut failed_batches = 0;

        for batch in &batches {
            let params = [
                ("db", "pubmed".to_string()),
                ("id", batch.join(",")),
                ("retmode", "xml".to_string()),
            ];

            let xml = match self.get("efetch.fcgi", &params).await {
                Ok(response) => response.text().await.context("Failed to read efetch body"),
                Err(e) => Err(e),
            };

            match xml {
                Ok(xml) => {
                    let parsed = self.parser.parse(&xml);
                    debug!(
                        requested = batch.len(),
                        parsed = parsed.documents.len(),
                        without_abstract = parsed.without_abstract,
                        "efetch batch parsed"
                    );
                    outcome.skipped += parsed.without_abstract;
                    outcome.failed += parsed.malformed;
                    outcome.documents.extend(parsed.documents);
                }
                Err(e) => {
                    warn!(batch_size = batch.len(), error = %e, "efetch batch failed, skipping");
                    failed_batches += 1;
                    outcome.failed += batch.len();
                }
            }
        }

        if !batches.is_empty() && failed_batches == batches.len() {
            return Err(PipelineError::external(
                "PubMed",
                format!("all {} efetch batches failed", batches.len()),
            )
            .into());
        }

        Ok(outcome)
    }
}

#[async_trait]
impl DocumentSource for PubMedClient {
    fn name(&self) -> &str {
        "PubMed"
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<FetchOutcome> {
        if query.trim().is_empty() {
            anyhow::bail!("Empty PubMed query");
        }
        let pmids = self.search(query, limit).await?;
        if pmids.is_empty() {
            return Ok(FetchOutcome::default());
        }
        self.fetch_documents(&pmids).await
    }
}

// --- efetch XML extraction ---

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid efetch pattern {pattern:?}"))
}

/// Compiled patterns for the few efetch fields the pipeline keeps.
#[derive(Debug, Clone)]
pub struct ArticleParser {
    article: Regex,
    pmid: Regex,
    title: Regex,
    abstract_text: Regex,
    label: Regex,
    journal: Regex,
    pub_date: Regex,
    year: Regex,
    author: Regex,
    last_name: Regex,
    fore_name: Regex,
    collective_name: Regex,
    tag: Regex,
    entity: Regex,
}

impl ArticleParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            article: compile(r"(?s)<PubmedArticle(?:\s[^>]*)?>.*?</PubmedArticle>")?,
            pmid: compile(r"<PMID[^>]*>\s*(\d+)\s*</PMID>")?,
            title: compile(r"(?s)<ArticleTitle[^>]*>(.*?)</ArticleTitle>")?,
            abstract_text: compile(r"(?s)<AbstractText([^>]*)>(.*?)</AbstractText>")?,
            label: compile(r#"Label="([^"]*)""#)?,
            journal: compile(r"(?s)<Journal>.*?<Title>(.*?)</Title>")?,
            pub_date: compile(r"(?s)<PubDate>(.*?)</PubDate>")?,
            year: compile(r"\b(\d{4})\b")?,
            author: compile(r"(?s)<Author\b[^>]*>(.*?)</Author>")?,
            last_name: compile(r"(?s)<LastName>(.*?)</LastName>")?,
            fore_name: compile(r"(?s)<ForeName>(.*?)</ForeName>")?,
            collective_name: compile(r"(?s)<CollectiveName>(.*?)</CollectiveName>")?,
            tag: compile(r"<[^>]+>")?,
            entity: compile(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);")?,
        })
    }

    /// Decode the XML entities efetch emits. Unknown entities are kept as is.
    pub fn unescape(&self, text: &str) -> String {
        self.entity
            .replace_all(text, |caps: &Captures| {
                let entity = &caps[1];
                let decoded = match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    _ => {
                        let code = if let Some(hex) = entity.strip_prefix("#x") {
                            u32::from_str_radix(hex, 16).ok()
                        } else {
                            entity[1..].parse::<u32>().ok()
                        };
                        code.and_then(char::from_u32)
                    }
                };
                decoded
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Strip inline markup, decode entities and collapse whitespace.
    fn clean(&self, fragment: &str) -> String {
        let without_tags = self.tag.replace_all(fragment, "");
        self.unescape(&without_tags)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn first_capture(&self, regex: &Regex, haystack: &str) -> Option<String> {
        regex
            .captures(haystack)
            .map(|c| self.clean(&c[1]))
            .filter(|s| !s.is_empty())
    }

    fn author_name(&self, fragment: &str) -> Option<String> {
        if let Some(name) = self.first_capture(&self.collective_name, fragment) {
            return Some(name);
        }
        let last = self.first_capture(&self.last_name, fragment)?;
        match self.first_capture(&self.fore_name, fragment) {
            Some(fore) => Some(format!("{fore} {last}")),
            None => Some(last),
        }
    }

    /// Extract documents from an efetch `PubmedArticleSet`.
    pub fn parse(&self, xml: &str) -> ParsedArticles {
        let mut parsed = ParsedArticles::default();

        for article in self.article.find_iter(xml) {
            let article = article.as_str();

            let Some(pmid) = self.pmid.captures(article).map(|c| c[1].to_string()) else {
                warn!("PubMed article without a PMID, skipping");
                parsed.malformed += 1;
                continue;
            };

            let sections: Vec<String> = self
                .abstract_text
                .captures_iter(article)
                .filter_map(|c| {
                    let body = self.clean(&c[2]);
                    if body.is_empty() {
                        return None;
                    }
                    let label = self
                        .label
                        .captures(&c[1])
                        .map(|l| self.clean(&l[1]))
                        .filter(|l| !l.is_empty());
                    Some(match label {
                        Some(label) => format!("{label}: {body}"),
                        None => body,
                    })
                })
                .collect();

            if sections.is_empty() {
                debug!(pmid = pmid, "Article has no abstract, skipping");
                parsed.without_abstract += 1;
                continue;
            }

            let title = self.first_capture(&self.title, article);
            let journal = self.first_capture(&self.journal, article);
            let published = self
                .pub_date
                .captures(article)
                .and_then(|c| self.year.captures(&c[1]).map(|y| y[1].to_string()));
            let authors: Vec<String> = self
                .author
                .captures_iter(article)
                .filter_map(|c| self.author_name(&c[1]))
                .collect();

            let abstract_text = sections.join(" ");
            let text = match &title {
                Some(title) => format!("{title}\n\n{abstract_text}"),
                None => abstract_text,
            };

            parsed.documents.push(Document {
                id: format!("PMID:{pmid}"),
                text,
                metadata: DocumentMetadata {
                    title,
                    authors,
                    journal,
                    published,
                    source: Some("pubmed".to_string()),
                },
            });
        }

        parsed
    }
}

/// Parse one efetch response with a freshly compiled [`ArticleParser`].
pub fn parse_articles(xml: &str) -> Result<ParsedArticles> {
    Ok(ArticleParser::new()?.parse(xml))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ArticleParser {
        ArticleParser::new().unwrap()
    }

    #[test]
    fn test_unescape_xml() {
        let parser = parser();
        assert_eq!(parser.unescape("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(parser.unescape("&#945;-synuclein &#x3B2;"), "α-synuclein β");
        assert_eq!(parser.unescape("&bogus; stays"), "&bogus; stays");
    }

    #[test]
    fn test_clean_strips_inline_markup() {
        assert_eq!(parser().clean("  <i>FKBP5</i>\n   methylation  "), "FKBP5 methylation");
    }

    #[test]
    fn test_author_name_forms() {
        let parser = parser();
        assert_eq!(
            parser.author_name("<LastName>Yehuda</LastName><ForeName>Rachel</ForeName>"),
            Some("Rachel Yehuda".to_string())
        );
        assert_eq!(
            parser.author_name("<CollectiveName>PGC PTSD Workgroup</CollectiveName>"),
            Some("PGC PTSD Workgroup".to_string())
        );
        assert_eq!(parser.author_name("<Initials>R</Initials>"), None);
    }

    #[test]
    fn test_client_compiles_its_parser() {
        let client = PubMedClient::new(DEFAULT_PUBMED_API_URL, None, None, Duration::from_secs(5))
            .unwrap();
        let parsed = client
            .parser
            .parse("<PubmedArticle><PMID>1</PMID><AbstractText>Text.</AbstractText></PubmedArticle>");
        assert_eq!(parsed.documents.len(), 1);
        assert_eq!(parsed.documents[0].id, "PMID:1");
    }
}
