// Wikipedia reference source over the MediaWiki Action API.
//
// Candidates for a seed are the main-namespace titles linked from the seed's
// article. The existence check resolves title normalization and redirects,
// so a red link or a typo never makes it into the term set.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::traits::ReferenceSource;

/// Default English Wikipedia API endpoint.
pub const DEFAULT_WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";

/// Titles per existence query (MediaWiki limit for anonymous clients).
const TITLES_PER_QUERY: usize = 50;

/// Filter out non-article pages and titles with unusual characters.
///
/// Rejects Help/Category/File/Portal/Template/Wikipedia namespaces and allows
/// only ASCII letters, digits, whitespace and hyphens.
#[derive(Debug, Clone)]
pub struct TitleFilter {
    namespace: Regex,
    allowed: Regex,
}

impl TitleFilter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            namespace: Regex::new(r"^(Help|Category|File|Portal|Template|Wikipedia):")
                .context("Invalid namespace pattern")?,
            allowed: Regex::new(r"^[A-Za-z0-9\s\-]+$").context("Invalid title pattern")?,
        })
    }

    pub fn accepts(&self, title: &str) -> bool {
        !self.namespace.is_match(title) && self.allowed.is_match(title)
    }
}

/// Client for the MediaWiki Action API.
pub struct WikipediaSource {
    client: reqwest::Client,
    api_url: String,
    titles: TitleFilter,
    /// Upper bound on links collected per seed page.
    max_links: usize,
}

impl WikipediaSource {
    /// Create a new client pointing at the given `api.php` URL.
    ///
    /// `contact` is appended to the user agent, as Wikimedia asks of
    /// automated clients.
    pub fn new(api_url: &str, contact: Option<&str>, timeout: Duration) -> Result<Self> {
        let user_agent = match contact {
            Some(c) if !c.is_empty() => format!("epitrace/0.1 (literature-mining; {c})"),
            _ => "epitrace/0.1 (literature-mining)".to_string(),
        };
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            titles: TitleFilter::new()?,
            max_links: 500,
        })
    }

    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links;
        self
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .context("Wikipedia API request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Wikipedia API returned {}: {}", status, body);
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse Wikipedia response")
    }
}

#[async_trait]
impl ReferenceSource for WikipediaSource {
    fn name(&self) -> &str {
        "Wikipedia"
    }

    async fn candidates(&self, term: &str) -> Result<Vec<String>> {
        let mut titles = Vec::new();
        let mut seen = HashSet::new();
        let mut cont: Option<String> = None;

        loop {
            let mut params = vec![
                ("titles", term),
                ("prop", "links"),
                ("plnamespace", "0"),
                ("pllimit", "max"),
                ("redirects", "1"),
            ];
            if let Some(ref c) = cont {
                params.push(("plcontinue", c.as_str()));
            }

            let resp: QueryResponse = self.query(&params).await?;
            let pages = resp.query.map(|q| q.pages).unwrap_or_default();

            for page in pages {
                if page.missing {
                    debug!(term = term, "No Wikipedia page for term");
                    continue;
                }
                if self.titles.accepts(&page.title) && seen.insert(page.title.clone()) {
                    titles.push(page.title);
                }
                for link in page.links {
                    if self.titles.accepts(&link.title) && seen.insert(link.title.clone()) {
                        titles.push(link.title);
                    }
                }
            }

            cont = resp.cont.and_then(|c| c.plcontinue);
            if cont.is_none() || titles.len() >= self.max_links {
                break;
            }
        }

        titles.truncate(self.max_links);
        debug!(term = term, candidates = titles.len(), "Fetched Wikipedia links");
        Ok(titles)
    }

    async fn existing(&self, titles: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();

        for chunk in titles.chunks(TITLES_PER_QUERY) {
            let joined = chunk.join("|");
            let resp: QueryResponse = self
                .query(&[("titles", joined.as_str()), ("redirects", "1")])
                .await?;
            let Some(query) = resp.query else {
                continue;
            };

            let present: HashSet<&str> = query
                .pages
                .iter()
                .filter(|p| !p.missing && !p.invalid)
                .map(|p| p.title.as_str())
                .collect();
            let normalized: HashMap<&str, &str> = query
                .normalized
                .iter()
                .map(|r| (r.from.as_str(), r.to.as_str()))
                .collect();
            let redirects: HashMap<&str, &str> = query
                .redirects
                .iter()
                .map(|r| (r.from.as_str(), r.to.as_str()))
                .collect();

            for title in chunk {
                let mut resolved = title.as_str();
                if let Some(to) = normalized.get(resolved) {
                    resolved = *to;
                }
                if let Some(to) = redirects.get(resolved) {
                    resolved = *to;
                }
                if present.contains(resolved) {
                    found.insert(title.clone());
                }
            }
        }

        Ok(found)
    }
}

// -- Serde types for action=query (formatversion=2) --

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "continue")]
    pub cont: Option<QueryContinue>,
    pub query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
pub struct QueryContinue {
    pub plcontinue: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub normalized: Vec<TitleMapping>,
    #[serde(default)]
    pub redirects: Vec<TitleMapping>,
    #[serde(default)]
    pub pages: Vec<WikiPage>,
}

#[derive(Debug, Deserialize)]
pub struct TitleMapping {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct WikiPage {
    pub title: String,
    #[serde(default)]
    pub missing: bool,
    #[serde(default)]
    pub invalid: bool,
    #[serde(default)]
    pub links: Vec<WikiLink>,
}

#[derive(Debug, Deserialize)]
pub struct WikiLink {
    pub title: String,
}
