use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info};

use super::{PaperSummary, extract::parse_article_set};
use crate::error::{EvidenceError, Result, RetrievalPhase};

pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// The two calls a literature index has to answer
#[async_trait]
pub trait LiteratureIndex: Send + Sync {
    /// Identifiers for `query`, best match first, at most `max_results`
    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>>;

    /// Raw article-set document for exactly `ids`
    async fn fetch_records(&self, ids: &[String]) -> Result<String>;
}

#[derive(Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Deserialize)]
struct ESearchResult {
    idlist: Option<Vec<String>>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

/// NCBI E-utilities (esearch + efetch) over HTTP
#[derive(Clone)]
pub struct EutilsIndex {
    client: reqwest::Client,
    base_url: String,
}

impl EutilsIndex {
    pub fn new() -> Self {
        Self::with_base_url(EUTILS_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, phase: RetrievalPhase, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await.map_err(|e| {
            error!(%phase, "PubMed request failed: {}", e);
            EvidenceError::retrieval(phase, None, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(%phase, status = status.as_u16(), "PubMed returned non-success status");
            return Err(EvidenceError::retrieval(
                phase,
                Some(status.as_u16()),
                format!("PubMed {} returned {}", phase, status),
            ));
        }

        Ok(response)
    }
}

impl Default for EutilsIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiteratureIndex for EutilsIndex {
    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let search_url = format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmax={}&retmode=json",
            self.base_url,
            urlencoding::encode(query),
            max_results
        );

        let response = self.get(RetrievalPhase::Search, &search_url).await?;
        let search_data: ESearchResponse = response.json().await.map_err(|e| {
            EvidenceError::retrieval(
                RetrievalPhase::Search,
                None,
                format!("Failed to parse search response: {}", e),
            )
        })?;

        // esearch reports query errors inside a success response
        let result = search_data.esearchresult;
        if let Some(message) = result.error {
            error!(query = %query, "PubMed search rejected the query: {}", message);
            return Err(EvidenceError::retrieval(
                RetrievalPhase::Search,
                None,
                format!("PubMed search error: {}", message),
            ));
        }
        let mut ids = result.idlist.ok_or_else(|| {
            EvidenceError::retrieval(
                RetrievalPhase::Search,
                None,
                "PubMed search response has no id list",
            )
        })?;
        ids.truncate(max_results);
        Ok(ids)
    }

    async fn fetch_records(&self, ids: &[String]) -> Result<String> {
        let fetch_url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&rettype=abstract&retmode=xml",
            self.base_url,
            ids.join(",")
        );

        let response = self.get(RetrievalPhase::Fetch, &fetch_url).await?;
        response.text().await.map_err(|e| {
            EvidenceError::retrieval(
                RetrievalPhase::Fetch,
                None,
                format!("Failed to read fetch response: {}", e),
            )
        })
    }
}

/// Two-phase literature lookup: identifiers first, then one batch fetch.
///
/// No retries and no caching; every call goes to the index.
#[derive(Clone)]
pub struct LiteratureSearch {
    index: Arc<dyn LiteratureIndex>,
}

impl LiteratureSearch {
    pub fn new(index: Arc<dyn LiteratureIndex>) -> Self {
        Self { index }
    }

    pub fn eutils() -> Self {
        Self::new(Arc::new(EutilsIndex::new()))
    }

    /// Papers for `query` in index ranking order.
    ///
    /// An empty result is `Ok(vec![])`; only index failures are errors.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EvidenceError::InvalidSearch("query is empty".to_string()));
        }
        if max_results == 0 {
            return Err(EvidenceError::InvalidSearch(
                "max_results must be greater than zero".to_string(),
            ));
        }

        info!(query = %query, max_results, "Searching PubMed");

        let ids = self.index.search_ids(query, max_results).await?;
        if ids.is_empty() {
            info!(query = %query, "PubMed search found no articles");
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Fetching article details");
        let xml = self.index.fetch_records(&ids).await?;
        let papers = parse_article_set(&xml);

        info!(query = %query, found = papers.len(), "PubMed search completed");
        Ok(papers)
    }

    /// Run independent searches concurrently; results follow `queries` order.
    pub async fn search_many(
        &self,
        queries: &[String],
        max_results: usize,
    ) -> Vec<(String, Result<Vec<PaperSummary>>)> {
        let searches = queries.iter().map(|query| async move {
            let result = self.search(query, max_results).await;
            (query.clone(), result)
        });
        futures::future::join_all(searches).await
    }
}
