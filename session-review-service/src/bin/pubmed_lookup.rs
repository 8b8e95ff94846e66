use evidence_flow::pubmed::{DEFAULT_MAX_RESULTS, EutilsIndex, LiteratureSearch};
use session_review_service::ServiceConfig;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        error!("Usage: pubmed_lookup <search terms>");
        return Ok(());
    }

    let config = ServiceConfig::from_env()?;
    let search = LiteratureSearch::new(Arc::new(EutilsIndex::with_base_url(
        config.pubmed_base_url,
    )));

    info!("Searching PubMed for: {}", query);

    match search.search(&query, DEFAULT_MAX_RESULTS).await {
        Ok(papers) if papers.is_empty() => info!("No matching papers"),
        Ok(papers) => {
            info!("Found {} papers", papers.len());
            for (i, paper) in papers.iter().enumerate() {
                info!("\nPaper {}:", i + 1);
                info!("  PMID: {}", paper.pmid);
                info!("  Title: {}", paper.title);
                info!("  Authors: {}", paper.author_line(3));
                if !paper.published_date.is_empty() {
                    info!("  Published: {}", paper.published_date);
                }
                if let Some(url) = paper.doi_url() {
                    info!("  DOI: {}", url);
                }
                info!(
                    "  Abstract: {}...",
                    paper.abstract_text.chars().take(200).collect::<String>()
                );
            }
        }
        Err(e) => error!("Literature search is currently unavailable: {}", e),
    }

    Ok(())
}
