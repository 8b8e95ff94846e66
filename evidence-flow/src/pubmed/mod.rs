pub mod client;
pub mod extract;

pub use client::{DEFAULT_MAX_RESULTS, EUTILS_BASE_URL, EutilsIndex, LiteratureIndex, LiteratureSearch};
pub use extract::parse_article_set;

use serde::{Deserialize, Serialize};

/// One article as shown next to a challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSummary {
    /// Empty when the article block carried no PMID
    pub pmid: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// `YYYY`, `YYYY-Mon` or `YYYY-Mon-DD`, or empty
    pub published_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl PaperSummary {
    pub fn pubmed_url(&self) -> Option<String> {
        if self.pmid.is_empty() {
            None
        } else {
            Some(format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid))
        }
    }

    pub fn doi_url(&self) -> Option<String> {
        self.doi.as_ref().map(|doi| format!("https://doi.org/{}", doi))
    }

    /// First `limit` authors, comma separated, with " et al." when truncated.
    pub fn author_line(&self, limit: usize) -> String {
        let shown = self
            .authors
            .iter()
            .take(limit)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if self.authors.len() > limit {
            format!("{} et al.", shown)
        } else {
            shown
        }
    }
}
