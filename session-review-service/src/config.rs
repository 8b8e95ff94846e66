use anyhow::{Context as _, Result, bail};
use evidence_flow::pubmed::EUTILS_BASE_URL;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ANALYSIS_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_SEARCH_RESULTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Configuration for the session review service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// Without a key the analysis endpoint reports itself unavailable
    pub openrouter_api_key: Option<String>,
    pub analysis_model: String,
    pub pubmed_base_url: String,
    pub pubmed_max_results: usize,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => DEFAULT_PORT,
        };

        let pubmed_max_results = match non_empty("PUBMED_MAX_RESULTS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("PUBMED_MAX_RESULTS must be a number, got '{}'", raw))?,
            None => DEFAULT_SEARCH_RESULTS,
        };
        if pubmed_max_results == 0 {
            bail!("PUBMED_MAX_RESULTS must be greater than zero");
        }

        let log_format = match non_empty("LOG_FORMAT").as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => bail!("LOG_FORMAT must be 'json' or 'pretty', got '{}'", other),
        };

        Ok(Self {
            port,
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            analysis_model: non_empty("ANALYSIS_MODEL")
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            pubmed_base_url: non_empty("PUBMED_BASE_URL")
                .unwrap_or_else(|| EUTILS_BASE_URL.to_string()),
            pubmed_max_results,
            log_format,
        })
    }
}
