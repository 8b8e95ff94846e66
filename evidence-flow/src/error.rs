use std::fmt;

use thiserror::Error;

/// Which of the two literature index calls failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalPhase {
    Search,
    Fetch,
}

impl fmt::Display for RetrievalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalPhase::Search => f.write_str("search"),
            RetrievalPhase::Fetch => f.write_str("fetch"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EvidenceError {
    /// The literature index could not be reached or answered with a non-success status
    #[error("Literature {phase} request failed: {message}")]
    Retrieval {
        phase: RetrievalPhase,
        status: Option<u16>,
        message: String,
    },

    /// The analysis collaborator answered, but not with an analysis-shaped payload
    #[error("Analysis response shape mismatch: {0}")]
    IntegrationShapeMismatch(String),

    /// The analysis collaborator itself failed (transport, model, credentials)
    #[error("Analysis collaborator failed: {0}")]
    AnalysisUnavailable(String),

    #[error("Unknown medical term: {0}")]
    UnknownTerm(String),

    #[error("'{candidate}' is not a candidate for '{original}'")]
    UnknownCandidate { original: String, candidate: String },

    #[error("Invalid search request: {0}")]
    InvalidSearch(String),
}

impl EvidenceError {
    pub(crate) fn retrieval(
        phase: RetrievalPhase,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        EvidenceError::Retrieval {
            phase,
            status,
            message: message.into(),
        }
    }

    /// True for failures of the literature index, as opposed to "no papers found"
    pub fn is_retrieval_failure(&self) -> bool {
        matches!(self, EvidenceError::Retrieval { .. })
    }

    /// True for failures attributable to the analysis collaborator
    pub fn is_analysis_failure(&self) -> bool {
        matches!(
            self,
            EvidenceError::IntegrationShapeMismatch(_) | EvidenceError::AnalysisUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
