pub mod analysis;
pub mod error;
pub mod pubmed;
pub mod reconcile;
pub mod terms;

// Re-export commonly used types
pub use analysis::{AnalysisResult, TermSuggestion, TranscriptAnalyzer, parse_analysis_response};
pub use error::{EvidenceError, Result, RetrievalPhase};
pub use pubmed::{EutilsIndex, LiteratureIndex, LiteratureSearch, PaperSummary, parse_article_set};
pub use reconcile::{
    ChallengePolicy, MedicalTermRecord, ReconciledSession, SessionPayload, reconcile,
    reconcile_with,
};
pub use terms::{ResolvedTerm, TermResolutionTracker, TermState, TransitionOutcome};
