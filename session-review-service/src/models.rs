use chrono::{DateTime, Utc};
use evidence_flow::{AnalysisResult, PaperSummary, ReconciledSession};
use serde::{Deserialize, Serialize};

use crate::drafts::SessionDraft;

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub transcription: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PapersResponse {
    pub papers: Vec<PaperSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub transcription: String,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectCandidateRequest {
    pub original: String,
    pub candidate: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CorrectTermRequest {
    pub original: String,
    pub text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FinalizeRequest {
    #[serde(default)]
    pub title: Option<String>,
}

/// Current state of an editing session, as the reconciled session would look now
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    pub draft_id: String,
    pub title: String,
    pub transcription: String,
    pub created_at: DateTime<Utc>,
    pub unresolved_terms: usize,
    #[serde(flatten)]
    pub preview: ReconciledSession,
}

impl DraftResponse {
    pub fn new(draft: &SessionDraft, preview: ReconciledSession) -> Self {
        Self {
            draft_id: draft.id.clone(),
            title: draft.title.clone(),
            transcription: draft.transcription.clone(),
            created_at: draft.created_at,
            unresolved_terms: draft.tracker.unresolved_count(),
            preview,
        }
    }
}

/// Literature found for one challenge; exactly one of `papers` and `error` is set
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeEvidence {
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub papers: Option<Vec<PaperSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvidenceResponse {
    pub draft_id: String,
    pub challenges: Vec<ChallengeEvidence>,
}
