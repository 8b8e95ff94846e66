use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::terms::TermResolutionTracker;

/// How challenges repeated between the analysis and the resolved terms are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChallengePolicy {
    /// Analysis challenges followed by every resolution, repeats kept
    #[default]
    PreserveDuplicates,
    /// Same order, but only the first occurrence of each string is kept
    Distinct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalTermRecord {
    pub original: String,
    pub resolved: bool,
    pub resolved_term: Option<String>,
    pub candidates: Vec<String>,
}

/// Analysis output merged with the user's term resolutions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledSession {
    pub learnings: Vec<String>,
    pub challenges: Vec<String>,
    pub medical_terms: Vec<MedicalTermRecord>,
}

/// What is handed to the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub title: String,
    pub transcription: String,
    #[serde(flatten)]
    pub content: ReconciledSession,
}

impl SessionPayload {
    pub fn new(
        title: impl Into<String>,
        transcription: impl Into<String>,
        content: ReconciledSession,
    ) -> Self {
        Self {
            title: title.into(),
            transcription: transcription.into(),
            content,
        }
    }
}

pub fn reconcile(analysis: &AnalysisResult, tracker: &TermResolutionTracker) -> ReconciledSession {
    reconcile_with(analysis, tracker, ChallengePolicy::default())
}

/// Merge `analysis` with the resolutions in `tracker`.
///
/// Pure: the same analysis and the same sequence of transitions always
/// produce the same session.
pub fn reconcile_with(
    analysis: &AnalysisResult,
    tracker: &TermResolutionTracker,
    policy: ChallengePolicy,
) -> ReconciledSession {
    let merged = analysis
        .challenges
        .iter()
        .chain(tracker.additional_challenges())
        .cloned();

    let challenges = match policy {
        ChallengePolicy::PreserveDuplicates => merged.collect(),
        ChallengePolicy::Distinct => {
            let mut seen = HashSet::new();
            merged
                .filter(|challenge| !challenge.is_empty() && seen.insert(challenge.clone()))
                .collect()
        }
    };

    let medical_terms = analysis
        .medical_terms
        .iter()
        .map(|suggestion| {
            let resolved_term = tracker.resolved_term(&suggestion.original).map(str::to_string);
            MedicalTermRecord {
                original: suggestion.original.clone(),
                resolved: resolved_term.is_some(),
                resolved_term,
                candidates: suggestion.candidates.clone(),
            }
        })
        .collect();

    ReconciledSession {
        learnings: analysis.learnings.clone(),
        challenges,
        medical_terms,
    }
}
