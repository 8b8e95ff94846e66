//! Analysis payload types and the boundary to the external analysis collaborator.
//!
//! The collaborator (an LLM in the service crate) turns a transcription into
//! learnings, challenges and suspect medical terms. Nothing here interprets
//! language; this module only checks the shape of what comes back and
//! normalizes it so the term tracker can rely on its invariants.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EvidenceError, Result};

/// One possibly mis-transcribed term and the corrections proposed for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSuggestion {
    pub original: String,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub learnings: Vec<String>,
    pub challenges: Vec<String>,
    pub medical_terms: Vec<TermSuggestion>,
}

impl AnalysisResult {
    /// Drop blank entries, tidy candidate lists and enforce `original` as a key.
    ///
    /// After this, every suggestion has at least one distinct, non-empty
    /// candidate and no two suggestions share an `original`.
    pub fn normalized(self) -> Self {
        let learnings = non_blank(self.learnings);
        let challenges = non_blank(self.challenges);

        let mut seen_originals = HashSet::new();
        let medical_terms = self
            .medical_terms
            .into_iter()
            .filter_map(|suggestion| {
                let original = suggestion.original.trim().to_string();
                if original.is_empty() {
                    debug!("Dropping term suggestion with empty original");
                    return None;
                }
                if !seen_originals.insert(original.clone()) {
                    warn!(original = %original, "Dropping repeated term suggestion");
                    return None;
                }

                let mut seen = HashSet::new();
                let candidates: Vec<String> = suggestion
                    .candidates
                    .into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty() && seen.insert(c.clone()))
                    .collect();

                if candidates.is_empty() {
                    debug!(original = %original, "Dropping term suggestion without candidates");
                    return None;
                }

                Some(TermSuggestion {
                    original,
                    candidates,
                })
            })
            .collect();

        AnalysisResult {
            learnings,
            challenges,
            medical_terms,
        }
    }
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .collect()
}

/// External collaborator producing an [`AnalysisResult`] from a transcription
#[async_trait]
pub trait TranscriptAnalyzer: Send + Sync {
    async fn analyze(&self, transcription: &str) -> Result<AnalysisResult>;
}

/// Parse a raw collaborator reply into a normalized [`AnalysisResult`].
///
/// Models like to wrap JSON in prose or code fences, so the outermost
/// `{ ... }` span is tried first and the whole reply second.
pub fn parse_analysis_response(raw: &str) -> Result<AnalysisResult> {
    let candidate = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw.trim(),
    };

    let parsed: AnalysisResult = serde_json::from_str(candidate)
        .map_err(|e| EvidenceError::IntegrationShapeMismatch(e.to_string()))?;

    Ok(parsed.normalized())
}
