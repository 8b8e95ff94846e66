//! Human-in-the-loop resolution of suspect medical terms.
//!
//! One tracker lives for one editing session. Each term starts
//! `Unresolved`; picking a candidate or submitting free text moves it to
//! `Resolved`, and later choices overwrite the stored value. There is no
//! way back to `Unresolved`. Every successful choice is also appended to
//! the additional challenges, which the reconciler appends to the
//! analysis challenges.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::TermSuggestion;
use crate::error::{EvidenceError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermState {
    Unresolved,
    Resolved(String),
}

/// Resolution status of one term as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTerm {
    pub original: String,
    pub resolved_term: Option<String>,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(ResolvedTerm),
    /// Blank free text; nothing changed
    Rejected,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

#[derive(Debug, Clone)]
struct TrackedTerm {
    original: String,
    candidates: Vec<String>,
    state: TermState,
}

impl TrackedTerm {
    fn view(&self) -> ResolvedTerm {
        match &self.state {
            TermState::Unresolved => ResolvedTerm {
                original: self.original.clone(),
                resolved_term: None,
                resolved: false,
            },
            TermState::Resolved(term) => ResolvedTerm {
                original: self.original.clone(),
                resolved_term: Some(term.clone()),
                resolved: true,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TermResolutionTracker {
    terms: Vec<TrackedTerm>,
    additional_challenges: Vec<String>,
}

impl TermResolutionTracker {
    /// Start tracking `suggestions`, all unresolved.
    ///
    /// Suggestions without candidates and repeats of an already tracked
    /// `original` are not tracked.
    pub fn new(suggestions: &[TermSuggestion]) -> Self {
        let mut terms: Vec<TrackedTerm> = Vec::with_capacity(suggestions.len());
        for suggestion in suggestions {
            if suggestion.candidates.is_empty() {
                debug!(original = %suggestion.original, "Not tracking term without candidates");
                continue;
            }
            if terms.iter().any(|t| t.original == suggestion.original) {
                continue;
            }
            terms.push(TrackedTerm {
                original: suggestion.original.clone(),
                candidates: suggestion.candidates.clone(),
                state: TermState::Unresolved,
            });
        }

        Self {
            terms,
            additional_challenges: Vec::new(),
        }
    }

    /// Resolve `original` to one of its candidates.
    pub fn select_candidate(&mut self, original: &str, candidate: &str) -> Result<TransitionOutcome> {
        let index = self.position(original)?;
        if !self.terms[index].candidates.iter().any(|c| c == candidate) {
            return Err(EvidenceError::UnknownCandidate {
                original: original.to_string(),
                candidate: candidate.to_string(),
            });
        }

        Ok(self.resolve(index, candidate.to_string()))
    }

    /// Resolve `original` to user-entered text.
    ///
    /// Blank text is rejected without touching any state.
    pub fn submit_free_text(&mut self, original: &str, text: &str) -> Result<TransitionOutcome> {
        let index = self.position(original)?;

        let text = text.trim();
        if text.is_empty() {
            debug!(original = %original, "Rejected blank correction");
            return Ok(TransitionOutcome::Rejected);
        }

        Ok(self.resolve(index, text.to_string()))
    }

    fn resolve(&mut self, index: usize, chosen: String) -> TransitionOutcome {
        let term = &mut self.terms[index];

        if let TermState::Resolved(previous) = &term.state {
            info!(original = %term.original, previous = %previous, chosen = %chosen, "Overwriting term resolution");
        } else {
            info!(original = %term.original, chosen = %chosen, "Term resolved");
        }

        term.state = TermState::Resolved(chosen.clone());
        let view = term.view();
        self.additional_challenges.push(chosen);
        TransitionOutcome::Applied(view)
    }

    fn position(&self, original: &str) -> Result<usize> {
        self.terms
            .iter()
            .position(|t| t.original == original)
            .ok_or_else(|| EvidenceError::UnknownTerm(original.to_string()))
    }

    pub fn state(&self, original: &str) -> Option<&TermState> {
        self.terms
            .iter()
            .find(|t| t.original == original)
            .map(|t| &t.state)
    }

    pub fn resolved_term(&self, original: &str) -> Option<&str> {
        match self.state(original)? {
            TermState::Resolved(term) => Some(term.as_str()),
            TermState::Unresolved => None,
        }
    }

    pub fn is_resolved(&self, original: &str) -> bool {
        self.resolved_term(original).is_some()
    }

    /// Every chosen string, in the order the choices were made
    pub fn additional_challenges(&self) -> &[String] {
        &self.additional_challenges
    }

    /// Status of every tracked term, in suggestion order
    pub fn resolutions(&self) -> Vec<ResolvedTerm> {
        self.terms.iter().map(TrackedTerm::view).collect()
    }

    pub fn unresolved_count(&self) -> usize {
        self.terms
            .iter()
            .filter(|t| t.state == TermState::Unresolved)
            .count()
    }
}
