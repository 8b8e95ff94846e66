use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use evidence_flow::{
    AnalysisResult, ChallengePolicy, ReconciledSession, SessionPayload, TermResolutionTracker,
    TransitionOutcome, reconcile_with,
};
use std::sync::Arc;
use uuid::Uuid;

pub fn default_session_title(date: NaiveDate) -> String {
    format!("Session {}", date.format("%Y-%m-%d"))
}

/// One in-progress editing session: analysis output plus the user's term choices
#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub id: String,
    pub title: String,
    pub transcription: String,
    pub analysis: AnalysisResult,
    pub tracker: TermResolutionTracker,
    pub created_at: DateTime<Utc>,
}

impl SessionDraft {
    pub fn new(title: Option<String>, transcription: String, analysis: AnalysisResult) -> Self {
        let created_at = Utc::now();
        let analysis = analysis.normalized();
        let tracker = TermResolutionTracker::new(&analysis.medical_terms);
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_session_title(created_at.date_naive()));

        Self {
            id: Uuid::new_v4().to_string(),
            title,
            transcription,
            analysis,
            tracker,
            created_at,
        }
    }

    pub fn preview(&self, policy: ChallengePolicy) -> ReconciledSession {
        reconcile_with(&self.analysis, &self.tracker, policy)
    }

    /// Close the editing session into the payload handed to persistence
    pub fn into_payload(self, policy: ChallengePolicy) -> SessionPayload {
        let content = self.preview(policy);
        SessionPayload::new(self.title, self.transcription, content)
    }
}

/// A term transition applied to a stored draft
pub type DraftEdit =
    Box<dyn FnOnce(&mut SessionDraft) -> evidence_flow::Result<TransitionOutcome> + Send>;

/// Outcome of an edit together with the draft as it stands afterwards
#[derive(Debug)]
pub struct EditedDraft {
    pub outcome: evidence_flow::Result<TransitionOutcome>,
    pub draft: SessionDraft,
}

/// Trait for storing and retrieving drafts
#[async_trait]
pub trait DraftStorage: Send + Sync {
    async fn save(&self, draft: SessionDraft) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<SessionDraft>>;
    async fn delete(&self, id: &str) -> Result<Option<SessionDraft>>;

    /// Apply `edit` atomically with respect to other edits and deletes of the
    /// same draft. Returns `None` without storing anything if the draft is gone.
    async fn update(&self, id: &str, edit: DraftEdit) -> Result<Option<EditedDraft>>;
}

/// In-memory implementation of DraftStorage
#[derive(Default)]
pub struct InMemoryDraftStorage {
    drafts: Arc<DashMap<String, SessionDraft>>,
}

impl InMemoryDraftStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStorage for InMemoryDraftStorage {
    async fn save(&self, draft: SessionDraft) -> Result<()> {
        self.drafts.insert(draft.id.clone(), draft);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SessionDraft>> {
        Ok(self.drafts.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<Option<SessionDraft>> {
        Ok(self.drafts.remove(id).map(|(_, draft)| draft))
    }

    async fn update(&self, id: &str, edit: DraftEdit) -> Result<Option<EditedDraft>> {
        // The entry guard holds the shard lock until the edit is done
        let Some(mut entry) = self.drafts.get_mut(id) else {
            return Ok(None);
        };
        let outcome = edit(entry.value_mut());
        let draft = entry.value().clone();
        drop(entry);

        Ok(Some(EditedDraft { outcome, draft }))
    }
}
