use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use evidence_flow::{
    AnalysisResult, ChallengePolicy, EutilsIndex, EvidenceError, LiteratureSearch,
    SessionPayload, TranscriptAnalyzer, TransitionOutcome,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    analyzer::OpenRouterAnalyzer,
    config::ServiceConfig,
    drafts::{DraftEdit, DraftStorage, EditedDraft, InMemoryDraftStorage, SessionDraft},
    models::{
        AnalyzeRequest, ChallengeEvidence, CorrectTermRequest, CreateDraftRequest, DraftResponse,
        EvidenceResponse, FinalizeRequest, PapersResponse, SearchParams, SelectCandidateRequest,
    },
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "draft_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

/// Retrieval and analysis failures stay distinguishable for the client
fn evidence_error(e: EvidenceError) -> ApiError {
    let details = e.to_string();
    match e {
        EvidenceError::Retrieval { .. } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Literature search is currently unavailable",
                "details": details
            })),
        ),
        EvidenceError::IntegrationShapeMismatch(_) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Analysis is currently unavailable",
                "kind": "integration_shape_mismatch",
                "details": details
            })),
        ),
        EvidenceError::AnalysisUnavailable(_) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "Analysis is currently unavailable",
                "kind": "analysis_failed",
                "details": details
            })),
        ),
        EvidenceError::UnknownTerm(_) | EvidenceError::UnknownCandidate { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": details })),
        ),
        EvidenceError::InvalidSearch(_) => bad_request_error(&details),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub drafts: Arc<dyn DraftStorage>,
    pub literature: LiteratureSearch,
    pub analyzer: Option<Arc<dyn TranscriptAnalyzer>>,
    pub max_results: usize,
    pub challenge_policy: ChallengePolicy,
}

impl AppState {
    pub fn from_config(config: &ServiceConfig) -> Self {
        let analyzer = config.openrouter_api_key.as_ref().map(|key| {
            Arc::new(OpenRouterAnalyzer::new(key.clone(), config.analysis_model.clone()))
                as Arc<dyn TranscriptAnalyzer>
        });
        if analyzer.is_none() {
            warn!("OPENROUTER_API_KEY not set, transcript analysis is disabled");
        }

        Self {
            drafts: Arc::new(InMemoryDraftStorage::new()),
            literature: LiteratureSearch::new(Arc::new(EutilsIndex::with_base_url(
                config.pubmed_base_url.clone(),
            ))),
            analyzer,
            max_results: config.pubmed_max_results,
            challenge_policy: ChallengePolicy::default(),
        }
    }
}

pub fn create_app(config: &ServiceConfig) -> Router {
    build_router(AppState::from_config(config))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/pubmed/search", get(search_pubmed))
        .route("/analyze", post(analyze_transcription))
        .route("/drafts", post(create_draft))
        .route("/drafts/{draft_id}", get(get_draft).delete(discard_draft))
        .route("/drafts/{draft_id}/terms/select", post(select_term))
        .route("/drafts/{draft_id}/terms/correct", post(correct_term))
        .route("/drafts/{draft_id}/evidence", post(draft_evidence))
        .route("/drafts/{draft_id}/finalize", post(finalize_draft))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Session Review Service",
        "version": "1.0.0",
        "description": "Transcript analysis review with medical term correction and PubMed evidence lookup",
        "endpoints": {
            "GET /pubmed/search?query=": "Search PubMed for papers",
            "POST /analyze": "Analyze a transcription",
            "POST /drafts": "Open an editing session from an analysis result",
            "GET /drafts/{draft_id}": "Current state of an editing session",
            "POST /drafts/{draft_id}/terms/select": "Resolve a term with one of its candidates",
            "POST /drafts/{draft_id}/terms/correct": "Resolve a term with free text",
            "POST /drafts/{draft_id}/evidence": "Search literature for every challenge",
            "POST /drafts/{draft_id}/finalize": "Close the editing session and return the session payload",
            "DELETE /drafts/{draft_id}": "Discard an editing session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn search_pubmed(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<PapersResponse> {
    let query = params.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(bad_request_error("Search query is required"));
    }
    let max_results = params.max_results.unwrap_or(state.max_results);

    let papers = state
        .literature
        .search(&query, max_results)
        .await
        .map_err(|e| {
            error!(query = %query, "PubMed search failed: {}", e);
            evidence_error(e)
        })?;

    Ok(Json(PapersResponse { papers }))
}

async fn analyze_transcription(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<AnalysisResult> {
    if request.transcription.trim().is_empty() {
        return Err(bad_request_error("Transcription is required"));
    }

    let Some(analyzer) = state.analyzer.as_ref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Analysis is not configured" })),
        ));
    };

    let analysis = analyzer
        .analyze(&request.transcription)
        .await
        .map_err(|e| {
            error!("Transcript analysis failed: {}", e);
            evidence_error(e)
        })?;

    Ok(Json(analysis))
}

async fn create_draft(
    State(state): State<AppState>,
    Json(request): Json<CreateDraftRequest>,
) -> Result<(StatusCode, Json<DraftResponse>), ApiError> {
    if request.transcription.trim().is_empty() {
        return Err(bad_request_error("Transcription is required"));
    }

    let draft = SessionDraft::new(request.title, request.transcription, request.analysis);
    info!(
        draft_id = %draft.id,
        terms = draft.analysis.medical_terms.len(),
        "Opening editing session"
    );

    let response = DraftResponse::new(&draft, draft.preview(state.challenge_policy));
    save_draft(&state, draft).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_draft(
    State(state): State<AppState>,
    Path(draft_id): Path<String>,
) -> ApiResult<DraftResponse> {
    let draft = load_draft(&state, &draft_id).await?;
    Ok(Json(DraftResponse::new(
        &draft,
        draft.preview(state.challenge_policy),
    )))
}

async fn select_term(
    State(state): State<AppState>,
    Path(draft_id): Path<String>,
    Json(request): Json<SelectCandidateRequest>,
) -> ApiResult<DraftResponse> {
    let SelectCandidateRequest { original, candidate } = request;
    let draft = edit_draft(
        &state,
        &draft_id,
        Box::new(move |draft: &mut SessionDraft| {
            draft.tracker.select_candidate(&original, &candidate)
        }),
    )
    .await?;

    Ok(Json(DraftResponse::new(
        &draft,
        draft.preview(state.challenge_policy),
    )))
}

async fn correct_term(
    State(state): State<AppState>,
    Path(draft_id): Path<String>,
    Json(request): Json<CorrectTermRequest>,
) -> ApiResult<DraftResponse> {
    let CorrectTermRequest { original, text } = request;
    let draft = edit_draft(
        &state,
        &draft_id,
        Box::new(move |draft: &mut SessionDraft| {
            draft.tracker.submit_free_text(&original, &text)
        }),
    )
    .await?;

    Ok(Json(DraftResponse::new(
        &draft,
        draft.preview(state.challenge_policy),
    )))
}

async fn draft_evidence(
    State(state): State<AppState>,
    Path(draft_id): Path<String>,
) -> ApiResult<EvidenceResponse> {
    let draft = load_draft(&state, &draft_id).await?;
    let challenges = draft.preview(state.challenge_policy).challenges;

    info!(draft_id = %draft_id, challenges = challenges.len(), "Searching literature for challenges");

    let challenges = state
        .literature
        .search_many(&challenges, state.max_results)
        .await
        .into_iter()
        .map(|(challenge, result)| match result {
            Ok(papers) => ChallengeEvidence {
                challenge,
                papers: Some(papers),
                error: None,
            },
            Err(e) => {
                warn!(challenge = %challenge, "Literature search failed: {}", e);
                ChallengeEvidence {
                    challenge,
                    papers: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    Ok(Json(EvidenceResponse {
        draft_id,
        challenges,
    }))
}

async fn finalize_draft(
    State(state): State<AppState>,
    Path(draft_id): Path<String>,
    Json(request): Json<FinalizeRequest>,
) -> ApiResult<SessionPayload> {
    let title = match request.title {
        Some(title) if title.trim().is_empty() => {
            return Err(bad_request_error("Title cannot be empty"));
        }
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };

    let mut draft = take_draft(&state, &draft_id).await?;
    if let Some(title) = title {
        draft.title = title;
    }

    let unresolved = draft.tracker.unresolved_count();
    let payload = draft.into_payload(state.challenge_policy);
    info!(
        draft_id = %draft_id,
        challenges = payload.content.challenges.len(),
        unresolved_terms = unresolved,
        "Editing session finalized"
    );

    Ok(Json(payload))
}

async fn discard_draft(
    State(state): State<AppState>,
    Path(draft_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    take_draft(&state, &draft_id).await?;
    info!(draft_id = %draft_id, "Editing session discarded");
    Ok(StatusCode::NO_CONTENT)
}

async fn load_draft(state: &AppState, draft_id: &str) -> Result<SessionDraft, ApiError> {
    match state.drafts.get(draft_id).await {
        Ok(Some(draft)) => Ok(draft),
        Ok(None) => Err(not_found_error("Draft not found", draft_id)),
        Err(e) => {
            error!("Failed to load draft {}: {}", draft_id, e);
            Err(internal_error("Failed to load draft", &e.to_string()))
        }
    }
}

async fn take_draft(state: &AppState, draft_id: &str) -> Result<SessionDraft, ApiError> {
    match state.drafts.delete(draft_id).await {
        Ok(Some(draft)) => Ok(draft),
        Ok(None) => Err(not_found_error("Draft not found", draft_id)),
        Err(e) => {
            error!("Failed to remove draft {}: {}", draft_id, e);
            Err(internal_error("Failed to remove draft", &e.to_string()))
        }
    }
}

async fn save_draft(state: &AppState, draft: SessionDraft) -> Result<(), ApiError> {
    state.drafts.save(draft).await.map_err(|e| {
        error!("Failed to save draft: {}", e);
        internal_error("Failed to save draft", &e.to_string())
    })
}

/// Apply a term transition in place; a draft finalized or discarded meanwhile is not found
async fn edit_draft(
    state: &AppState,
    draft_id: &str,
    edit: DraftEdit,
) -> Result<SessionDraft, ApiError> {
    match state.drafts.update(draft_id, edit).await {
        Ok(Some(EditedDraft {
            outcome: Ok(TransitionOutcome::Applied(resolved)),
            draft,
        })) => {
            info!(draft_id = %draft_id, original = %resolved.original, "Term resolved");
            Ok(draft)
        }
        Ok(Some(EditedDraft {
            outcome: Ok(TransitionOutcome::Rejected),
            ..
        })) => Err(bad_request_error("Correction cannot be empty")),
        Ok(Some(EditedDraft { outcome: Err(e), .. })) => Err(evidence_error(e)),
        Ok(None) => Err(not_found_error("Draft not found", draft_id)),
        Err(e) => {
            error!("Failed to update draft {}: {}", draft_id, e);
            Err(internal_error("Failed to update draft", &e.to_string()))
        }
    }
}
