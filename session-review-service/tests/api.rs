//! HTTP-level tests for the session review service

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use evidence_flow::{
    AnalysisResult, ChallengePolicy, EvidenceError, LiteratureIndex, LiteratureSearch,
    RetrievalPhase, TranscriptAnalyzer, parse_analysis_response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use session_review_service::drafts::{
    DraftEdit, DraftStorage, EditedDraft, InMemoryDraftStorage, SessionDraft,
};
use session_review_service::{AppState, build_router};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Literature index answering from memory; "offline" fails, "nothing" finds nothing
#[derive(Default)]
struct StubIndex {
    fetches: Mutex<usize>,
}

#[async_trait]
impl LiteratureIndex for StubIndex {
    async fn search_ids(&self, query: &str, max_results: usize) -> evidence_flow::Result<Vec<String>> {
        match query {
            "offline" => Err(EvidenceError::Retrieval {
                phase: RetrievalPhase::Search,
                status: Some(503),
                message: "unavailable".into(),
            }),
            "nothing" => Ok(Vec::new()),
            _ => Ok((1..=max_results.min(2)).map(|i| i.to_string()).collect()),
        }
    }

    async fn fetch_records(&self, ids: &[String]) -> evidence_flow::Result<String> {
        *self.fetches.lock().unwrap() += 1;
        Ok(ids
            .iter()
            .map(|id| {
                format!(
                    "<PubmedArticle><PMID>{id}</PMID><ArticleTitle>Paper {id}</ArticleTitle></PubmedArticle>"
                )
            })
            .collect())
    }
}

struct StubAnalyzer {
    reply: &'static str,
}

#[async_trait]
impl TranscriptAnalyzer for StubAnalyzer {
    async fn analyze(&self, _transcription: &str) -> evidence_flow::Result<AnalysisResult> {
        parse_analysis_response(self.reply)
    }
}

const ANALYSIS_REPLY: &str = r#"{
    "learnings": ["L1"],
    "challenges": ["C1"],
    "medicalTerms": [{ "original": "O1", "candidates": ["A", "B"] }]
}"#;

/// Draft storage whose reads lag, widening any window between a read and a write
#[derive(Default)]
struct SlowReadStorage {
    inner: InMemoryDraftStorage,
}

#[async_trait]
impl DraftStorage for SlowReadStorage {
    async fn save(&self, draft: SessionDraft) -> anyhow::Result<()> {
        self.inner.save(draft).await
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<SessionDraft>> {
        let draft = self.inner.get(id).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        draft
    }

    async fn delete(&self, id: &str) -> anyhow::Result<Option<SessionDraft>> {
        self.inner.delete(id).await
    }

    async fn update(&self, id: &str, edit: DraftEdit) -> anyhow::Result<Option<EditedDraft>> {
        self.inner.update(id, edit).await
    }
}

fn app_with(analyzer: Option<StubAnalyzer>, index: Arc<StubIndex>) -> Router {
    app_over(Arc::new(InMemoryDraftStorage::new()), analyzer, index)
}

fn app_over(
    drafts: Arc<dyn DraftStorage>,
    analyzer: Option<StubAnalyzer>,
    index: Arc<StubIndex>,
) -> Router {
    let state = AppState {
        drafts,
        literature: LiteratureSearch::new(index),
        analyzer: analyzer.map(|a| Arc::new(a) as Arc<dyn TranscriptAnalyzer>),
        max_results: 10,
        challenge_policy: ChallengePolicy::default(),
    };
    build_router(state)
}

fn app() -> Router {
    app_with(
        Some(StubAnalyzer {
            reply: ANALYSIS_REPLY,
        }),
        Arc::new(StubIndex::default()),
    )
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn open_draft(app: &Router) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/drafts",
        Some(json!({
            "title": "Ward round",
            "transcription": "transcript",
            "analysis": serde_json::from_str::<Value>(ANALYSIS_REPLY).unwrap()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["draftId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_reports_healthy() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn search_requires_a_query() {
    let (status, _) = send(&app(), "GET", "/pubmed/search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app(), "GET", "/pubmed/search?query=dialysis&max_results=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_returns_papers_in_index_order() {
    let (status, body) = send(&app(), "GET", "/pubmed/search?query=dialysis", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["papers"][0]["pmid"], "1");
    assert_eq!(body["papers"][1]["title"], "Paper 2");
}

#[tokio::test]
async fn no_results_differs_from_unavailable() {
    let index = Arc::new(StubIndex::default());
    let app = app_with(None, index.clone());

    let (status, body) = send(&app, "GET", "/pubmed/search?query=nothing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["papers"], json!([]));
    assert_eq!(*index.fetches.lock().unwrap(), 0);

    let (status, body) = send(&app, "GET", "/pubmed/search?query=offline", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Literature search is currently unavailable");
}

#[tokio::test]
async fn analysis_failures_are_reported_separately() {
    let request = Some(json!({ "transcription": "患者との会話" }));

    let unconfigured = app_with(None, Arc::new(StubIndex::default()));
    let (status, _) = send(&unconfigured, "POST", "/analyze", request.clone()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let malformed = app_with(
        Some(StubAnalyzer {
            reply: r#"{"learnings": "not a list"}"#,
        }),
        Arc::new(StubIndex::default()),
    );
    let (status, body) = send(&malformed, "POST", "/analyze", request.clone()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Analysis is currently unavailable");
    assert_eq!(body["kind"], "integration_shape_mismatch");

    let (status, body) = send(&app(), "POST", "/analyze", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["medicalTerms"][0]["candidates"], json!(["A", "B"]));
}

#[tokio::test]
async fn blank_transcription_is_rejected() {
    let (status, _) = send(&app(), "POST", "/analyze", Some(json!({ "transcription": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn editing_session_end_to_end() {
    let app = app();
    let draft_id = open_draft(&app).await;

    let (status, body) = send(&app, "GET", &format!("/drafts/{draft_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unresolvedTerms"], 1);
    assert_eq!(body["challenges"], json!(["C1"]));

    let (status, body) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/terms/select"),
        Some(json!({ "original": "O1", "candidate": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["challenges"], json!(["C1", "A"]));
    assert_eq!(body["unresolvedTerms"], 0);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/terms/correct"),
        Some(json!({ "original": "O1", "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/terms/correct"),
        Some(json!({ "original": "O1", "text": " 腎不全 " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["challenges"], json!(["C1", "A", "腎不全"]));

    let (status, payload) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/finalize"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload,
        json!({
            "title": "Ward round",
            "transcription": "transcript",
            "learnings": ["L1"],
            "challenges": ["C1", "A", "腎不全"],
            "medicalTerms": [{
                "original": "O1",
                "resolved": true,
                "resolvedTerm": "腎不全",
                "candidates": ["A", "B"]
            }]
        })
    );

    let (status, _) = send(&app, "GET", &format!("/drafts/{draft_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_terms_and_candidates_are_unprocessable() {
    let app = app();
    let draft_id = open_draft(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/terms/select"),
        Some(json!({ "original": "O1", "candidate": "Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/terms/correct"),
        Some(json!({ "original": "missing", "text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = send(&app, "GET", &format!("/drafts/{draft_id}"), None).await;
    assert_eq!(body["challenges"], json!(["C1"]));
}

#[tokio::test]
async fn finalize_with_blank_title_keeps_the_draft() {
    let app = app();
    let draft_id = open_draft(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/finalize"),
        Some(json!({ "title": " " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, payload) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/finalize"),
        Some(json!({ "title": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["title"], "Renamed");
    assert_eq!(payload["medicalTerms"][0]["resolved"], false);
    assert_eq!(payload["medicalTerms"][0]["resolvedTerm"], Value::Null);
}

#[tokio::test]
async fn evidence_is_collected_per_challenge() {
    let app = app();
    let draft_id = open_draft(&app).await;

    let (status, body) = send(&app, "POST", &format!("/drafts/{draft_id}/evidence"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["challenges"][0]["challenge"], "C1");
    assert_eq!(body["challenges"][0]["papers"][0]["pmid"], "1");
    assert!(body["challenges"][0].get("error").is_none());
}

#[tokio::test]
async fn discarded_drafts_are_gone() {
    let app = app();
    let draft_id = open_draft(&app).await;

    let (status, _) = send(&app, "DELETE", &format!("/drafts/{draft_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &format!("/drafts/{draft_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_term_choices_are_all_kept() {
    let app = app_over(
        Arc::new(SlowReadStorage::default()),
        Some(StubAnalyzer {
            reply: ANALYSIS_REPLY,
        }),
        Arc::new(StubIndex::default()),
    );
    let (status, body) = send(
        &app,
        "POST",
        "/drafts",
        Some(json!({
            "transcription": "transcript",
            "analysis": {
                "learnings": [],
                "challenges": ["C1"],
                "medicalTerms": [
                    { "original": "O1", "candidates": ["A"] },
                    { "original": "O2", "candidates": ["B"] }
                ]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let draft_id = body["draftId"].as_str().unwrap().to_string();
    let select_uri = format!("/drafts/{draft_id}/terms/select");

    let (first, second) = tokio::join!(
        send(&app, "POST", &select_uri, Some(json!({ "original": "O1", "candidate": "A" }))),
        send(&app, "POST", &select_uri, Some(json!({ "original": "O2", "candidate": "B" }))),
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);

    let (_, body) = send(&app, "GET", &format!("/drafts/{draft_id}"), None).await;
    assert_eq!(body["unresolvedTerms"], 0);
    let mut challenges: Vec<String> = serde_json::from_value(body["challenges"].clone()).unwrap();
    challenges.sort();
    assert_eq!(challenges, vec!["A", "B", "C1"]);
}

#[tokio::test]
async fn finalized_drafts_accept_no_more_edits() {
    let app = app();
    let draft_id = open_draft(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/finalize"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/drafts/{draft_id}/terms/correct"),
        Some(json!({ "original": "O1", "text": "腎不全" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/drafts/{draft_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
