mod config;
mod telemetry;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use drill_core::{
    generate_problems, resolve_complexity, Arity, Capabilities, ComplexityRequest,
    ComplexitySettings, DrillError, GenerationFlags, OperationDefinition, OperationRegistry,
    PracticeSession, Problem, ProgressBook, SessionStats, TopicProgress,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;

// ── App state ─────────────────────────────────────────────────────────────────

struct AppState {
    registry: OperationRegistry,
    config: ServerConfig,
    practice: Mutex<Practice>,
}

/// The learner's mastery record and the session in progress.
#[derive(Default)]
struct Practice {
    progress: ProgressBook,
    session: Option<PracticeSession>,
}

impl AppState {
    fn new(config: ServerConfig) -> Self {
        Self {
            registry: OperationRegistry::builtin(),
            config,
            practice: Mutex::new(Practice::default()),
        }
    }
}

// ── Request / Response types ──────────────────────────────────────────────────

#[derive(Serialize)]
struct TopicDto {
    id: &'static str,
    title: &'static str,
    operator_symbol: &'static str,
    arity: Arity,
    capabilities: Capabilities,
    stage: usize,
}

#[derive(Deserialize)]
struct ProblemsRequest {
    topic: String,
    digits1: u32,
    #[serde(default)]
    digits2: Option<u32>,
    #[serde(default)]
    max_problem_count: Option<u64>,
    #[serde(default)]
    allow_negatives: bool,
    #[serde(default)]
    allow_decimals: bool,
}

#[derive(Serialize)]
struct ProblemsResponse {
    topic: &'static str,
    settings: ComplexitySettings,
    problems: Vec<Problem>,
}

#[derive(Deserialize)]
struct SessionRequest {
    topic: String,
}

#[derive(Serialize)]
struct StateResponse {
    topic: &'static str,
    stage: usize,
    problem: Option<Problem>,
    remaining: usize,
    stats: SessionStats,
}

#[derive(Deserialize)]
struct AnswerRequest {
    answer: f64,
}

#[derive(Serialize)]
struct AnswerResponse {
    correct: bool,
    correct_answer: f64,
    promoted_to: Option<usize>,
    next_problem: Option<Problem>,
    stats: SessionStats,
}

#[derive(Serialize)]
struct TopicProgressDto {
    topic: String,
    #[serde(flatten)]
    progress: TopicProgress,
}

#[derive(Serialize)]
struct ProgressResponse {
    mastered: usize,
    total_correct: u32,
    total_wrong: u32,
    topics: Vec<TopicProgressDto>,
}

// ── Error helpers ─────────────────────────────────────────────────────────────

type AppResult<T> = Result<Json<T>, (StatusCode, String)>;

fn app_err(status: StatusCode, msg: impl ToString) -> (StatusCode, String) {
    (status, msg.to_string())
}

fn internal(msg: impl ToString) -> (StatusCode, String) {
    let msg = msg.to_string();
    error!(target: "server", error = %msg, "request failed");
    app_err(StatusCode::INTERNAL_SERVER_ERROR, msg)
}

fn drill_err(e: DrillError) -> (StatusCode, String) {
    match e {
        DrillError::UnknownTopic(_) => app_err(StatusCode::NOT_FOUND, e),
        DrillError::DigitCount { .. } | DrillError::Budget { .. } | DrillError::MissingDigitCount(_) => {
            app_err(StatusCode::BAD_REQUEST, e)
        }
        DrillError::RangeInvariant { .. } | DrillError::Unsolvable { .. } | DrillError::Serde(_) => {
            internal(e)
        }
    }
}

fn no_session() -> (StatusCode, String) {
    app_err(StatusCode::CONFLICT, "No practice session; POST /api/session first")
}

// ── Session helpers ───────────────────────────────────────────────────────────

/// Starts a session on `op` at the learner's current stage.
/// Resolved ranges for the learner's current stage of `op`.
fn stage_settings(
    progress: &ProgressBook,
    op: &OperationDefinition,
    budget: u64,
) -> Result<ComplexitySettings, DrillError> {
    let request = progress.request_for(op).with_max_problem_count(budget);
    resolve_complexity(op, &request)
}

fn start_session(
    progress: &ProgressBook,
    op: OperationDefinition,
    budget: u64,
) -> Result<PracticeSession, DrillError> {
    let settings = stage_settings(progress, &op, budget)?;
    PracticeSession::start(op, settings, &mut rand::thread_rng())
}

fn state_of(practice: &Practice) -> Option<StateResponse> {
    let session = practice.session.as_ref()?;
    Some(StateResponse {
        topic: session.topic(),
        stage: practice.progress.stage_of(session.topic()),
        problem: session.current().cloned(),
        remaining: session.remaining(),
        stats: session.stats().clone(),
    })
}

// ── API handlers ──────────────────────────────────────────────────────────────

async fn list_topics(State(state): State<Arc<AppState>>) -> Json<Vec<TopicDto>> {
    let practice = state.practice.lock().await;
    let topics = state
        .registry
        .iter()
        .map(|op| TopicDto {
            id: op.id,
            title: op.title,
            operator_symbol: op.operator_symbol,
            arity: op.arity(),
            capabilities: op.capabilities,
            stage: practice.progress.stage_of(op.id),
        })
        .collect();
    Json(topics)
}

async fn problems(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProblemsRequest>,
) -> AppResult<ProblemsResponse> {
    let op = state.registry.get(&req.topic).map_err(drill_err)?;
    let request = ComplexityRequest::new(req.digits1, req.digits2)
        .with_max_problem_count(req.max_problem_count.unwrap_or(state.config.max_problem_count))
        .with_flags(GenerationFlags {
            allow_negatives: req.allow_negatives,
            allow_decimals: req.allow_decimals,
        });

    let settings = resolve_complexity(op, &request).map_err(drill_err)?;
    let problems = generate_problems(op, &settings, &mut rand::thread_rng()).map_err(drill_err)?;

    Ok(Json(ProblemsResponse {
        topic: op.id,
        settings,
        problems,
    }))
}

async fn new_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> AppResult<StateResponse> {
    let op = *state.registry.get(&req.topic).map_err(drill_err)?;
    let mut practice = state.practice.lock().await;

    let session = start_session(&practice.progress, op, state.config.session_problem_count)
        .map_err(drill_err)?;
    info!(target: "server", topic = op.id, problems = session.remaining(), "session started");
    practice.session = Some(session);

    state_of(&practice).map(Json).ok_or_else(no_session)
}

async fn get_state(State(state): State<Arc<AppState>>) -> AppResult<StateResponse> {
    let practice = state.practice.lock().await;
    state_of(&practice).map(Json).ok_or_else(no_session)
}

async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnswerRequest>,
) -> AppResult<AnswerResponse> {
    let mut guard = state.practice.lock().await;
    let practice = &mut *guard;
    let session = practice.session.as_mut().ok_or_else(no_session)?;

    let outcome = session
        .submit(req.answer, &mut rand::thread_rng())
        .map_err(drill_err)?
        .ok_or_else(|| app_err(StatusCode::CONFLICT, "This session has no problems"))?;

    let topic = session.topic();
    let promoted_to = practice.progress.record_answer(topic, outcome.correct);
    if let Some(stage) = promoted_to {
        // move on to the harder digit counts right away, same session stats
        let op = state.registry.get(topic).map_err(drill_err)?;
        let settings = stage_settings(&practice.progress, op, state.config.session_problem_count)
            .map_err(drill_err)?;
        session
            .reconfigure(settings, &mut rand::thread_rng())
            .map_err(drill_err)?;
        info!(target: "server", topic, stage, "promoted to next stage");
    }

    Ok(Json(AnswerResponse {
        correct: outcome.correct,
        correct_answer: outcome.correct_answer,
        promoted_to,
        next_problem: session.current().cloned(),
        stats: session.stats().clone(),
    }))
}

async fn get_progress(State(state): State<Arc<AppState>>) -> Json<ProgressResponse> {
    let practice = state.practice.lock().await;
    let progress = &practice.progress;

    let mut topics: Vec<_> = progress
        .iter()
        .map(|(topic, p)| TopicProgressDto {
            topic: topic.to_string(),
            progress: p.clone(),
        })
        .collect();
    topics.sort_by(|a, b| a.topic.cmp(&b.topic));

    Json(ProgressResponse {
        mastered: progress.mastered_count(),
        total_correct: progress.total_correct(),
        total_wrong: progress.total_wrong(),
        topics,
    })
}

async fn reset_progress(State(state): State<Arc<AppState>>) -> StatusCode {
    *state.practice.lock().await = Practice::default();
    info!(target: "server", "progress reset");
    StatusCode::OK
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/topics", get(list_topics))
        .route("/api/problems", post(problems))
        .route("/api/session", post(new_session))
        .route("/api/state", get(get_state))
        .route("/api/answer", post(submit_answer))
        .route("/api/progress", get(get_progress))
        .route("/api/reset", post(reset_progress))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let config = ServerConfig::from_env();
    let addr = config.bind_addr();
    let app = build_router(Arc::new(AppState::new(config)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(target: "server", %addr, "Server running");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(Arc::new(AppState::new(ServerConfig::default())))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn lists_builtin_topics() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/topics", None).await;
        assert_eq!(status, StatusCode::OK);
        let topics = body.as_array().unwrap();
        assert_eq!(topics.len(), OperationRegistry::builtin().len());
        let root = topics.iter().find(|t| t["id"] == "square_root").unwrap();
        assert_eq!(root["arity"], "unary");
        assert_eq!(root["capabilities"]["decimals"]["in_answer"], true);
    }

    #[tokio::test]
    async fn generates_problems_for_a_topic() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/problems",
            Some(json!({ "topic": "addition", "digits1": 1, "digits2": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["problems"].as_array().unwrap().len(), 81);
        assert_eq!(body["settings"]["range"]["num1"]["max"], 9);
    }

    #[tokio::test]
    async fn maps_core_errors_to_status_codes() {
        let app = app();
        let (status, _) = call(&app, "POST", "/api/problems", Some(json!({ "topic": "nope", "digits1": 1 }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&app, "POST", "/api/problems", Some(json!({ "topic": "addition", "digits1": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "POST", "/api/answer", Some(json!({ "answer": 1.0 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn session_flow_records_progress() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/session", Some(json!({ "topic": "multiplication" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], 0);
        let answer = body["problem"]["answer"].as_f64().unwrap();

        let (status, body) = call(&app, "POST", "/api/answer", Some(json!({ "answer": answer }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["correct"], true);
        assert_eq!(body["stats"]["correct"], 1);

        let (_, body) = call(&app, "GET", "/api/progress", None).await;
        assert_eq!(body["total_correct"], 1);
        assert_eq!(body["topics"][0]["topic"], "multiplication");
        assert_eq!(body["topics"][0]["repetitions"], 1);

        let (status, _) = call(&app, "POST", "/api/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", "/api/state", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn promotion_keeps_session_stats() {
        let app = app();
        let (_, body) = call(&app, "POST", "/api/session", Some(json!({ "topic": "addition" }))).await;
        let mut answer = body["problem"]["answer"].as_f64().unwrap();

        let mut last = Value::Null;
        for _ in 0..20 {
            let (status, body) = call(&app, "POST", "/api/answer", Some(json!({ "answer": answer }))).await;
            assert_eq!(status, StatusCode::OK);
            answer = body["next_problem"]["answer"].as_f64().unwrap();
            last = body;
        }
        assert_eq!(last["promoted_to"], 1);
        assert_eq!(last["stats"]["correct"], 20);
        assert_eq!(last["stats"]["streak"], 20);

        let (_, state) = call(&app, "GET", "/api/state", None).await;
        assert_eq!(state["stage"], 1);
        assert_eq!(state["stats"]["answered"], 20);
        // second operand now has two digits
        assert!(state["problem"]["num2"].as_f64().unwrap() >= 10.0);
    }
}
