use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    config::ScanSettings,
    probe::HttpProber,
    report::{self, PortGroup},
    scanner::{self, RunState},
    target,
    types::{self, ScanOutcome},
};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<ServerState>>,
    prober: Arc<HttpProber>,
}

impl AppState {
    pub fn new(prober: HttpProber) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServerState {
                phase: RunPhase::Idle,
                run: None,
                generation: 0,
            })),
            prober: Arc::new(prober),
        }
    }
}

#[derive(Debug)]
struct ServerState {
    phase: RunPhase,
    run: Option<RunState>,
    // Bumped per scan so a superseded run cannot overwrite the phase of its successor.
    generation: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub state: RunPhase,
    pub total: u64,
    pub completed: u64,
    pub percent: u64,
    pub found: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsBody {
    pub status: Status,
    pub groups: Vec<PortGroup>,
}

#[derive(Debug, Deserialize)]
pub struct StartScan {
    pub target: String,
    #[serde(default)]
    pub allow_public: bool,
    #[serde(flatten)]
    pub settings: ScanSettings,
}

#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    pub target: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Classification {
    pub target: String,
    pub is_local: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/stop", post(post_stop))
        .route("/results", get(get_results).delete(delete_results))
        .route("/classify", get(get_classify))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, prober: HttpProber) -> Result<()> {
    let app = router(AppState::new(prober));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, "serving control API");
    axum::serve(listener, app).await?;
    Ok(())
}

fn error(code: StatusCode, msg: impl ToString) -> Response {
    (code, Json(ErrorBody { error: msg.to_string() })).into_response()
}

async fn current_status(s: &ServerState) -> Status {
    let Some(run) = s.run.as_ref() else {
        return Status {
            state: s.phase,
            total: 0,
            completed: 0,
            percent: 0,
            found: 0,
        };
    };
    let (completed, total) = run.progress();
    let found = run.results.lock().await.len();
    Status {
        state: s.phase,
        total,
        completed,
        percent: types::percent(completed, total),
        found,
    }
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    (StatusCode::OK, Json(current_status(&s).await))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    let status = current_status(&s).await;
    let groups = match s.run.as_ref() {
        Some(run) => report::group_results(&run.snapshot().await),
        None => Vec::new(),
    };
    (StatusCode::OK, Json(ResultsBody { status, groups }))
}

async fn delete_results(State(app): State<AppState>) -> Response {
    let mut s = app.inner.write().await;
    if s.phase == RunPhase::Running {
        return error(StatusCode::CONFLICT, "a scan is running; stop it first");
    }
    s.phase = RunPhase::Idle;
    s.run = None;
    (StatusCode::OK, Json(current_status(&s).await)).into_response()
}

async fn get_classify(Query(q): Query<ClassifyQuery>) -> impl IntoResponse {
    let is_local = target::classify_target(q.target.trim()).is_local();
    Json(Classification {
        target: q.target,
        is_local,
    })
}

async fn post_stop(State(app): State<AppState>) -> Response {
    let s = app.inner.read().await;
    match s.run.as_ref() {
        Some(run) if s.phase == RunPhase::Running => {
            run.stop();
            (StatusCode::ACCEPTED, Json(current_status(&s).await)).into_response()
        }
        _ => error(StatusCode::CONFLICT, "no scan is running"),
    }
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<StartScan>) -> Response {
    let request = match req.settings.to_request(&req.target) {
        Ok(r) => r,
        Err(e) => return error(StatusCode::BAD_REQUEST, e),
    };
    if let Err(e) = target::ensure_scan_allowed(&request.target, req.allow_public) {
        return error(StatusCode::FORBIDDEN, e);
    }

    let run = RunState::new();
    let generation = {
        let mut s = app.inner.write().await;
        if let Some(previous) = s.run.take() {
            if previous.is_running() {
                warn!("cancelling running scan in favour of a new one");
            }
            previous.stop();
        }
        s.generation += 1;
        s.phase = RunPhase::Running;
        s.run = Some(run.clone());
        s.generation
    };

    let total = request.total_tasks();
    let prober = app.prober.clone();
    let app2 = app.clone();
    tokio::spawn(async move {
        let results = scanner::run_scan(prober, Arc::new(request), run).await;
        let mut s = app2.inner.write().await;
        if s.generation == generation {
            s.phase = match results.outcome {
                ScanOutcome::Completed => RunPhase::Completed,
                ScanOutcome::Stopped => RunPhase::Stopped,
            };
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(Status {
            state: RunPhase::Running,
            total,
            completed: 0,
            percent: 0,
            found: 0,
        }),
    )
        .into_response()
}
