//! HTTP surface for retrieval and the scheduled crawl.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/retrieve` | Ranked citations plus rendered grounding context |
//! | `GET`  | `/api/cron/crawl` | Crawl the help center into the cache (shared-secret auth) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Errors use `{ "error": { "code": "...", "message": "..." } }`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use groundwork_core::{Citation, GroundingContext, Retriever};
use groundwork_crawler::{CrawlReport, Crawler, SilentProgress, authorize, trigger_secret};
use groundwork_shared::{AppConfig, GroundworkError, RetrievalConfig, SourceKind};
use groundwork_storage::SnapshotStore;

use crate::commands::build_query;

/// Shared state handed to every route.
#[derive(Clone)]
pub(crate) struct AppState {
    retriever: Arc<Retriever>,
    crawler: Arc<Crawler>,
    store: SnapshotStore,
    retrieval: Arc<RetrievalConfig>,
    trigger_secret: Option<Arc<str>>,
    /// Held for the duration of a crawl; the crawler is the only writer.
    crawl_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub(crate) fn new(
        retriever: Retriever,
        crawler: Crawler,
        store: SnapshotStore,
        retrieval: RetrievalConfig,
        trigger_secret: Option<String>,
    ) -> Self {
        Self {
            retriever: Arc::new(retriever),
            crawler: Arc::new(crawler),
            store,
            retrieval: Arc::new(retrieval),
            trigger_secret: trigger_secret.map(Arc::from),
            crawl_lock: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) async fn from_config(config: &AppConfig) -> groundwork_shared::Result<Self> {
        let store = SnapshotStore::open(&config.cache).await?;
        let retriever = Retriever::from_config(config, Some(store.clone()))?;
        let crawler = Crawler::from_config(config)?;
        let secret = trigger_secret(&config.crawl);
        if secret.is_none() {
            warn!(
                env = %config.crawl.trigger_secret_env,
                "crawl trigger secret not set, trigger is unauthenticated"
            );
        }
        Ok(Self::new(
            retriever,
            crawler,
            store,
            config.retrieval.clone(),
            secret,
        ))
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/cron/crawl", get(handle_crawl))
        .route("/api/retrieve", post(handle_retrieve))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub(crate) async fn serve(state: AppState, bind: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind, "listening");
    println!("groundwork listening on http://{bind}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub(crate) struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<GroundworkError> for AppError {
    fn from(err: GroundworkError) -> Self {
        match err {
            GroundworkError::Validation { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "bad_request", err.to_string())
            }
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// GET /api/cron/crawl
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct CrawlResponse {
    success: bool,
    #[serde(flatten)]
    report: CrawlReport,
}

async fn handle_crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CrawlResponse>, AppError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !authorize(state.trigger_secret.as_deref(), authorization) {
        warn!("rejected crawl trigger");
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ));
    }

    let Ok(_guard) = state.crawl_lock.try_lock() else {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "crawl_running",
            "a crawl is already in progress",
        ));
    };

    match state.crawler.crawl_and_store(&state.store, &SilentProgress).await {
        Ok(report) => Ok(Json(CrawlResponse {
            success: true,
            report,
        })),
        Err(e) => {
            error!(error = %e, "triggered crawl failed");
            Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "crawl_failed",
                e.to_string(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/retrieve
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct RetrieveRequest {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
    #[serde(default)]
    sources: Vec<SourceKind>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RetrieveResponse {
    passages: Vec<Citation>,
    /// Grounding text for the completion call.
    context: String,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let query = build_query(
        &state.retrieval,
        &request.query,
        request.max_results,
        request.sources,
    )?;
    let passages = state.retriever.retrieve(&query).await?;

    Ok(Json(RetrieveResponse {
        passages: passages.iter().map(Citation::from).collect(),
        context: GroundingContext::new(&passages).render(),
    }))
}
