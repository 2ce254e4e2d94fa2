use crate::config::ServerConfig;
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use foodscore_core::classifier::{Classifier, DenseNetwork};
use foodscore_core::model::ScoreResponse;
use foodscore_core::storage::{FoodCache, Store};
use foodscore_core::{ScoreError, ScoringService};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

static RID: AtomicU64 = AtomicU64::new(1);

fn next_rid() -> String {
    let n = RID.fetch_add(1, Ordering::Relaxed);
    format!("r-{n:06}")
}

/// Failure surfaced to the HTTP caller.
#[derive(Debug)]
pub enum ApiError {
    Score(ScoreError),
    /// The blocking scoring task panicked or was cancelled.
    Internal(String),
}

impl From<ScoreError> for ApiError {
    fn from(e: ScoreError) -> Self {
        ApiError::Score(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Score(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Score(ScoreError::DeadlineExceeded { .. }) => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Score(e) => e.code(),
            ApiError::Internal(_) => "E_INTERNAL",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Score(e) => e.to_string(),
            ApiError::Internal(m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.message()
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScoringService>,
    /// Same budget as the `TimeoutLayer`; the blocking task stops before
    /// writing once it is spent, since the layer cannot cancel it.
    pub timeout: Option<Duration>,
}

/// `POST /` is the only route; axum answers 405/404 for everything else.
pub fn router(service: Arc<ScoringService>, cfg: &ServerConfig) -> Router {
    let timeout = (cfg.timeout_ms > 0).then(|| Duration::from_millis(cfg.timeout_ms));
    let mut app = Router::new()
        .route("/", post(score))
        .with_state(AppState { service, timeout })
        .layer(DefaultBodyLimit::max(cfg.max_body_bytes))
        .layer(TraceLayer::new_for_http());

    if let Some(t) = timeout {
        app = app.layer(TimeoutLayer::new(t));
    }
    app
}

async fn score(State(state): State<AppState>, body: Bytes) -> Result<Json<ScoreResponse>, ApiError> {
    let rid = next_rid();
    let start = Instant::now();

    let deadline = state.timeout.map(|t| start + t);
    let result = handle_score(&state, &body, deadline).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) => {
            tracing::info!(
                event = "score_request",
                rid = %rid,
                fingerprint = %outcome.fingerprint,
                cached = outcome.cached,
                score = outcome.score.as_i64(),
                duration_ms = duration_ms
            );
            Ok(Json(outcome.response))
        }
        Err(e) => {
            tracing::warn!(
                event = "score_failed",
                rid = %rid,
                code = e.code(),
                duration_ms = duration_ms,
                error = %e.message()
            );
            Err(e)
        }
    }
}

async fn handle_score(
    state: &AppState,
    body: &[u8],
    deadline: Option<Instant>,
) -> Result<foodscore_core::ScoreOutcome, ApiError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ScoreError::InvalidInput(format!("body is not valid JSON: {e}")))?;

    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || service.score_until(&value, deadline))
        .await
        .map_err(|e| ApiError::Internal(format!("scoring task failed: {e}")))??;
    Ok(outcome)
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub model_path: PathBuf,
    pub db_path: PathBuf,
}

pub struct Server;

impl Server {
    /// Opens the cache, ensures its schema, loads the model and returns the
    /// ready router. Nothing is bound yet; any failure here aborts startup.
    pub fn build(opts: &RunOptions, cfg: &ServerConfig) -> Result<Router> {
        let store = Store::open(&opts.db_path)
            .with_context(|| format!("failed to open cache {}", opts.db_path.display()))?;
        store.init_schema().context("failed to initialize cache schema")?;
        let cached_rows = store.count()?;

        let network = DenseNetwork::load(&opts.model_path)?;
        let classifier: Arc<dyn Classifier> = Arc::new(network);

        let service = Arc::new(ScoringService::new(FoodCache::new(store), classifier)?);

        tracing::info!(
            event = "cache_ready",
            db_path = ?service.cache().store().path(),
            cached_rows = cached_rows,
            model = service.classifier_name()
        );

        Ok(router(service, cfg))
    }

    pub async fn run(opts: RunOptions, cfg: ServerConfig) -> Result<()> {
        let app = Self::build(&opts, &cfg)?;
        let listener = TcpListener::bind(cfg.bind.as_str())
            .await
            .with_context(|| format!("failed to bind {}", cfg.bind))?;
        Self::serve(listener, app, shutdown_signal()).await
    }

    /// Serves `app` on an already bound listener until `shutdown` resolves.
    pub async fn serve(
        listener: TcpListener,
        app: Router,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        tracing::info!(event = "listening", addr = %listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!(event = "server_stop");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler, run until killed.
        tracing::error!(event = "signal_error", error = %e);
        std::future::pending::<()>().await;
    }
}
