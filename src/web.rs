use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::signal;

use crate::auth;
use crate::semantic::{IndexOutcome, IndexStats, SearchHit, SemanticIndexError, SemanticIndexer};

/// Request body limit; documents arrive as text, so this is generous.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Default number of search results when the caller doesn't specify k.
const DEFAULT_K: usize = 5;

struct SharedState {
    indexer: Arc<SemanticIndexer>,
    api_key: String,
}

async fn start_app(indexer: Arc<SemanticIndexer>, listen_addr: String, api_key: String) {
    let shared_state = Arc::new(SharedState { indexer, api_key });

    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                log::warn!("shutting down");
            },
            _ = terminate => {},
        }
    }

    let api = Router::new()
        .route("/api/v1/index", post(index_document))
        .route("/api/v1/search", post(search))
        .route("/api/v1/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(
            shared_state.clone(),
            require_api_key,
        ));

    let app = Router::new()
        .merge(api)
        .route("/api/v1/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();
    log::info!("listening on {}", listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

pub fn start_daemon(indexer: Arc<SemanticIndexer>, listen_addr: String, api_key: String) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(indexer, listen_addr, api_key).await });
}

/// Reject requests without a valid `X-API-Key` header.
async fn require_api_key(
    State(state): State<Arc<SharedState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !auth::validate_api_key(provided, &state.api_key) {
        return (
            axum::http::StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid or missing API key"})),
        )
            .into_response();
    }

    next.run(request).await
}

// Wrapper so `?` works on handlers returning core errors.
#[derive(Debug)]
struct HttpError(SemanticIndexError);

// Tell axum how to convert `SemanticIndexError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self.0 {
            SemanticIndexError::InvalidArgument(_) => (
                axum::http::StatusCode::BAD_REQUEST,
                json!({"error": self.0.to_string()}).to_string(),
            ),
            _ => {
                log::error!("{:?}", self.0);
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": self.0.to_string()}).to_string(),
                )
            }
        }
        .into_response()
    }
}

impl From<SemanticIndexError> for HttpError {
    fn from(err: SemanticIndexError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Deserialize)]
struct IndexRequest {
    identifier: String,
    text: String,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    outcome: &'static str,
    document_count: usize,
}

async fn index_document(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, HttpError> {
    log::debug!("index request for {:?}", payload.identifier);

    tokio::task::block_in_place(move || {
        let outcome = state
            .indexer
            .index_document(&payload.identifier, &payload.text)?;
        let document_count = state.indexer.document_count()?;

        Ok(Json(IndexResponse {
            outcome: match outcome {
                IndexOutcome::Indexed => "indexed",
                IndexOutcome::AlreadyIndexed => "already_indexed",
            },
            document_count,
        }))
    })
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,

    /// Number of results to return
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
    query: String,
    total: usize,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, HttpError> {
    log::debug!("search request: {:?} k={}", payload.query, payload.k);

    tokio::task::block_in_place(move || {
        let results = state.indexer.search(&payload.query, payload.k)?;

        Ok(Json(SearchResponse {
            total: results.len(),
            results,
            query: payload.query,
        }))
    })
}

async fn stats(State(state): State<Arc<SharedState>>) -> Result<Json<IndexStats>, HttpError> {
    tokio::task::block_in_place(move || Ok(Json(state.indexer.stats()?)))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    document_count: usize,
}

async fn health(State(state): State<Arc<SharedState>>) -> Result<Json<HealthResponse>, HttpError> {
    tokio::task::block_in_place(move || {
        Ok(Json(HealthResponse {
            status: "ok",
            document_count: state.indexer.document_count()?,
        }))
    })
}
