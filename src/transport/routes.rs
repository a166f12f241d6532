//! HTTP routes.
//!
//! - `POST /query/` answers a question
//! - `GET /` liveness
//! - `GET /health` keep-alive snapshot and database reachability

use crate::agent::SqlAgent;
use crate::db::{ConnectionKeeper, DatabaseAccessor, KeeperStatus, QueryExecutor};
use crate::error::AgentError;
use crate::models::{QueryRequest, QueryResponse};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, info_span};

/// Body detail of every failed `POST /query/`.
pub const ERROR_DETAIL: &str = "An error occurred while processing the request.";

pub const WELCOME_MESSAGE: &str = "Welcome to my FastAPI app!";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<SqlAgent>,
    pub keeper: Arc<ConnectionKeeper>,
    pub accessor: Arc<DatabaseAccessor>,
    pub executor: QueryExecutor,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/query/", post(query))
        .route("/health", get(health))
        .layer(middleware::from_fn(request_span))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error returned by `POST /query/`. The cause is logged, never sent.
#[derive(Debug)]
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, suggestion = ?self.0.suggestion(), "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": ERROR_DETAIL })),
        )
            .into_response()
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    info!(chars = request.userinput.chars().count(), "Question received");
    let response = state.agent.answer(&request.userinput).await?;
    Ok(Json(QueryResponse { response }))
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: DatabaseHealth,
    pub keepalive: KeeperStatus,
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let ping = match state.accessor.get_instance().await {
        Ok(pool) => state.executor.ping(&pool).await,
        Err(e) => Err(e),
    };
    let database = match ping {
        Ok(()) => DatabaseHealth {
            reachable: true,
            error: None,
        },
        Err(e) => DatabaseHealth {
            reachable: false,
            error: Some(e.to_string()),
        },
    };
    let keepalive = state.keeper.status().await;
    let status = if database.reachable && keepalive.is_healthy() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthReport {
        status,
        database,
        keepalive,
    })
}

/// Wrap each request in a span carrying a fresh request id.
async fn request_span(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = uuid::Uuid::new_v4();

    let span = info_span!(
        "http_request",
        request_id = %request_id,
        http.method = %method,
        http.target = %path,
    );
    let response = next.run(request).instrument(span.clone()).await;

    span.in_scope(|| {
        info!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
    });
    response
}
