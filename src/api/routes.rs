//! HTTP routes and handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::agent::{Agent, ErrorKind, SessionResult};

use super::types::{ApiInfo, ErrorResponse, HealthResponse, QueryRequest, QueryResponse};

/// Shared application state.
pub struct AppState {
    /// `None` when startup could not build the agent; `/query` then answers 503.
    pub agent: Option<Agent>,
    /// Why the agent is missing, for `/health`.
    pub init_error: Option<String>,
    /// Parent of every session token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(agent: Agent, shutdown: CancellationToken) -> Self {
        Self {
            agent: Some(agent),
            init_error: None,
            shutdown,
        }
    }

    pub fn unavailable(reason: impl Into<String>, shutdown: CancellationToken) -> Self {
        Self {
            agent: None,
            init_error: Some(reason.into()),
            shutdown,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_info))
        .route("/query", post(query))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, message) = match (&state.agent, &state.init_error) {
        (Some(_), _) => ("healthy", "Agent is ready".to_string()),
        (None, Some(reason)) => ("degraded", format!("Agent failed to initialize: {}", reason)),
        (None, None) => ("degraded", "Agent is not initialized".to_string()),
    };
    Json(HealthResponse {
        status: status.to_string(),
        agent_ready: state.agent.is_some(),
        message,
    })
}

async fn api_info(State(state): State<Arc<AppState>>) -> Json<ApiInfo> {
    let tools = state
        .agent
        .as_ref()
        .map(|a| a.tools().names().into_iter().map(String::from).collect())
        .unwrap_or_default();
    Json(ApiInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: if state.agent.is_some() { "running" } else { "degraded" }.to_string(),
        tools,
    })
}

async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err(bad_request("question is required"));
    }

    let Some(base) = state.agent.as_ref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Agent is not initialized".to_string(),
                kind: None,
            }),
        ));
    };

    let mut agent = match &req.tools {
        Some(names) => base
            .tools()
            .restricted_to(names.as_slice())
            .map(|tools| base.with_tools(tools))
            .map_err(|e| bad_request(&e.to_string()))?,
        None => base.clone(),
    };
    // Requests may lower the ceiling, never raise it past the configured one.
    if let Some(n) = req.max_iterations {
        agent = agent.with_max_iterations(n.min(base.options().max_iterations));
    }

    // Dropping the request drops the guard, which cancels the session.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let session = tokio::spawn(async move { agent.run_session(&question, &cancel).await });
    let report = session.await.map_err(|e| {
        tracing::error!("Session task failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "internal error".to_string(),
                kind: None,
            }),
        )
    })?;

    match &report.result {
        SessionResult::Success { answer } => Ok(Json(QueryResponse {
            answer: answer.clone(),
            iterations: report.cycles,
        })),
        SessionResult::Failure { kind, .. } => Err((
            status_for(*kind),
            Json(ErrorResponse {
                error: report.result.user_message(),
                kind: Some(*kind),
            }),
        )),
    }
}

/// HTTP status for a failed session.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ReasoningEngineError => StatusCode::BAD_GATEWAY,
        ErrorKind::IterationLimitExceeded => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::CancellationRequested => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            kind: None,
        }),
    )
}
