use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    base::types::{ConversationTurn, QueryOutcome},
    interaction::{answer_followup, process_query},
};

use super::{AppState, session::SessionView};

const INDEX_HTML: &str = include_str!("assets/index.html");

// Errors.

/// Errors a handler can return, rendered as `{ "error": ... }`.
#[derive(Debug)]
pub enum ApiError {
    SessionNotFound(Uuid),
    /// The request needs state the session does not have yet.
    Conflict(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SessionNotFound(id) => (StatusCode::NOT_FOUND, format!("Session {id} not found")),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(err) => {
                error!("Request failed: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// Bodies.

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub project_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FollowupRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub initialized: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub outcome: QueryOutcome,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct FollowupResponse {
    pub answer: String,
    pub session: SessionView,
}

fn non_blank(query: &str) -> Result<&str, ApiError> {
    let query = query.trim();

    if query.is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".to_string()));
    }

    Ok(query)
}

// Handlers.

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn create_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.sessions.create().await)
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SessionView> {
    let session = state.sessions.get(id).await.ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(session.view(id)))
}

#[instrument(skip(state))]
pub async fn initialize(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<InitializeResponse> {
    // Initialization always starts from a clean session.
    state.sessions.update(id, |s| s.clear()).await.ok_or(ApiError::SessionNotFound(id))?;
    let generation = state.sessions.get(id).await.ok_or(ApiError::SessionNotFound(id))?.generation;

    match state.provider.create().await {
        Ok(runtime) => {
            let warnings = runtime.warnings.clone();
            let session = state
                .sessions
                .update(id, |s| {
                    s.apply_if_current(generation, |s| s.runtime = Some(runtime));
                })
                .await
                .ok_or(ApiError::SessionNotFound(id))?;

            info!("Session {id} initialized with {} warnings", warnings.len());

            Ok(Json(InitializeResponse {
                initialized: session.initialized,
                errors: Vec::new(),
                warnings,
                session,
            }))
        }
        Err(err) => {
            let session = state.sessions.get(id).await.ok_or(ApiError::SessionNotFound(id))?.view(id);

            Ok(Json(InitializeResponse {
                initialized: false,
                errors: vec![err.to_string()],
                warnings: Vec::new(),
                session,
            }))
        }
    }
}

pub async fn reset(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SessionView> {
    let view = state.sessions.update(id, |s| s.clear()).await.ok_or(ApiError::SessionNotFound(id))?;
    Ok(Json(view))
}

#[instrument(skip(state, body))]
pub async fn query(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<QueryRequest>) -> ApiResult<QueryResponse> {
    let query = non_blank(&body.query)?;

    let session = state.sessions.get(id).await.ok_or(ApiError::SessionNotFound(id))?;
    let generation = session.generation;
    let runtime = session.runtime.ok_or_else(|| ApiError::Conflict("Please initialize Helios to begin.".to_string()))?;

    let outcome = process_query(&runtime, query, body.project_key.as_deref()).await;

    let turn = ConversationTurn {
        query: query.to_string(),
        response: outcome.response().to_string(),
    };

    let report = match &outcome {
        QueryOutcome::Answered(report) => Some(report.as_ref().clone()),
        QueryOutcome::Unresolved { .. } => None,
    };

    // A reset while the query ran wins over its result.
    let session = state
        .sessions
        .update(id, |s| {
            s.apply_if_current(generation, |s| {
                s.history.push(turn);

                if let Some(report) = report {
                    s.current = Some(report);
                }
            });
        })
        .await
        .ok_or(ApiError::SessionNotFound(id))?;

    Ok(Json(QueryResponse { outcome, session }))
}

#[instrument(skip(state, body))]
pub async fn followup(State(state): State<AppState>, Path(id): Path<Uuid>, Json(body): Json<FollowupRequest>) -> ApiResult<FollowupResponse> {
    let query = non_blank(&body.query)?;

    let session = state.sessions.get(id).await.ok_or(ApiError::SessionNotFound(id))?;
    let generation = session.generation;
    let runtime = session.runtime.ok_or_else(|| ApiError::Conflict("Please initialize Helios to begin.".to_string()))?;
    let previous = session.current.ok_or_else(|| ApiError::Conflict("Ask about a project before asking a follow-up.".to_string()))?;

    let answer = answer_followup(&runtime, query, &previous).await;

    let turn = ConversationTurn {
        query: query.to_string(),
        response: answer.clone(),
    };

    let session = state
        .sessions
        .update(id, |s| {
            s.apply_if_current(generation, |s| s.history.push(turn));
        })
        .await
        .ok_or(ApiError::SessionNotFound(id))?;

    Ok(Json(FollowupResponse { answer, session }))
}
