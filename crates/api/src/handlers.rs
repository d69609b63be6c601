use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use graph::GraphStore;
use rag::{GraphRag, PipelineStage, RagAnswer, RagError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics::{Metrics, MetricsSnapshot, TimedOperation};
use crate::session::{ChatMessage, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub rag: Arc<GraphRag>,
    pub store: Arc<dyn GraphStore>,
    pub sessions: Arc<SessionStore>,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        .route("/chat", post(chat))
        .route("/ask", post(ask))
        .route("/sessions/:id/messages", get(session_messages))
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    neo4j: String,
    sessions: usize,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    session_id: Option<Uuid>,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    session_id: Uuid,
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cypher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
}

#[derive(Deserialize)]
pub struct AskRequest {
    question: String,
    #[serde(default)]
    return_context: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    error_kind: &'static str,
    message: &'static str,
    stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cypher: Option<String>,
}

/// A failed `/ask`, rendered with a status code that matches the failure kind.
pub struct ApiError(RagError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RagError::Validation(_) => StatusCode::BAD_REQUEST,
            RagError::Translation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::Model { .. } => StatusCode::BAD_GATEWAY,
            RagError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error_kind: self.0.kind(),
            message: self.0.user_message(),
            stage: self.0.stage(),
            cypher: self.0.query().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // Check Neo4j with a simple query
    let neo4j_status = match state.store.verify_connectivity().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        neo4j: neo4j_status,
        sessions: state.sessions.len(),
    })
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// One conversational turn. Always completes: failures become the assistant message.
async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Json<ChatResponse> {
    let session_id = state.sessions.open(req.session_id);
    state.sessions.append(session_id, ChatMessage::user(&req.message));

    let outcome = answer_question(&state, &req.message, true).await;

    let response = match outcome {
        Ok(answer) => ChatResponse {
            session_id,
            cypher: answer
                .retrieval_result
                .as_ref()
                .and_then(|r| r.query())
                .map(str::to_string),
            answer: answer.answer,
            error_kind: None,
        },
        Err(e) => ChatResponse {
            session_id,
            answer: e.user_message().to_string(),
            cypher: e.query().map(str::to_string),
            error_kind: Some(e.kind()),
        },
    };

    state.sessions.append(session_id, ChatMessage::assistant(&response.answer));
    Json(response)
}

async fn ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> Result<Json<RagAnswer>, ApiError> {
    answer_question(&state, &req.question, req.return_context)
        .await
        .map(Json)
        .map_err(ApiError)
}

async fn session_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    state.sessions.messages(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn answer_question(state: &AppState, question: &str, return_context: bool) -> Result<RagAnswer, RagError> {
    let timer = TimedOperation::start();

    match state.rag.search(question, return_context).await {
        Ok(answer) => {
            let record_count = answer.retrieval_result.as_ref().map(|r| r.items.len());
            state.metrics.record_answer(timer.elapsed(), record_count);
            info!(elapsed_ms = timer.elapsed().as_millis() as u64, "question answered");
            Ok(answer)
        }
        Err(e) => {
            state.metrics.record_failure(e.kind(), timer.elapsed());
            log_failure(question, &e);
            Err(e)
        }
    }
}

fn log_failure(question: &str, err: &RagError) {
    let raw_output = match err {
        RagError::Translation(failure) => failure.raw_output(),
        _ => None,
    };

    match err {
        RagError::Validation(_) => {
            info!(kind = err.kind(), error = %err, "rejected question");
        }
        RagError::Translation(_) => {
            warn!(
                question,
                kind = err.kind(),
                stage = ?err.stage(),
                cypher = err.query().unwrap_or(""),
                raw_output = raw_output.unwrap_or(""),
                error = %err,
                "question could not be answered"
            );
        }
        RagError::Model { .. } | RagError::Configuration(_) => {
            error!(question, kind = err.kind(), stage = ?err.stage(), error = %err, "question could not be answered");
        }
    }
}
