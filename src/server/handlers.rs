//! HTTP endpoint handlers.
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info};

use super::AppState;
use super::types::{ErrorResponse, MessageResponse, QueryRequest, QueryResponse};
use crate::error::RagError;
use crate::models::CourseAnalytics;

/// Errors rendered as `{"detail": ...}`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or incomplete request body (422).
    Validation(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Validation(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            Self::Internal(detail) => {
                error!("Request failed: {detail}");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        Self::Internal(e.to_string())
    }
}

/// `POST /api/query`
pub async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload?;

    let session_id = match request.session_id {
        Some(id) if !id.is_empty() => id,
        _ => state.rag.sessions().create_session(),
    };

    let (answer, sources) = state.rag.query(&request.query, Some(&session_id)).await;

    Ok(Json(QueryResponse {
        answer,
        sources,
        session_id,
    }))
}

/// `GET /api/courses`
pub async fn courses_handler(
    State(state): State<AppState>,
) -> Result<Json<CourseAnalytics>, ApiError> {
    Ok(Json(state.rag.get_course_analytics().await?))
}

/// `DELETE /api/session/:session_id`
pub async fn clear_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<MessageResponse> {
    if state.rag.sessions().clear_session(&session_id) {
        info!("Cleared session {session_id}");
    }
    Json(MessageResponse::new("Session cleared successfully"))
}

/// `GET /` when no frontend is served.
pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("RAG System API is running"))
}
