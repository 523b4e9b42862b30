//! Thin HTTP surface
//!
//! Three routes: keyword submission, aggregate status, and a health probe.
//! All crawl logic lives behind `TaskSubmissionService`; handlers only
//! translate between HTTP and the application layer.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::application::submission::{SubmissionReport, TaskSubmissionService};
use crate::domain::entities::TaskStatusCounts;

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: &str, data: T) -> Self {
        Self {
            code: 0,
            message: message.to_string(),
            data: Some(data),
        }
    }

    fn error(message: String) -> Self {
        Self {
            code: -1,
            message,
            data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    pub keywords: Vec<String>,
}

#[derive(Clone)]
struct ApiState {
    service: Arc<TaskSubmissionService>,
}

/// Build the router for the task submission API.
pub fn router(service: Arc<TaskSubmissionService>) -> Router {
    Router::new()
        .route("/api/crawl", post(handle_crawl))
        .route("/api/status", get(handle_status))
        .route("/health", get(handle_health))
        .with_state(ApiState { service })
}

async fn handle_crawl(
    State(state): State<ApiState>,
    Json(request): Json<CrawlRequest>,
) -> impl IntoResponse {
    if request.keywords.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<SubmissionReport>::error(
                "keywords must not be empty".to_string(),
            )),
        );
    }

    match state.service.submit_keywords(&request.keywords).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::ok("tasks submitted", report)),
        ),
        Err(err) => {
            error!("Keyword submission failed: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("submission failed: {err}"))),
            )
        }
    }
}

async fn handle_status(State(state): State<ApiState>) -> impl IntoResponse {
    match state.service.status_counts().await {
        Ok(counts) => (StatusCode::OK, Json(ApiResponse::ok("ok", counts))),
        Err(err) => {
            error!("Status query failed: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<TaskStatusCounts>::error(format!(
                    "status query failed: {err}"
                ))),
            )
        }
    }
}

async fn handle_health() -> impl IntoResponse {
    Json(ApiResponse::ok("ok", serde_json::json!({})))
}
