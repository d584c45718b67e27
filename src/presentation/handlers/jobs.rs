use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use uuid::Uuid;

use crate::application::services::AdmissionError;
use crate::domain::{JobId, JobType, UserId};
use crate::presentation::state::AppState;

/// The upstream gateway authenticates the caller and forwards the identity
/// in this header.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub job_type: String,
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn authenticated_user(headers: &HeaderMap) -> Result<UserId, (StatusCode, Json<ErrorResponse>)> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: format!("Missing {} header", USER_ID_HEADER),
            }),
        ))?;

    Uuid::parse_str(raw).map(UserId::from_uuid).map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: format!("Invalid {} header", USER_ID_HEADER),
            }),
        )
    })
}

#[tracing::instrument(skip(state, headers, parameters))]
pub async fn submit_stt_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(parameters): Json<serde_json::Value>,
) -> impl IntoResponse {
    submit(state, headers, JobType::Stt, parameters).await
}

#[tracing::instrument(skip(state, headers, parameters))]
pub async fn submit_stt_diarize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(parameters): Json<serde_json::Value>,
) -> impl IntoResponse {
    submit(state, headers, JobType::SttDiarize, parameters).await
}

#[tracing::instrument(skip(state, headers, parameters))]
pub async fn submit_tts_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(parameters): Json<serde_json::Value>,
) -> impl IntoResponse {
    submit(state, headers, JobType::Tts, parameters).await
}

async fn submit(
    state: AppState,
    headers: HeaderMap,
    job_type: JobType,
    parameters: serde_json::Value,
) -> axum::response::Response {
    let user_id = match authenticated_user(&headers) {
        Ok(user_id) => user_id,
        Err(rejection) => return rejection.into_response(),
    };

    match state.admission.submit(user_id, job_type, parameters).await {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(SubmitResponse {
                job_id: job_id.to_string(),
                status: "queued".to_string(),
                message: format!("{} job accepted", job_type),
            }),
        )
            .into_response(),
        Err(AdmissionError::InsufficientBalance { current, required }) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(ErrorResponse {
                error: format!(
                    "Insufficient balance: {} available, {} required",
                    current, required
                ),
            }),
        )
            .into_response(),
        Err(AdmissionError::InvalidParameters(message)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("Invalid parameters: {}", message),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to admit job");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to admit job: {}", e),
                }),
            )
                .into_response()
        }
    }
}

#[tracing::instrument(skip(state, headers))]
pub async fn job_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let user_id = match authenticated_user(&headers) {
        Ok(user_id) => user_id,
        Err(rejection) => return rejection.into_response(),
    };

    let uuid = match Uuid::parse_str(&job_id) {
        Ok(u) => u,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid job ID: {}", job_id),
                }),
            )
                .into_response();
        }
    };

    match state.job_repository.get_by_id(JobId::from_uuid(uuid)).await {
        // A job belonging to someone else is indistinguishable from a
        // missing one.
        Ok(Some(job)) if job.user_id == user_id => {
            let response = JobStatusResponse {
                id: job.id.to_string(),
                job_type: job.job_type.as_str().to_string(),
                status: job.status.as_str().to_string(),
                result: job.result,
                error_message: job.error_message,
                created_at: job.created_at.to_rfc3339(),
                updated_at: job.updated_at.to_rfc3339(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Job not found: {}", job_id),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch job status");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to fetch job: {}", e),
                }),
            )
                .into_response()
        }
    }
}
