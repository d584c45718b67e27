use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::UserId;
use crate::presentation::handlers::jobs::{ErrorResponse, authenticated_user};
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub month: String,
    pub current_balance: Decimal,
    pub tier: String,
    pub monthly_allowance: Decimal,
}

#[tracing::instrument(skip(state, headers))]
pub async fn balance_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = match authenticated_user(&headers) {
        Ok(user_id) => user_id,
        Err(rejection) => return rejection.into_response(),
    };

    match state.ledger.current_balance(user_id).await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(BalanceResponse {
                user_id: snapshot.user_id.to_string(),
                month: snapshot.month.to_string(),
                current_balance: snapshot.current_balance,
                tier: snapshot.tier.as_str().to_string(),
                monthly_allowance: snapshot.monthly_allowance,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch balance");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to fetch balance: {}", e),
                }),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct SetBalanceRequest {
    pub user_id: String,
    pub balance: Decimal,
}

#[tracing::instrument(skip(state, request))]
pub async fn admin_set_balance_handler(
    State(state): State<AppState>,
    Json(request): Json<SetBalanceRequest>,
) -> impl IntoResponse {
    let user_id = match Uuid::parse_str(&request.user_id) {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid user ID: {}", request.user_id),
                }),
            )
                .into_response();
        }
    };

    match state
        .ledger
        .admin_set_balance(user_id, request.balance)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to set balance");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to set balance: {}", e),
                }),
            )
                .into_response()
        }
    }
}
