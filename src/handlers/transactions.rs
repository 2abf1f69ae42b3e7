use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::use_cases::DepositInput;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDepositRequest {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub reference: Option<String>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub casino_account_id: Option<String>,
    pub casino_username: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn create_deposit(
    State(state): State<AppState>,
    Json(request): Json<CreateDepositRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state
        .deposits
        .execute(DepositInput {
            user_id: request.user_id,
            amount: request.amount,
            reference: request.reference,
            currency: request.currency,
            payment_method: request.payment_method,
            casino_account_id: request.casino_account_id,
            casino_username: request.casino_username,
            metadata: request.metadata,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(tx)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state.store.get_by_id(id).await?;
    Ok(Json(tx))
}
