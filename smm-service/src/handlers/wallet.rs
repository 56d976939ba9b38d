use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{BalanceResponse, SubmitPaymentRequest};
use crate::middleware::CallerContext;
use crate::models::Payment;
use crate::startup::AppState;

pub async fn get_balance(
    State(state): State<AppState>,
    caller: CallerContext,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.wallet.balance(caller.user_id).await?;
    Ok(Json(BalanceResponse {
        user_id: caller.user_id,
        balance,
    }))
}

#[tracing::instrument(skip(state, caller, request), fields(user_id = %caller.user_id))]
pub async fn submit_payment(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(request): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    request.validate()?;

    let payment = state
        .wallet
        .submit_payment(caller.user_id, request.amount, &request.utr)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
