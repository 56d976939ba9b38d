use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateOrderRequest, CreateOrderResponse, ForwardResponse};
use crate::middleware::CallerContext;
use crate::models::Order;
use crate::services::PlaceOrder;
use crate::startup::AppState;

/// Place an order and forward it right away.
///
/// A forwarding failure does not fail the request: the order exists and
/// has been paid for, so it is returned pending with the error attached.
#[tracing::instrument(skip(state, caller, request), fields(user_id = %caller.user_id))]
pub async fn create_order(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    request.validate()?;

    let order = state
        .desk
        .place(PlaceOrder {
            user_id: caller.user_id,
            service_id: request.service_id,
            link: request.link,
            quantity: request.quantity,
        })
        .await?;

    let (forward, forward_error) = match state.forwarder.forward(order.id).await {
        Ok(outcome) => (Some(ForwardResponse::from(outcome)), None),
        Err(e) => {
            tracing::warn!(order_id = %order.id, error = %e, "Forwarding after placement failed");
            (None, Some(e.to_string()))
        }
    };

    // Reload to reflect the forwarding result.
    let order = state.desk.get(order.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order,
            forward,
            forward_error,
        }),
    ))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = if caller.is_admin() {
        state.desk.get(order_id).await?
    } else {
        state.desk.get_for_owner(order_id, caller.user_id).await?
    };
    Ok(Json(order))
}

/// Retry forwarding of the caller's own order.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn forward_order(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ForwardResponse>, AppError> {
    state.desk.get_for_owner(order_id, caller.user_id).await?;
    let outcome = state.forwarder.forward(order_id).await?;
    Ok(Json(outcome.into()))
}
