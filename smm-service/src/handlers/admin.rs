//! Admin-only endpoints. Every handler requires [`AdminContext`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{
    CatalogQuery, CatalogResponse, CreateProviderRequest, ForwardResponse, ImportServicesRequest,
    OrderStatusRequest, RotateKeyRequest, UpdateProviderRequest,
};
use crate::middleware::AdminContext;
use crate::models::{Order, Payment, ProviderUpdate, ProviderView};
use crate::services::{ImportRequest, ImportSummary, RateSyncSummary, ReconcileSummary};
use crate::startup::AppState;

// Providers

pub async fn list_providers(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<ProviderView>>, AppError> {
    Ok(Json(state.registry.list().await?))
}

#[tracing::instrument(skip(state, _admin, request), fields(name = %request.name))]
pub async fn create_provider(
    State(state): State<AppState>,
    _admin: AdminContext,
    Json(request): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<ProviderView>), AppError> {
    request.validate()?;

    let view = state
        .registry
        .register(&request.name, &request.base_url, request.api_key)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_provider(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(provider_id): Path<Uuid>,
    Json(request): Json<UpdateProviderRequest>,
) -> Result<Json<ProviderView>, AppError> {
    request.validate()?;

    let view = state
        .registry
        .update(
            provider_id,
            ProviderUpdate {
                name: request.name,
                base_url: request.base_url,
                active: request.active,
            },
        )
        .await?;
    Ok(Json(view))
}

#[tracing::instrument(skip(state, _admin, request))]
pub async fn rotate_provider_key(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(provider_id): Path<Uuid>,
    Json(request): Json<RotateKeyRequest>,
) -> Result<Json<ProviderView>, AppError> {
    let view = state
        .registry
        .rotate_key(provider_id, request.api_key)
        .await?;
    Ok(Json(view))
}

// Catalog

#[tracing::instrument(skip(state, _admin))]
pub async fn provider_catalog(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>, AppError> {
    let services = state
        .importer
        .fetch_catalog(provider_id, query.q.as_deref())
        .await?;

    Ok(Json(CatalogResponse {
        provider_id,
        count: services.len(),
        services,
    }))
}

#[tracing::instrument(skip(state, _admin, request))]
pub async fn import_services(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(provider_id): Path<Uuid>,
    Json(request): Json<ImportServicesRequest>,
) -> Result<(StatusCode, Json<ImportSummary>), AppError> {
    let summary = state
        .importer
        .import(
            provider_id,
            ImportRequest {
                category_id: request.category_id,
                multiplier: request.multiplier,
                markup_percent: request.markup_percent,
                services: request.services,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

// Orders

#[tracing::instrument(skip(state, _admin))]
pub async fn forward_order(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ForwardResponse>, AppError> {
    let outcome = state.forwarder.forward(order_id).await?;
    Ok(Json(outcome.into()))
}

#[tracing::instrument(skip(state, _admin, request))]
pub async fn override_order_status(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(order_id): Path<Uuid>,
    Json(request): Json<OrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.desk.override_status(order_id, request.status).await?;
    Ok(Json(order))
}

// Payments

#[tracing::instrument(skip(state, _admin))]
pub async fn approve_payment(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.wallet.approve_payment(payment_id).await?))
}

#[tracing::instrument(skip(state, _admin))]
pub async fn reject_payment(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.wallet.reject_payment(payment_id).await?))
}

// Sweeps

pub async fn run_reconciliation(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<ReconcileSummary>, AppError> {
    Ok(Json(state.reconciler.run().await?))
}

pub async fn run_rate_sync(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<RateSyncSummary>, AppError> {
    Ok(Json(state.rates.run().await?))
}
