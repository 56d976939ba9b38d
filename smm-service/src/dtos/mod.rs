//! Request and response bodies for the HTTP API.

use crate::models::{ExternalService, Order, OrderStatus};
use crate::services::ForwardOutcome;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub service_id: Uuid,
    #[validate(url(message = "Link must be a valid URL"))]
    pub link: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Forwarding result as reported to API callers.
#[derive(Debug, Serialize)]
pub struct ForwardResponse {
    pub forwarded: bool,
    #[serde(flatten)]
    pub outcome: ForwardOutcome,
}

impl From<ForwardOutcome> for ForwardResponse {
    fn from(outcome: ForwardOutcome) -> Self {
        Self {
            forwarded: outcome.forwarded(),
            outcome,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    /// Present when forwarding was attempted and completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward: Option<ForwardResponse>,
    /// Present when forwarding failed; the order stays pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 64, message = "UTR must be 1 to 64 characters"))]
    pub utr: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateProviderRequest {
    #[validate(length(min = 1, max = 200, message = "Provider name is required"))]
    pub name: String,
    #[validate(url(message = "Base URL must be a valid URL"))]
    pub base_url: String,
    pub api_key: Secret<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProviderRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(url)]
    pub base_url: Option<String>,
    pub active: Option<bool>,
}

#[derive(Deserialize)]
pub struct RotateKeyRequest {
    pub api_key: Secret<String>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub provider_id: Uuid,
    pub count: usize,
    pub services: Vec<ExternalService>,
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Deserialize)]
pub struct ImportServicesRequest {
    pub category_id: Option<Uuid>,
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
    #[serde(default)]
    pub markup_percent: Decimal,
    #[serde(default)]
    pub services: Vec<ExternalService>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}
