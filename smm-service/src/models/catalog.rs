use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Decimal places kept on the local cost basis (`services.original_rate`).
pub const RATE_SCALE: u32 = 4;

/// Decimal places kept on the provider-to-local rate multiplier.
pub const MULTIPLIER_SCALE: u32 = 6;

/// Local cost per 1000 for a provider rate, at the stored scale.
pub fn local_rate(provider_rate: Decimal, multiplier: Decimal) -> Decimal {
    (provider_rate * multiplier)
        .round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A locally sold catalog item, optionally backed by a provider service.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sell_price_per_1000: Decimal,
    /// Local cost basis: the provider rate times `rate_multiplier`.
    pub original_rate: Option<Decimal>,
    /// Converts provider rates into `original_rate` units.
    pub rate_multiplier: Decimal,
    pub min_quantity: i32,
    pub max_quantity: i32,
    pub category_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub provider_service_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    /// The provider and provider-side service id, when both are set.
    pub fn provider_link(&self) -> Option<(Uuid, &str)> {
        match (self.provider_id, self.provider_service_id.as_deref()) {
            (Some(provider_id), Some(external_id)) => Some((provider_id, external_id)),
            _ => None,
        }
    }

    /// `original_rate` this service should hold for a fresh provider rate.
    pub fn expected_rate(&self, provider_rate: Decimal) -> Decimal {
        local_rate(provider_rate, self.rate_multiplier)
    }

    pub fn accepts_quantity(&self, quantity: i32) -> bool {
        quantity >= self.min_quantity && quantity <= self.max_quantity
    }
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub description: Option<String>,
    pub sell_price_per_1000: Decimal,
    pub original_rate: Option<Decimal>,
    pub rate_multiplier: Decimal,
    pub min_quantity: i32,
    pub max_quantity: i32,
    pub category_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub provider_service_id: Option<String>,
}

/// A service as listed in a provider's catalog.
///
/// Only held in memory while an admin browses and imports a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalService {
    pub service: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub rate: Decimal,
    pub min: i32,
    pub max: i32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ExternalService {
    /// Case-insensitive match of `needle` against name, category and id.
    /// `needle` is expected to be lowercase already.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.category.to_lowercase().contains(needle)
            || self.service.to_lowercase().contains(needle)
    }
}
