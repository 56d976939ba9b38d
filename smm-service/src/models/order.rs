use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Partial,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored (local) representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Normalize a provider-reported status.
    ///
    /// Matching is case-insensitive and tolerates surrounding whitespace.
    /// Unknown values yield `None` and must leave the local status untouched.
    pub fn from_provider(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            "processing" | "in progress" | "inprogress" => Some(Self::Processing),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    /// Statuses the reconciler still polls.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub link: String,
    pub quantity: i32,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub external_order_id: Option<String>,
    pub start_count: Option<i64>,
    pub remains: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Forwarding is only allowed once, from `pending`, before an external id exists.
    pub fn is_forwardable(&self) -> bool {
        self.status == OrderStatus::Pending && self.external_order_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub link: String,
    pub quantity: i32,
    pub amount: Decimal,
}

/// Absolute values to write onto an order after a status poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderProgress {
    pub status: Option<OrderStatus>,
    pub start_count: Option<i64>,
    pub remains: Option<i64>,
}

impl OrderProgress {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.start_count.is_none() && self.remains.is_none()
    }
}

/// Charge for `quantity` units at a per-1000 price, rounded to cents.
pub fn order_amount(quantity: i32, price_per_1000: Decimal) -> Decimal {
    let mut amount = (Decimal::from(quantity) * price_per_1000 / Decimal::ONE_THOUSAND)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(2);
    amount
}
