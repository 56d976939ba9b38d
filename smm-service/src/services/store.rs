//! Persistence seam for the fulfillment core.
//!
//! Every write sets absolute values except balance changes, which are
//! additive and atomic in every implementation.

use crate::models::{
    NewOrder, NewProvider, NewService, Order, OrderProgress, OrderStatus, Payment, Provider,
    ProviderUpdate, Service,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait Store: Send + Sync {
    /// Check that the backing storage is reachable.
    async fn health_check(&self) -> Result<(), AppError>;

    // Providers

    async fn create_provider(&self, provider: NewProvider) -> Result<Provider, AppError>;

    async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>, AppError>;

    async fn list_providers(&self) -> Result<Vec<Provider>, AppError>;

    async fn list_active_providers(&self) -> Result<Vec<Provider>, AppError>;

    /// Apply the set fields. Returns `None` when the provider does not exist.
    async fn update_provider(
        &self,
        id: Uuid,
        update: ProviderUpdate,
    ) -> Result<Option<Provider>, AppError>;

    /// Replace the stored key. Returns `false` when the provider does not exist.
    async fn rotate_provider_key(&self, id: Uuid, api_key: Secret<String>)
        -> Result<bool, AppError>;

    // Catalog

    async fn category_exists(&self, id: Uuid) -> Result<bool, AppError>;

    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, AppError>;

    /// Services linked to `provider_id` through both linkage fields.
    async fn list_linked_services(&self, provider_id: Uuid) -> Result<Vec<Service>, AppError>;

    async fn update_original_rate(&self, service_id: Uuid, rate: Decimal) -> Result<(), AppError>;

    /// Insert all services or none.
    async fn insert_services(&self, services: Vec<NewService>) -> Result<Vec<Service>, AppError>;

    // Orders

    /// Debit the order amount from the user's balance and insert the order,
    /// as one atomic step. Returns `None` when the balance is insufficient,
    /// in which case nothing is written.
    async fn create_order_debiting_balance(
        &self,
        order: NewOrder,
    ) -> Result<Option<Order>, AppError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError>;

    /// Orders with an external id whose status is still open.
    async fn list_open_forwarded_orders(&self) -> Result<Vec<Order>, AppError>;

    /// Record the provider order id and move the order to `processing`.
    ///
    /// Only applies while the order is `pending` without an external id.
    /// Returns whether the write happened.
    async fn record_forwarded(
        &self,
        order_id: Uuid,
        external_order_id: &str,
    ) -> Result<bool, AppError>;

    /// Cancel an order the provider refused. Only applies while `pending`.
    async fn cancel_pending_order(&self, order_id: Uuid) -> Result<bool, AppError>;

    /// Write the set fields of `progress`.
    ///
    /// The status only changes while the order is still open, so a manual
    /// override made after the sweep read the order is kept.
    async fn apply_progress(&self, order_id: Uuid, progress: &OrderProgress)
        -> Result<(), AppError>;

    async fn set_order_status(&self, order_id: Uuid, status: OrderStatus)
        -> Result<bool, AppError>;

    // Wallet

    /// Current balance; users without a profile have zero.
    async fn get_balance(&self, user_id: Uuid) -> Result<Decimal, AppError>;

    async fn create_payment(
        &self,
        user_id: Uuid,
        amount: Decimal,
        utr: &str,
    ) -> Result<Payment, AppError>;

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError>;

    /// Mark a pending payment approved and credit its amount, atomically.
    /// Returns `None` when the payment is not pending.
    async fn approve_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError>;

    /// Mark a pending payment rejected. Returns `None` when it is not pending.
    async fn reject_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError>;
}
