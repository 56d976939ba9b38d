//! Order placement and admin status changes.

use crate::models::{order_amount, NewOrder, Order, OrderStatus};
use crate::services::error::FulfillmentError;
use crate::services::store::Store;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: Uuid,
    pub service_id: Uuid,
    pub link: String,
    pub quantity: i32,
}

#[derive(Clone)]
pub struct OrderDesk {
    store: Arc<dyn Store>,
}

impl OrderDesk {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a pending order and debit its amount from the user's balance.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, service_id = %request.service_id))]
    pub async fn place(&self, request: PlaceOrder) -> Result<Order, FulfillmentError> {
        let service = self
            .store
            .get_service(request.service_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| {
                FulfillmentError::not_found(format!("Service {} not found", request.service_id))
            })?;

        if !service.accepts_quantity(request.quantity) {
            return Err(FulfillmentError::validation(format!(
                "Quantity must be between {} and {}",
                service.min_quantity, service.max_quantity
            )));
        }

        let link = request.link.trim();
        if link.is_empty() {
            return Err(FulfillmentError::validation("Link is required"));
        }

        let amount = order_amount(request.quantity, service.sell_price_per_1000);
        let order = self
            .store
            .create_order_debiting_balance(NewOrder {
                user_id: request.user_id,
                service_id: service.id,
                link: link.to_string(),
                quantity: request.quantity,
                amount,
            })
            .await?
            .ok_or_else(|| FulfillmentError::validation("Insufficient balance"))?;

        tracing::info!(order_id = %order.id, amount = %order.amount, "Order placed");
        Ok(order)
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order, FulfillmentError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(format!("Order {} not found", order_id)))
    }

    /// Fetch an order, hiding orders that belong to someone else.
    pub async fn get_for_owner(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<Order, FulfillmentError> {
        let order = self.get(order_id).await?;
        if order.user_id != user_id {
            return Err(FulfillmentError::not_found(format!(
                "Order {} not found",
                order_id
            )));
        }
        Ok(order)
    }

    /// Manual status change by an admin.
    #[instrument(skip(self))]
    pub async fn override_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, FulfillmentError> {
        if !self.store.set_order_status(order_id, status).await? {
            return Err(FulfillmentError::not_found(format!(
                "Order {} not found",
                order_id
            )));
        }
        tracing::info!(order_id = %order_id, status = %status, "Order status overridden");
        self.get(order_id).await
    }
}
