//! Manual UTR top-ups and balances.

use crate::models::Payment;
use crate::services::error::FulfillmentError;
use crate::services::store::Store;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct Wallet {
    store: Arc<dyn Store>,
}

impl Wallet {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Decimal, FulfillmentError> {
        Ok(self.store.get_balance(user_id).await?)
    }

    /// Record a bank transfer awaiting admin approval.
    #[instrument(skip(self, utr))]
    pub async fn submit_payment(
        &self,
        user_id: Uuid,
        amount: Decimal,
        utr: &str,
    ) -> Result<Payment, FulfillmentError> {
        if amount <= Decimal::ZERO {
            return Err(FulfillmentError::validation("Amount must be greater than zero"));
        }
        let utr = utr.trim();
        if utr.is_empty() {
            return Err(FulfillmentError::validation("UTR is required"));
        }

        let payment = self.store.create_payment(user_id, amount, utr).await?;
        tracing::info!(payment_id = %payment.id, amount = %amount, "Payment submitted");
        Ok(payment)
    }

    /// Approve a pending payment and credit the user, once.
    #[instrument(skip(self))]
    pub async fn approve_payment(&self, payment_id: Uuid) -> Result<Payment, FulfillmentError> {
        match self.store.approve_payment(payment_id).await? {
            Some(payment) => {
                tracing::info!(
                    payment_id = %payment.id,
                    user_id = %payment.user_id,
                    amount = %payment.amount,
                    "Payment approved, balance credited"
                );
                Ok(payment)
            }
            None => Err(self.not_pending(payment_id).await),
        }
    }

    #[instrument(skip(self))]
    pub async fn reject_payment(&self, payment_id: Uuid) -> Result<Payment, FulfillmentError> {
        match self.store.reject_payment(payment_id).await? {
            Some(payment) => {
                tracing::info!(payment_id = %payment.id, "Payment rejected");
                Ok(payment)
            }
            None => Err(self.not_pending(payment_id).await),
        }
    }

    async fn not_pending(&self, payment_id: Uuid) -> FulfillmentError {
        match self.store.get_payment(payment_id).await {
            Ok(Some(payment)) => FulfillmentError::Conflict(format!(
                "Payment {} is already {}",
                payment_id,
                payment.status.as_str()
            )),
            Ok(None) => FulfillmentError::not_found(format!("Payment {} not found", payment_id)),
            Err(e) => e.into(),
        }
    }
}
