//! Submits local orders to their upstream provider, at most once.

use crate::services::error::FulfillmentError;
use crate::services::metrics::record_forward;
use crate::services::provider_client::{ProviderApi, ProviderError};
use crate::services::store::Store;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Result of a forwarding attempt that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ForwardOutcome {
    /// The order's service has no provider behind it.
    NotLinked,
    /// Accepted upstream; the order is now `processing`.
    Forwarded { external_order_id: String },
    /// Refused upstream; the order is now `cancelled`.
    Rejected { message: String },
}

impl ForwardOutcome {
    pub fn forwarded(&self) -> bool {
        matches!(self, Self::Forwarded { .. })
    }
}

#[derive(Clone)]
pub struct OrderForwarder {
    store: Arc<dyn Store>,
    providers: Arc<dyn ProviderApi>,
}

impl OrderForwarder {
    pub fn new(store: Arc<dyn Store>, providers: Arc<dyn ProviderApi>) -> Self {
        Self { store, providers }
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn forward(&self, order_id: Uuid) -> Result<ForwardOutcome, FulfillmentError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(format!("Order {} not found", order_id)))?;

        let service = self
            .store
            .get_service(order.service_id)
            .await?
            .ok_or_else(|| {
                FulfillmentError::not_found(format!("Service {} not found", order.service_id))
            })?;

        let Some((provider_id, external_service_id)) = service.provider_link() else {
            tracing::debug!(service_id = %service.id, "Service is not provider-linked");
            record_forward("not_linked");
            return Ok(ForwardOutcome::NotLinked);
        };

        if !order.is_forwardable() {
            record_forward("already_forwarded");
            return Err(FulfillmentError::AlreadyForwarded(order_id));
        }

        let provider = match self.store.get_provider(provider_id).await? {
            Some(p) if p.active => p,
            Some(_) => {
                record_forward("provider_unavailable");
                return Err(FulfillmentError::ProviderUnavailable(format!(
                    "Provider {} is inactive",
                    provider_id
                )));
            }
            None => {
                record_forward("provider_unavailable");
                return Err(FulfillmentError::ProviderUnavailable(format!(
                    "Provider {} not found",
                    provider_id
                )));
            }
        };

        let submitted = self
            .providers
            .submit_order(&provider, external_service_id, &order.link, order.quantity)
            .await;

        match submitted {
            Ok(external_order_id) => {
                if !self
                    .store
                    .record_forwarded(order_id, &external_order_id)
                    .await?
                {
                    // Lost a race with another forward of the same order.
                    tracing::error!(
                        order_id = %order_id,
                        provider_id = %provider_id,
                        external_order_id = %external_order_id,
                        "Provider accepted order that was already forwarded"
                    );
                    record_forward("already_forwarded");
                    return Err(FulfillmentError::AlreadyForwarded(order_id));
                }

                tracing::info!(
                    provider_id = %provider_id,
                    external_order_id = %external_order_id,
                    "Order forwarded"
                );
                record_forward("forwarded");
                Ok(ForwardOutcome::Forwarded { external_order_id })
            }
            Err(ProviderError::Business(message)) => {
                self.store.cancel_pending_order(order_id).await?;
                tracing::warn!(
                    provider_id = %provider_id,
                    reason = %message,
                    "Provider rejected order, order cancelled"
                );
                record_forward("rejected");
                Ok(ForwardOutcome::Rejected { message })
            }
            Err(e) => {
                tracing::warn!(
                    provider_id = %provider_id,
                    error = %e,
                    "Order forwarding failed, order left pending"
                );
                record_forward("failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serializes_with_tag() {
        assert_eq!(
            serde_json::to_value(ForwardOutcome::Forwarded {
                external_order_id: "98765".to_string()
            })
            .unwrap(),
            json!({ "outcome": "forwarded", "external_order_id": "98765" })
        );
        assert_eq!(
            serde_json::to_value(ForwardOutcome::NotLinked).unwrap(),
            json!({ "outcome": "not_linked" })
        );
    }
}
