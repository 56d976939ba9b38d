//! Periodic sweep reflecting provider-reported progress onto local orders.

use crate::models::{Order, OrderProgress, Provider, Service};
use crate::services::error::FulfillmentError;
use crate::services::metrics::record_reconciled_order;
use crate::services::provider_client::{ProviderApi, ProviderOrderStatus};
use crate::services::store::Store;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Open forwarded orders selected for the sweep.
    pub total: usize,
    /// Orders whose provider status was fetched.
    pub synced: usize,
    /// Orders that received a write.
    pub updated: usize,
    /// Orders whose provider is missing or inactive.
    pub skipped: usize,
    pub errors: usize,
}

enum Visit {
    Updated,
    Unchanged,
    Skipped,
}

/// Compute the write for `order` given what the provider reported.
///
/// A recognized status is written only when it differs; counts are written
/// whenever the provider sent them.
pub fn plan_update(order: &Order, reported: &ProviderOrderStatus) -> OrderProgress {
    OrderProgress {
        status: reported.status.filter(|s| *s != order.status),
        start_count: reported.start_count,
        remains: reported.remains,
    }
}

#[derive(Clone)]
pub struct StatusReconciler {
    store: Arc<dyn Store>,
    providers: Arc<dyn ProviderApi>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn Store>, providers: Arc<dyn ProviderApi>) -> Self {
        Self { store, providers }
    }

    /// Poll every open forwarded order once.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<ReconcileSummary, FulfillmentError> {
        let orders = self.store.list_open_forwarded_orders().await?;
        let mut summary = ReconcileSummary {
            total: orders.len(),
            ..Default::default()
        };

        // Lookups are cached for this sweep only.
        let mut services: HashMap<Uuid, Option<Service>> = HashMap::new();
        let mut providers: HashMap<Uuid, Option<Provider>> = HashMap::new();

        for order in &orders {
            match self.visit(order, &mut services, &mut providers).await {
                Ok(Visit::Updated) => {
                    summary.synced += 1;
                    summary.updated += 1;
                    record_reconciled_order("updated");
                }
                Ok(Visit::Unchanged) => {
                    summary.synced += 1;
                    record_reconciled_order("unchanged");
                }
                Ok(Visit::Skipped) => {
                    summary.skipped += 1;
                    record_reconciled_order("skipped");
                }
                Err(e) => {
                    summary.errors += 1;
                    record_reconciled_order("error");
                    tracing::warn!(order_id = %order.id, error = %e, "Failed to reconcile order");
                }
            }
        }

        tracing::info!(
            total = summary.total,
            synced = summary.synced,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            "Status reconciliation finished"
        );

        Ok(summary)
    }

    async fn visit(
        &self,
        order: &Order,
        services: &mut HashMap<Uuid, Option<Service>>,
        providers: &mut HashMap<Uuid, Option<Provider>>,
    ) -> Result<Visit, FulfillmentError> {
        let Some(external_order_id) = order.external_order_id.as_deref() else {
            return Ok(Visit::Skipped);
        };

        if !services.contains_key(&order.service_id) {
            let service = self.store.get_service(order.service_id).await?;
            services.insert(order.service_id, service);
        }
        let Some(provider_id) = services
            .get(&order.service_id)
            .and_then(|s| s.as_ref())
            .and_then(|s| s.provider_id)
        else {
            return Ok(Visit::Skipped);
        };

        if !providers.contains_key(&provider_id) {
            let provider = self.store.get_provider(provider_id).await?;
            providers.insert(provider_id, provider);
        }
        let Some(provider) = providers
            .get(&provider_id)
            .and_then(|p| p.as_ref())
            .filter(|p| p.active)
        else {
            return Ok(Visit::Skipped);
        };

        let reported = self
            .providers
            .check_status(provider, external_order_id)
            .await?;

        if reported.status.is_none() {
            if let Some(raw) = reported.raw_status.as_deref() {
                tracing::debug!(order_id = %order.id, raw_status = raw, "Unrecognized provider status");
            }
        }

        let progress = plan_update(order, &reported);
        if progress.is_empty() {
            return Ok(Visit::Unchanged);
        }

        self.store.apply_progress(order.id, &progress).await?;
        tracing::debug!(
            order_id = %order.id,
            status = ?progress.status,
            start_count = ?progress.start_count,
            remains = ?progress.remains,
            "Order progress updated"
        );
        Ok(Visit::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn processing_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            link: "https://instagram.com/p/abc".to_string(),
            quantity: 1000,
            amount: Decimal::new(1250, 2),
            status: OrderStatus::Processing,
            external_order_id: Some("98765".to_string()),
            start_count: None,
            remains: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn same_status_without_counts_plans_nothing() {
        let reported = ProviderOrderStatus {
            status: Some(OrderStatus::Processing),
            raw_status: Some("In progress".to_string()),
            start_count: None,
            remains: None,
        };
        assert!(plan_update(&processing_order(), &reported).is_empty());
    }

    #[test]
    fn partial_with_remains() {
        let reported = ProviderOrderStatus {
            status: Some(OrderStatus::Partial),
            raw_status: Some("Partial".to_string()),
            start_count: None,
            remains: Some(40),
        };
        assert_eq!(
            plan_update(&processing_order(), &reported),
            OrderProgress {
                status: Some(OrderStatus::Partial),
                start_count: None,
                remains: Some(40),
            }
        );
    }

    #[test]
    fn unknown_status_still_writes_counts() {
        let reported = ProviderOrderStatus {
            status: None,
            raw_status: Some("Refilling".to_string()),
            start_count: Some(120),
            remains: None,
        };
        let plan = plan_update(&processing_order(), &reported);
        assert_eq!(plan.status, None);
        assert_eq!(plan.start_count, Some(120));
    }
}
