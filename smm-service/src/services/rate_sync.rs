//! Refreshes the cached upstream rate of provider-linked services.

use crate::models::Provider;
use crate::services::error::FulfillmentError;
use crate::services::metrics::record_rate_sync;
use crate::services::provider_client::ProviderApi;
use crate::services::store::Store;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateSyncSummary {
    pub providers: usize,
    pub providers_failed: usize,
    pub services_checked: usize,
    pub services_updated: usize,
    /// Linked services absent from their provider's catalog.
    pub services_missing: usize,
}

#[derive(Clone)]
pub struct RateSynchronizer {
    store: Arc<dyn Store>,
    providers: Arc<dyn ProviderApi>,
}

impl RateSynchronizer {
    pub fn new(store: Arc<dyn Store>, providers: Arc<dyn ProviderApi>) -> Self {
        Self { store, providers }
    }

    /// Sync every active provider. Never touches sell prices.
    ///
    /// Provider rates are converted with each service's `rate_multiplier`
    /// before comparing, so an unchanged upstream rate writes nothing.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RateSyncSummary, FulfillmentError> {
        let providers = self.store.list_active_providers().await?;
        let mut summary = RateSyncSummary::default();

        for provider in &providers {
            summary.providers += 1;
            if let Err(e) = self.sync_provider(provider, &mut summary).await {
                summary.providers_failed += 1;
                tracing::warn!(
                    provider_id = %provider.id,
                    error = %e,
                    "Rate sync failed for provider"
                );
            }
        }

        tracing::info!(
            providers = summary.providers,
            providers_failed = summary.providers_failed,
            services_checked = summary.services_checked,
            services_updated = summary.services_updated,
            services_missing = summary.services_missing,
            "Rate sync finished"
        );

        Ok(summary)
    }

    async fn sync_provider(
        &self,
        provider: &Provider,
        summary: &mut RateSyncSummary,
    ) -> Result<(), FulfillmentError> {
        let linked = self.store.list_linked_services(provider.id).await?;
        if linked.is_empty() {
            tracing::debug!(provider_id = %provider.id, "No linked services, skipping catalog fetch");
            return Ok(());
        }

        let catalog = self.providers.list_services(provider).await?;
        let rates: HashMap<String, Decimal> = catalog
            .into_iter()
            .map(|item| (item.service, item.rate))
            .collect();

        for service in &linked {
            let Some((_, external_id)) = service.provider_link() else {
                continue;
            };
            summary.services_checked += 1;

            let Some(provider_rate) = rates.get(external_id).copied() else {
                summary.services_missing += 1;
                record_rate_sync("missing");
                tracing::debug!(
                    service_id = %service.id,
                    provider_service_id = external_id,
                    "Linked service not found in provider catalog"
                );
                continue;
            };

            // Same units and scale as the import wrote.
            let rate = service.expected_rate(provider_rate);
            if service.original_rate == Some(rate) {
                record_rate_sync("unchanged");
                continue;
            }

            self.store.update_original_rate(service.id, rate).await?;
            summary.services_updated += 1;
            record_rate_sync("updated");
            tracing::debug!(
                service_id = %service.id,
                old_rate = ?service.original_rate,
                new_rate = %rate,
                provider_rate = %provider_rate,
                "Original rate updated"
            );
        }

        Ok(())
    }
}
