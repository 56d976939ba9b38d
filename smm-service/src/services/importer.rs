//! Admin-driven import of provider catalog entries as local services.

use crate::models::{local_rate, ExternalService, NewService, MULTIPLIER_SCALE};
use crate::services::error::FulfillmentError;
use crate::services::metrics::record_import;
use crate::services::provider_client::ProviderApi;
use crate::services::store::Store;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Decimal places kept on imported sell prices.
const PRICE_SCALE: u32 = 4;

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub category_id: Option<Uuid>,
    pub multiplier: Decimal,
    pub markup_percent: Decimal,
    pub services: Vec<ExternalService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub service_ids: Vec<Uuid>,
}

/// Upstream rate and local sell price for one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportPrice {
    pub original_rate: Decimal,
    pub sell_price_per_1000: Decimal,
}

/// `original_rate = rate × multiplier`, `sell = original × (1 + markup/100)`.
pub fn price_service(
    item: &ExternalService,
    multiplier: Decimal,
    markup_percent: Decimal,
) -> ImportPrice {
    let original = item.rate * multiplier;
    let sell = original * (Decimal::ONE + markup_percent / Decimal::ONE_HUNDRED);

    ImportPrice {
        original_rate: local_rate(item.rate, multiplier),
        sell_price_per_1000: sell
            .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero),
    }
}

/// Case-insensitive substring match over name, category and provider id.
pub fn filter_catalog(items: Vec<ExternalService>, query: Option<&str>) -> Vec<ExternalService> {
    let needle = query.map(str::trim).unwrap_or_default().to_lowercase();
    if needle.is_empty() {
        return items;
    }
    items.into_iter().filter(|i| i.matches(&needle)).collect()
}

#[derive(Clone)]
pub struct ServiceImporter {
    store: Arc<dyn Store>,
    providers: Arc<dyn ProviderApi>,
}

impl ServiceImporter {
    pub fn new(store: Arc<dyn Store>, providers: Arc<dyn ProviderApi>) -> Self {
        Self { store, providers }
    }

    /// Fetch a provider's catalog, optionally filtered.
    #[instrument(skip(self))]
    pub async fn fetch_catalog(
        &self,
        provider_id: Uuid,
        query: Option<&str>,
    ) -> Result<Vec<ExternalService>, FulfillmentError> {
        let provider = self.store.get_provider(provider_id).await?.ok_or_else(|| {
            FulfillmentError::not_found(format!("Provider {} not found", provider_id))
        })?;

        let items = self.providers.list_services(&provider).await?;
        Ok(filter_catalog(items, query))
    }

    /// Insert the selected entries as services linked to `provider_id`.
    ///
    /// All validation happens before the single batch insert.
    #[instrument(skip(self, request), fields(selected = request.services.len()))]
    pub async fn import(
        &self,
        provider_id: Uuid,
        request: ImportRequest,
    ) -> Result<ImportSummary, FulfillmentError> {
        let result = self.try_import(provider_id, request).await;
        match &result {
            Ok(summary) => {
                record_import("imported");
                tracing::info!(
                    provider_id = %provider_id,
                    imported = summary.imported,
                    "Catalog import completed"
                );
            }
            Err(FulfillmentError::Validation(msg)) => {
                record_import("invalid");
                tracing::info!(provider_id = %provider_id, reason = %msg, "Catalog import refused");
            }
            Err(e) => {
                record_import("failed");
                tracing::warn!(provider_id = %provider_id, error = %e, "Catalog import failed");
            }
        }
        result
    }

    async fn try_import(
        &self,
        provider_id: Uuid,
        request: ImportRequest,
    ) -> Result<ImportSummary, FulfillmentError> {
        let multiplier = request
            .multiplier
            .round_dp_with_strategy(MULTIPLIER_SCALE, RoundingStrategy::MidpointAwayFromZero);

        if request.services.is_empty() {
            return Err(FulfillmentError::validation("No services selected for import"));
        }
        let Some(category_id) = request.category_id else {
            return Err(FulfillmentError::validation("A target category is required"));
        };
        if multiplier <= Decimal::ZERO {
            return Err(FulfillmentError::validation("Multiplier must be greater than zero"));
        }
        if request.markup_percent < -Decimal::ONE_HUNDRED {
            return Err(FulfillmentError::validation("Markup cannot be below -100%"));
        }
        if let Some(bad) = request.services.iter().find(|s| s.min > s.max) {
            return Err(FulfillmentError::validation(format!(
                "Service {} has min {} greater than max {}",
                bad.service, bad.min, bad.max
            )));
        }
        if !self.store.category_exists(category_id).await? {
            return Err(FulfillmentError::validation(format!(
                "Category {} does not exist",
                category_id
            )));
        }
        if self.store.get_provider(provider_id).await?.is_none() {
            return Err(FulfillmentError::not_found(format!(
                "Provider {} not found",
                provider_id
            )));
        }

        let new_services: Vec<NewService> = request
            .services
            .into_iter()
            .map(|item| {
                let price = price_service(&item, multiplier, request.markup_percent);
                NewService {
                    name: item.name,
                    description: item.description,
                    sell_price_per_1000: price.sell_price_per_1000,
                    original_rate: Some(price.original_rate),
                    rate_multiplier: multiplier,
                    min_quantity: item.min,
                    max_quantity: item.max,
                    category_id,
                    provider_id: Some(provider_id),
                    provider_service_id: Some(item.service),
                }
            })
            .collect();

        let inserted = self.store.insert_services(new_services).await?;
        Ok(ImportSummary {
            imported: inserted.len(),
            service_ids: inserted.into_iter().map(|s| s.id).collect(),
        })
    }
}
