//! Admin management of upstream providers.

use crate::models::{NewProvider, ProviderUpdate, ProviderView};
use crate::services::error::FulfillmentError;
use crate::services::store::Store;
use secrecy::{ExposeSecret, Secret};
use service_core::utils::mask_secret;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

fn validate_base_url(base_url: &str) -> Result<(), FulfillmentError> {
    let lower = base_url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .ok_or_else(|| FulfillmentError::validation("Base URL must start with http:// or https://"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(FulfillmentError::validation("Base URL must include a host"));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), FulfillmentError> {
    if name.trim().is_empty() {
        return Err(FulfillmentError::validation("Provider name is required"));
    }
    Ok(())
}

fn validate_key(api_key: &Secret<String>) -> Result<(), FulfillmentError> {
    if api_key.expose_secret().trim().is_empty() {
        return Err(FulfillmentError::validation("API key is required"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ProviderRegistry {
    store: Arc<dyn Store>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, api_key))]
    pub async fn register(
        &self,
        name: &str,
        base_url: &str,
        api_key: Secret<String>,
    ) -> Result<ProviderView, FulfillmentError> {
        validate_name(name)?;
        validate_base_url(base_url)?;
        validate_key(&api_key)?;

        let key_masked = mask_secret(&api_key);
        let provider = self
            .store
            .create_provider(NewProvider {
                name: name.trim().to_string(),
                base_url: base_url.trim().to_string(),
                api_key,
            })
            .await?;

        tracing::info!(provider_id = %provider.id, api_key = %key_masked, "Provider registered");
        Ok(ProviderView::from(&provider))
    }

    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: Uuid,
        update: ProviderUpdate,
    ) -> Result<ProviderView, FulfillmentError> {
        if update.is_empty() {
            return Err(FulfillmentError::validation("Nothing to update"));
        }
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(base_url) = &update.base_url {
            validate_base_url(base_url)?;
        }

        let provider = self
            .store
            .update_provider(id, update)
            .await?
            .ok_or_else(|| FulfillmentError::not_found(format!("Provider {} not found", id)))?;

        tracing::info!(provider_id = %id, active = provider.active, "Provider updated");
        Ok(ProviderView::from(&provider))
    }

    /// Replace a provider's key. Keys are write-only.
    #[instrument(skip(self, api_key))]
    pub async fn rotate_key(
        &self,
        id: Uuid,
        api_key: Secret<String>,
    ) -> Result<ProviderView, FulfillmentError> {
        validate_key(&api_key)?;
        let key_masked = mask_secret(&api_key);

        if !self.store.rotate_provider_key(id, api_key).await? {
            return Err(FulfillmentError::not_found(format!("Provider {} not found", id)));
        }

        tracing::info!(provider_id = %id, api_key = %key_masked, "Provider key rotated");
        self.get(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<ProviderView, FulfillmentError> {
        self.store
            .get_provider(id)
            .await?
            .map(|p| ProviderView::from(&p))
            .ok_or_else(|| FulfillmentError::not_found(format!("Provider {} not found", id)))
    }

    pub async fn list(&self) -> Result<Vec<ProviderView>, FulfillmentError> {
        let providers = self.store.list_providers().await?;
        Ok(providers.iter().map(ProviderView::from).collect())
    }
}
