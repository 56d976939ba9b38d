use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::Serialize;
use service_core::utils::mask_secret;
use uuid::Uuid;

/// An upstream SMM provider.
///
/// The API key stays wrapped in [`Secret`] and is only exposed when a
/// provider request is built. Its `Debug` output is redacted.
#[derive(Debug, Clone)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub api_key: Secret<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin-facing projection of a provider with the key masked.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderView {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub api_key_masked: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Provider> for ProviderView {
    fn from(p: &Provider) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            base_url: p.base_url.clone(),
            api_key_masked: mask_secret(&p.api_key),
            active: p.active,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProvider {
    pub name: String,
    pub base_url: String,
    pub api_key: Secret<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderUpdate {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub active: Option<bool>,
}

impl ProviderUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.base_url.is_none() && self.active.is_none()
    }
}
