//! Error taxonomy for the fulfillment core.

use crate::services::provider_client::ProviderError;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Provider record missing or deactivated.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Local precondition failed before any provider call.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Order {0} has already been forwarded")]
    AlreadyForwarded(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl FulfillmentError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::ProviderUnavailable(msg) => AppError::ServiceUnavailable(msg),
            FulfillmentError::Provider(e) => AppError::BadGateway(e.to_string()),
            FulfillmentError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            FulfillmentError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            e @ FulfillmentError::AlreadyForwarded(_) => {
                AppError::Conflict(anyhow::anyhow!(e.to_string()))
            }
            FulfillmentError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            FulfillmentError::Store(e) => e,
        }
    }
}
