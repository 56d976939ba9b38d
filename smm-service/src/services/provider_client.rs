//! Client for the de-facto standard SMM provider API.
//!
//! Every provider exposes a single endpoint driven by an `action` query
//! parameter (`services`, `add`, `status`) and authenticated with a `key`
//! parameter. Providers disagree on response details (ids as numbers or
//! strings, rates as strings, missing bounds), so everything coming back is
//! coerced into the local shapes here.

use crate::models::{ExternalService, OrderStatus, Provider};
use crate::services::metrics::record_provider_request;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

const DEFAULT_MIN_QUANTITY: i32 = 100;
const DEFAULT_MAX_QUANTITY: i32 = 10_000;

/// Error type for provider operations.
///
/// Messages never contain the provider key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider answered and explicitly refused the request.
    #[error("Provider rejected request: {0}")]
    Business(String),

    /// The provider answered with something we cannot interpret.
    #[error("Malformed provider response: {0}")]
    Response(String),

    /// Network failure or timeout.
    #[error("Provider transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn is_business(&self) -> bool {
        matches!(self, Self::Business(_))
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Business(_) => "rejected",
            Self::Response(_) => "malformed",
            Self::Transport(_) => "transport_error",
        }
    }
}

/// Result of an `action=status` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOrderStatus {
    /// Normalized status, `None` when the provider used an unknown word.
    pub status: Option<OrderStatus>,
    pub raw_status: Option<String>,
    pub start_count: Option<i64>,
    pub remains: Option<i64>,
}

/// Operations every upstream provider supports.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    async fn list_services(&self, provider: &Provider)
        -> Result<Vec<ExternalService>, ProviderError>;

    async fn submit_order(
        &self,
        provider: &Provider,
        external_service_id: &str,
        link: &str,
        quantity: i32,
    ) -> Result<String, ProviderError>;

    async fn check_status(
        &self,
        provider: &Provider,
        external_order_id: &str,
    ) -> Result<ProviderOrderStatus, ProviderError>;
}

/// HTTP implementation of [`ProviderApi`].
#[derive(Clone)]
pub struct SmmProviderClient {
    client: Client,
}

impl SmmProviderClient {
    /// Create a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(transport_error)?;

        Ok(Self { client })
    }

    /// Issue one provider call and parse the body as JSON.
    async fn call(
        &self,
        provider: &Provider,
        action: &'static str,
        params: &[(&str, &str)],
    ) -> Result<(StatusCode, Value), ProviderError> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 2);
        query.push(("key", provider.api_key.expose_secret().as_str()));
        query.push(("action", action));
        query.extend_from_slice(params);

        tracing::debug!(
            provider_id = %provider.id,
            base_url = %provider.base_url,
            action,
            "Calling provider API"
        );

        let started = Instant::now();
        let result = self.send(provider, action, &query).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok((status, _)) => {
                tracing::debug!(
                    provider_id = %provider.id,
                    action,
                    status = %status,
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "Provider API responded"
                );
            }
            Err(e) => {
                record_provider_request(action, e.outcome(), elapsed);
                tracing::warn!(
                    provider_id = %provider.id,
                    action,
                    error = %e,
                    "Provider API call failed"
                );
            }
        }

        result
    }

    async fn send(
        &self,
        provider: &Provider,
        action: &'static str,
        query: &[(&str, &str)],
    ) -> Result<(StatusCode, Value), ProviderError> {
        let response = self
            .client
            .post(&provider.base_url)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok((status, value)),
            // A non-2xx catalog fetch is a refusal whatever the body is.
            Err(_) if action == "services" && !status.is_success() => Err(
                ProviderError::Business(format!("catalog request returned HTTP {}", status.as_u16())),
            ),
            Err(_) => Err(ProviderError::Response(format!(
                "response is not JSON (HTTP {}, {} bytes)",
                status.as_u16(),
                body.len()
            ))),
        }
    }

    fn finish<T>(
        action: &'static str,
        started: Instant,
        result: Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(_) => record_provider_request(action, "ok", elapsed),
            Err(e) => record_provider_request(action, e.outcome(), elapsed),
        }
        result
    }
}

#[async_trait]
impl ProviderApi for SmmProviderClient {
    async fn list_services(
        &self,
        provider: &Provider,
    ) -> Result<Vec<ExternalService>, ProviderError> {
        let started = Instant::now();
        let (status, body) = self.call(provider, "services", &[]).await?;

        let result = parse_service_list(status, &body);
        if let Ok(items) = &result {
            tracing::info!(
                provider_id = %provider.id,
                services = items.len(),
                "Fetched provider catalog"
            );
        }
        Self::finish("services", started, result)
    }

    async fn submit_order(
        &self,
        provider: &Provider,
        external_service_id: &str,
        link: &str,
        quantity: i32,
    ) -> Result<String, ProviderError> {
        let started = Instant::now();
        let quantity = quantity.to_string();
        let (status, body) = self
            .call(
                provider,
                "add",
                &[
                    ("service", external_service_id),
                    ("link", link),
                    ("quantity", quantity.as_str()),
                ],
            )
            .await?;

        Self::finish("add", started, parse_order_id(status, &body))
    }

    async fn check_status(
        &self,
        provider: &Provider,
        external_order_id: &str,
    ) -> Result<ProviderOrderStatus, ProviderError> {
        let started = Instant::now();
        let (status, body) = self
            .call(provider, "status", &[("order", external_order_id)])
            .await?;

        Self::finish("status", started, parse_order_status(status, &body))
    }
}

/// Strip the URL (which carries the key) from reqwest errors.
fn transport_error(err: reqwest::Error) -> ProviderError {
    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    ProviderError::Transport(format!("{}: {}", kind, err.without_url()))
}

/// The provider's `error` field, if the body is an error object.
fn provider_error(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_service_list(
    status: StatusCode,
    body: &Value,
) -> Result<Vec<ExternalService>, ProviderError> {
    if let Some(message) = provider_error(body) {
        return Err(ProviderError::Business(message));
    }
    if !status.is_success() {
        return Err(ProviderError::Business(format!(
            "catalog request returned HTTP {}",
            status.as_u16()
        )));
    }

    let items = body
        .as_array()
        .ok_or_else(|| ProviderError::Response("expected a JSON array of services".into()))?;

    let services: Vec<ExternalService> = items.iter().filter_map(external_service).collect();
    if services.len() < items.len() {
        tracing::debug!(
            skipped = items.len() - services.len(),
            "Ignored catalog entries without a service id"
        );
    }
    Ok(services)
}

fn parse_order_id(status: StatusCode, body: &Value) -> Result<String, ProviderError> {
    if let Some(message) = provider_error(body) {
        return Err(ProviderError::Business(message));
    }

    body.get("order")
        .or_else(|| body.get("id"))
        .and_then(coerce::text)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ProviderError::Response(format!(
                "order submission response has no order id (HTTP {})",
                status.as_u16()
            ))
        })
}

fn parse_order_status(
    status: StatusCode,
    body: &Value,
) -> Result<ProviderOrderStatus, ProviderError> {
    if let Some(message) = provider_error(body) {
        return Err(ProviderError::Business(message));
    }
    if !body.is_object() {
        return Err(ProviderError::Response(format!(
            "status response is not an object (HTTP {})",
            status.as_u16()
        )));
    }

    let raw_status = body.get("status").and_then(coerce::text);
    let start_count = body.get("start_count").and_then(coerce::integer);
    let remains = body.get("remains").and_then(coerce::integer);

    if raw_status.is_none() && start_count.is_none() && remains.is_none() {
        return Err(ProviderError::Response(format!(
            "status response has no status or counts (HTTP {})",
            status.as_u16()
        )));
    }

    Ok(ProviderOrderStatus {
        status: raw_status.as_deref().and_then(OrderStatus::from_provider),
        raw_status,
        start_count,
        remains,
    })
}

/// Map one catalog entry. Entries without a usable id are dropped.
fn external_service(item: &Value) -> Option<ExternalService> {
    let service = item.get("service").and_then(coerce::text)?;
    if service.is_empty() {
        return None;
    }

    let bound = |key: &str, default: i32| {
        item.get(key)
            .and_then(coerce::integer)
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or(default)
    };

    Some(ExternalService {
        name: item
            .get("name")
            .and_then(coerce::text)
            .unwrap_or_else(|| format!("Service {}", service)),
        category: item.get("category").and_then(coerce::text).unwrap_or_default(),
        rate: item
            .get("rate")
            .and_then(coerce::decimal)
            .unwrap_or(Decimal::ZERO),
        min: bound("min", DEFAULT_MIN_QUANTITY),
        max: bound("max", DEFAULT_MAX_QUANTITY),
        service_type: item.get("type").and_then(coerce::text),
        description: item.get("description").and_then(coerce::text),
        service,
    })
}

/// Permissive conversions for provider JSON values.
mod coerce {
    use super::*;

    pub fn text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn integer(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
            }
            _ => None,
        }
    }

    pub fn decimal(value: &Value) -> Option<Decimal> {
        let raw = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        };
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_numbers_and_strings() {
        assert_eq!(coerce::integer(&json!("40")), Some(40));
        assert_eq!(coerce::integer(&json!(" 40 ")), Some(40));
        assert_eq!(coerce::integer(&json!(40)), Some(40));
        assert_eq!(coerce::integer(&json!("40.0")), Some(40));
        assert_eq!(coerce::integer(&json!("n/a")), None);
        assert_eq!(coerce::integer(&json!(null)), None);

        assert_eq!(coerce::text(&json!(98765)), Some("98765".to_string()));
        assert_eq!(coerce::decimal(&json!("0.45")), Some(Decimal::new(45, 2)));
        assert_eq!(coerce::decimal(&json!(1.5)), Some(Decimal::new(15, 1)));
        assert_eq!(coerce::decimal(&json!("free")), None);
    }

    #[test]
    fn catalog_entry_defaults() {
        let item = external_service(&json!({
            "service": 7,
            "name": "YouTube Views",
            "rate": "abc"
        }))
        .unwrap();

        assert_eq!(item.service, "7");
        assert_eq!(item.rate, Decimal::ZERO);
        assert_eq!(item.min, 100);
        assert_eq!(item.max, 10_000);
        assert_eq!(item.category, "");
    }

    #[test]
    fn catalog_entry_without_id_is_dropped() {
        assert!(external_service(&json!({ "name": "Orphan" })).is_none());
        assert!(external_service(&json!({ "service": "" })).is_none());
    }

    #[test]
    fn error_object_is_business_failure_for_every_action() {
        let body = json!({ "error": "Incorrect request" });
        let expected = ProviderError::Business("Incorrect request".to_string());

        assert_eq!(parse_service_list(StatusCode::OK, &body), Err(expected.clone()));
        assert_eq!(parse_order_id(StatusCode::OK, &body), Err(expected.clone()));
        assert_eq!(parse_order_status(StatusCode::OK, &body), Err(expected));
    }

    #[test]
    fn order_id_from_order_or_id_field() {
        assert_eq!(
            parse_order_id(StatusCode::OK, &json!({ "order": 98765 })),
            Ok("98765".to_string())
        );
        assert_eq!(
            parse_order_id(StatusCode::OK, &json!({ "id": "abc-1" })),
            Ok("abc-1".to_string())
        );
        assert!(matches!(
            parse_order_id(StatusCode::OK, &json!({ "status": "ok" })),
            Err(ProviderError::Response(_))
        ));
    }

    #[test]
    fn status_with_unknown_word_keeps_counts() {
        let parsed = parse_order_status(
            StatusCode::OK,
            &json!({ "status": "Refilling", "start_count": "120", "remains": 0 }),
        )
        .unwrap();

        assert_eq!(parsed.status, None);
        assert_eq!(parsed.raw_status.as_deref(), Some("Refilling"));
        assert_eq!(parsed.start_count, Some(120));
        assert_eq!(parsed.remains, Some(0));
    }

    #[test]
    fn non_success_catalog_is_business_failure() {
        assert!(matches!(
            parse_service_list(StatusCode::FORBIDDEN, &json!({})),
            Err(ProviderError::Business(_))
        ));
        assert!(matches!(
            parse_service_list(StatusCode::OK, &json!({ "services": [] })),
            Err(ProviderError::Response(_))
        ));
    }
}
