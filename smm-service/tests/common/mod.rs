//! Common test utilities for smm-service integration tests.

#![allow(dead_code)]

use rust_decimal::Decimal;
use secrecy::Secret;
use smm_service::models::{NewProvider, NewService, Order, Provider, Service};
use smm_service::services::{
    MemoryStore, OrderDesk, OrderForwarder, PlaceOrder, ProviderApi, SmmProviderClient, Store,
};
use std::str::FromStr;
use std::sync::{Arc, Once};
use std::time::Duration;
use uuid::Uuid;
use wiremock::MockServer;

static INIT: Once = Once::new();

pub const API_KEY: &str = "sk-live-7c1d2e3f4a5b";

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,smm_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// In-memory store plus one stub provider served by wiremock.
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub server: MockServer,
    pub client: Arc<SmmProviderClient>,
    pub provider: Provider,
    pub category_id: Uuid,
}

impl TestEnv {
    pub async fn new() -> Self {
        init_tracing();

        let store = Arc::new(MemoryStore::new());
        let server = MockServer::start().await;
        let client = Arc::new(
            SmmProviderClient::new(Duration::from_millis(500)).expect("client builds"),
        );

        let provider = store
            .create_provider(NewProvider {
                name: "Stub Provider".to_string(),
                base_url: format!("{}/api/v2", server.uri()),
                api_key: Secret::new(API_KEY.to_string()),
            })
            .await
            .unwrap();
        let category_id = store.add_category();

        Self {
            store,
            server,
            client,
            provider,
            category_id,
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    pub fn providers(&self) -> Arc<dyn ProviderApi> {
        self.client.clone()
    }

    pub fn forwarder(&self) -> OrderForwarder {
        OrderForwarder::new(self.store(), self.providers())
    }

    /// Register another provider pointing at the same stub server.
    pub async fn add_provider(&self, name: &str) -> Provider {
        self.store
            .create_provider(NewProvider {
                name: name.to_string(),
                base_url: format!("{}/api/v2", self.server.uri()),
                api_key: Secret::new(format!("{}-key-0001", name)),
            })
            .await
            .unwrap()
    }

    /// A service linked to `provider_id` under `external_id`.
    pub async fn linked_service(
        &self,
        provider_id: Uuid,
        external_id: &str,
        original_rate: Option<Decimal>,
    ) -> Service {
        self.insert_service(Some((provider_id, external_id)), original_rate)
            .await
    }

    pub async fn unlinked_service(&self) -> Service {
        self.insert_service(None, None).await
    }

    async fn insert_service(
        &self,
        link: Option<(Uuid, &str)>,
        original_rate: Option<Decimal>,
    ) -> Service {
        self.store
            .insert_services(vec![NewService {
                name: "Instagram Followers".to_string(),
                description: None,
                sell_price_per_1000: dec("12.50"),
                original_rate,
                rate_multiplier: Decimal::ONE,
                min_quantity: 100,
                max_quantity: 10_000,
                category_id: self.category_id,
                provider_id: link.map(|(id, _)| id),
                provider_service_id: link.map(|(_, ext)| ext.to_string()),
            }])
            .await
            .unwrap()
            .remove(0)
    }

    /// Fund a fresh user and place a 1000-unit order on `service`.
    pub async fn place_order(&self, service: &Service) -> Order {
        let user_id = Uuid::new_v4();
        self.store.set_balance(user_id, dec("100.00"));

        OrderDesk::new(self.store())
            .place(PlaceOrder {
                user_id,
                service_id: service.id,
                link: "https://instagram.com/p/abc123".to_string(),
                quantity: 1000,
            })
            .await
            .unwrap()
    }

    /// An order already forwarded under `external_id`, in `processing`.
    pub async fn forwarded_order(&self, service: &Service, external_id: &str) -> Order {
        let order = self.place_order(service).await;
        assert!(self
            .store
            .record_forwarded(order.id, external_id)
            .await
            .unwrap());
        self.store.get_order(order.id).await.unwrap().unwrap()
    }

    pub async fn order(&self, id: Uuid) -> Order {
        self.store.get_order(id).await.unwrap().unwrap()
    }

    /// Requests received by the stub server, as raw query strings.
    pub async fn received_queries(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.query().unwrap_or_default().to_string())
            .collect()
    }
}
