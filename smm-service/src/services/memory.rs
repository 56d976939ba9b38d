//! In-memory [`Store`] used by tests and `STORE_BACKEND=memory` runs.

use crate::models::{
    NewOrder, NewProvider, NewService, Order, OrderProgress, OrderStatus, Payment, PaymentStatus,
    Provider, ProviderUpdate, Service,
};
use crate::services::store::Store;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::error::AppError;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct State {
    providers: HashMap<Uuid, Provider>,
    categories: HashSet<Uuid>,
    services: HashMap<Uuid, Service>,
    orders: HashMap<Uuid, Order>,
    balances: HashMap<Uuid, Decimal>,
    payments: HashMap<Uuid, Payment>,
    writes: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::DatabaseError(anyhow::anyhow!("memory store lock poisoned")))
    }

    /// Number of mutating operations applied so far.
    pub fn writes(&self) -> u64 {
        self.lock().map(|s| s.writes).unwrap_or_default()
    }

    pub fn add_category(&self) -> Uuid {
        let id = Uuid::new_v4();
        if let Ok(mut state) = self.lock() {
            state.categories.insert(id);
        }
        id
    }

    pub fn set_balance(&self, user_id: Uuid, balance: Decimal) {
        if let Ok(mut state) = self.lock() {
            state.balances.insert(user_id, balance);
        }
    }

    pub fn order_count(&self) -> usize {
        self.lock().map(|s| s.orders.len()).unwrap_or_default()
    }

    pub fn service_count(&self) -> usize {
        self.lock().map(|s| s.services.len()).unwrap_or_default()
    }

    /// Overwrite an order directly, bypassing the forwarding guards.
    pub fn put_order(&self, order: Order) {
        if let Ok(mut state) = self.lock() {
            state.orders.insert(order.id, order);
        }
    }
}

fn build_service(new: NewService) -> Service {
    let now = Utc::now();
    Service {
        id: Uuid::new_v4(),
        name: new.name,
        description: new.description,
        sell_price_per_1000: new.sell_price_per_1000,
        original_rate: new.original_rate,
        rate_multiplier: new.rate_multiplier,
        min_quantity: new.min_quantity,
        max_quantity: new.max_quantity,
        category_id: new.category_id,
        provider_id: new.provider_id,
        provider_service_id: new.provider_service_id,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn create_provider(&self, new: NewProvider) -> Result<Provider, AppError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let provider = Provider {
            id: Uuid::new_v4(),
            name: new.name,
            base_url: new.base_url,
            api_key: new.api_key,
            active: true,
            created_at: now,
            updated_at: now,
        };
        state.providers.insert(provider.id, provider.clone());
        state.writes += 1;
        Ok(provider)
    }

    async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>, AppError> {
        Ok(self.lock()?.providers.get(&id).cloned())
    }

    async fn list_providers(&self) -> Result<Vec<Provider>, AppError> {
        let mut providers: Vec<Provider> = self.lock()?.providers.values().cloned().collect();
        providers.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(providers)
    }

    async fn list_active_providers(&self) -> Result<Vec<Provider>, AppError> {
        let mut providers = self.list_providers().await?;
        providers.retain(|p| p.active);
        Ok(providers)
    }

    async fn update_provider(
        &self,
        id: Uuid,
        update: ProviderUpdate,
    ) -> Result<Option<Provider>, AppError> {
        let mut state = self.lock()?;
        let Some(provider) = state.providers.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            provider.name = name;
        }
        if let Some(base_url) = update.base_url {
            provider.base_url = base_url;
        }
        if let Some(active) = update.active {
            provider.active = active;
        }
        provider.updated_at = Utc::now();
        let updated = provider.clone();
        state.writes += 1;
        Ok(Some(updated))
    }

    async fn rotate_provider_key(
        &self,
        id: Uuid,
        api_key: Secret<String>,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        let Some(provider) = state.providers.get_mut(&id) else {
            return Ok(false);
        };
        provider.api_key = api_key;
        provider.updated_at = Utc::now();
        state.writes += 1;
        Ok(true)
    }

    async fn category_exists(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.categories.contains(&id))
    }

    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        Ok(self.lock()?.services.get(&id).cloned())
    }

    async fn list_linked_services(&self, provider_id: Uuid) -> Result<Vec<Service>, AppError> {
        let state = self.lock()?;
        let mut services: Vec<Service> = state
            .services
            .values()
            .filter(|s| matches!(s.provider_link(), Some((id, _)) if id == provider_id))
            .cloned()
            .collect();
        services.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(services)
    }

    async fn update_original_rate(&self, service_id: Uuid, rate: Decimal) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if let Some(service) = state.services.get_mut(&service_id) {
            service.original_rate = Some(rate);
            service.updated_at = Utc::now();
            state.writes += 1;
        }
        Ok(())
    }

    async fn insert_services(&self, services: Vec<NewService>) -> Result<Vec<Service>, AppError> {
        let mut state = self.lock()?;
        if let Some(missing) = services
            .iter()
            .find(|s| !state.categories.contains(&s.category_id))
        {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "category {} does not exist",
                missing.category_id
            )));
        }
        if services.iter().any(|s| s.min_quantity > s.max_quantity) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "min_quantity exceeds max_quantity"
            )));
        }

        let inserted: Vec<Service> = services.into_iter().map(build_service).collect();
        for service in &inserted {
            state.services.insert(service.id, service.clone());
        }
        state.writes += 1;
        Ok(inserted)
    }

    async fn create_order_debiting_balance(
        &self,
        new: NewOrder,
    ) -> Result<Option<Order>, AppError> {
        let mut state = self.lock()?;
        let balance = state.balances.get(&new.user_id).copied().unwrap_or_default();
        if balance < new.amount {
            return Ok(None);
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            service_id: new.service_id,
            link: new.link,
            quantity: new.quantity,
            amount: new.amount,
            status: OrderStatus::Pending,
            external_order_id: None,
            start_count: None,
            remains: None,
            created_at: now,
            updated_at: now,
        };
        state.balances.insert(new.user_id, balance - new.amount);
        state.orders.insert(order.id, order.clone());
        state.writes += 1;
        Ok(Some(order))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.lock()?.orders.get(&id).cloned())
    }

    async fn list_open_forwarded_orders(&self) -> Result<Vec<Order>, AppError> {
        let state = self.lock()?;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.external_order_id.is_some() && o.status.is_open())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn record_forwarded(
        &self,
        order_id: Uuid,
        external_order_id: &str,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        let Some(order) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if !order.is_forwardable() {
            return Ok(false);
        }
        order.external_order_id = Some(external_order_id.to_string());
        order.status = OrderStatus::Processing;
        order.updated_at = Utc::now();
        state.writes += 1;
        Ok(true)
    }

    async fn cancel_pending_order(&self, order_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        let Some(order) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        if order.status != OrderStatus::Pending {
            return Ok(false);
        }
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        state.writes += 1;
        Ok(true)
    }

    async fn apply_progress(
        &self,
        order_id: Uuid,
        progress: &OrderProgress,
    ) -> Result<(), AppError> {
        let mut state = self.lock()?;
        let Some(order) = state.orders.get_mut(&order_id) else {
            return Err(AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)));
        };
        if let Some(status) = progress.status.filter(|_| order.status.is_open()) {
            order.status = status;
        }
        if let Some(start_count) = progress.start_count {
            order.start_count = Some(start_count);
        }
        if let Some(remains) = progress.remains {
            order.remains = Some(remains);
        }
        order.updated_at = Utc::now();
        state.writes += 1;
        Ok(())
    }

    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        let Some(order) = state.orders.get_mut(&order_id) else {
            return Ok(false);
        };
        order.status = status;
        order.updated_at = Utc::now();
        state.writes += 1;
        Ok(true)
    }

    async fn get_balance(&self, user_id: Uuid) -> Result<Decimal, AppError> {
        Ok(self
            .lock()?
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn create_payment(
        &self,
        user_id: Uuid,
        amount: Decimal,
        utr: &str,
    ) -> Result<Payment, AppError> {
        let mut state = self.lock()?;
        if state.payments.values().any(|p| p.utr == utr) {
            return Err(AppError::Conflict(anyhow::anyhow!("Duplicate record")));
        }
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id,
            amount,
            utr: utr.to_string(),
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.payments.insert(payment.id, payment.clone());
        state.writes += 1;
        Ok(payment)
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self.lock()?.payments.get(&id).cloned())
    }

    async fn approve_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let mut state = self.lock()?;
        let Some(payment) = state.payments.get_mut(&id) else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }
        payment.status = PaymentStatus::Approved;
        payment.updated_at = Utc::now();
        let approved = payment.clone();

        *state.balances.entry(approved.user_id).or_default() += approved.amount;
        state.writes += 1;
        Ok(Some(approved))
    }

    async fn reject_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let mut state = self.lock()?;
        let Some(payment) = state.payments.get_mut(&id) else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }
        payment.status = PaymentStatus::Rejected;
        payment.updated_at = Utc::now();
        let rejected = payment.clone();
        state.writes += 1;
        Ok(Some(rejected))
    }
}
