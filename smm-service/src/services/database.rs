//! PostgreSQL implementation of [`Store`].

use crate::models::{
    NewOrder, NewProvider, NewService, Order, OrderProgress, OrderStatus, Payment, PaymentStatus,
    Provider, ProviderUpdate, Service,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Upper bound on rows per multi-row INSERT.
const INSERT_CHUNK: usize = 1000;

const PROVIDER_COLUMNS: &str = "p.id, p.name, p.base_url, c.api_key, p.active, p.created_at, p.updated_at";

const SERVICE_COLUMNS: &str = "id, name, description, sell_price_per_1000, original_rate, \
     rate_multiplier, min_quantity, max_quantity, category_id, provider_id, provider_service_id, \
     active, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, service_id, link, quantity, amount, status, \
     external_order_id, start_count, remains, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, user_id, amount, utr, status, created_at, updated_at";

// Row types keep statuses as text; conversion validates them.

#[derive(FromRow)]
struct ProviderRow {
    id: Uuid,
    name: String,
    base_url: String,
    api_key: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProviderRow> for Provider {
    fn from(row: ProviderRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            base_url: row.base_url,
            api_key: Secret::new(row.api_key),
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    service_id: Uuid,
    link: String,
    quantity: i32,
    amount: Decimal,
    status: String,
    external_order_id: Option<String>,
    start_count: Option<i64>,
    remains: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unknown order status '{}' on order {}",
                row.status,
                row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            service_id: row.service_id,
            link: row.link,
            quantity: row.quantity,
            amount: row.amount,
            status,
            external_order_id: row.external_order_id,
            start_count: row.start_count,
            remains: row.remains,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    utr: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = PaymentStatus::parse(&row.status).ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Unknown payment status '{}' on payment {}",
                row.status,
                row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            utr: row.utr,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "smm-service"))]
    pub async fn connect(
        database_url: &Secret<String>,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url.expose_secret())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Insert a category. Categories are otherwise managed outside this service.
    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to create category"))?;
        Ok(id)
    }

    /// Set a balance outright. Used to seed wallets.
    #[instrument(skip(self))]
    pub async fn set_balance(&self, user_id: Uuid, balance: Decimal) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, balance) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET balance = EXCLUDED.balance, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(balance)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to set balance"))?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("Health check failed"))?;

        timer.observe_duration();
        Ok(())
    }

    // =========================================================================
    // Providers
    // =========================================================================

    #[instrument(skip(self, new), fields(name = %new.name))]
    async fn create_provider(&self, new: NewProvider) -> Result<Provider, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_provider"])
            .start_timer();

        let id = Uuid::new_v4();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        sqlx::query("INSERT INTO providers (id, name, base_url) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&new.name)
            .bind(&new.base_url)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to create provider"))?;

        sqlx::query("INSERT INTO provider_credentials (provider_id, api_key) VALUES ($1, $2)")
            .bind(id)
            .bind(new.api_key.expose_secret())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to store provider credentials"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();
        info!(provider_id = %id, "Provider created");

        self.get_provider(id).await?.ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("Provider {} vanished after insert", id))
        })
    }

    #[instrument(skip(self))]
    async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_provider"])
            .start_timer();

        let row = sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {} FROM providers p JOIN provider_credentials c ON c.provider_id = p.id WHERE p.id = $1",
            PROVIDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get provider"))?;

        timer.observe_duration();
        Ok(row.map(Provider::from))
    }

    #[instrument(skip(self))]
    async fn list_providers(&self) -> Result<Vec<Provider>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_providers"])
            .start_timer();

        let rows = sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {} FROM providers p JOIN provider_credentials c ON c.provider_id = p.id ORDER BY p.created_at",
            PROVIDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list providers"))?;

        timer.observe_duration();
        Ok(rows.into_iter().map(Provider::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_active_providers(&self) -> Result<Vec<Provider>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_providers"])
            .start_timer();

        let rows = sqlx::query_as::<_, ProviderRow>(&format!(
            "SELECT {} FROM providers p JOIN provider_credentials c ON c.provider_id = p.id \
             WHERE p.active ORDER BY p.created_at",
            PROVIDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list active providers"))?;

        timer.observe_duration();
        Ok(rows.into_iter().map(Provider::from).collect())
    }

    #[instrument(skip(self, update))]
    async fn update_provider(
        &self,
        id: Uuid,
        update: ProviderUpdate,
    ) -> Result<Option<Provider>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_provider"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE providers
            SET name = COALESCE($2, name),
                base_url = COALESCE($3, base_url),
                active = COALESCE($4, active),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.name)
        .bind(update.base_url)
        .bind(update.active)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update provider"))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_provider(id).await
    }

    #[instrument(skip(self, api_key))]
    async fn rotate_provider_key(
        &self,
        id: Uuid,
        api_key: Secret<String>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["rotate_provider_key"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE provider_credentials SET api_key = $2, updated_at = now() WHERE provider_id = $1",
        )
        .bind(id)
        .bind(api_key.expose_secret())
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to rotate provider key"))?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    #[instrument(skip(self))]
    async fn category_exists(&self, id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check category"))?;
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_service"])
            .start_timer();

        let service = sqlx::query_as::<_, Service>(&format!(
            "SELECT {} FROM services WHERE id = $1",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get service"))?;

        timer.observe_duration();
        Ok(service)
    }

    #[instrument(skip(self))]
    async fn list_linked_services(&self, provider_id: Uuid) -> Result<Vec<Service>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_linked_services"])
            .start_timer();

        let services = sqlx::query_as::<_, Service>(&format!(
            "SELECT {} FROM services \
             WHERE provider_id = $1 AND provider_service_id IS NOT NULL \
             ORDER BY created_at",
            SERVICE_COLUMNS
        ))
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list linked services"))?;

        timer.observe_duration();
        Ok(services)
    }

    #[instrument(skip(self))]
    async fn update_original_rate(&self, service_id: Uuid, rate: Decimal) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_original_rate"])
            .start_timer();

        sqlx::query("UPDATE services SET original_rate = $2, updated_at = now() WHERE id = $1")
            .bind(service_id)
            .bind(rate)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to update original rate"))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, services), fields(count = services.len()))]
    async fn insert_services(&self, services: Vec<NewService>) -> Result<Vec<Service>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_services"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let mut inserted = Vec::with_capacity(services.len());
        for chunk in services.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO services (id, name, description, sell_price_per_1000, original_rate, \
                 rate_multiplier, min_quantity, max_quantity, category_id, provider_id, \
                 provider_service_id) ",
            );
            builder.push_values(chunk, |mut row, s| {
                row.push_bind(Uuid::new_v4())
                    .push_bind(s.name.clone())
                    .push_bind(s.description.clone())
                    .push_bind(s.sell_price_per_1000)
                    .push_bind(s.original_rate)
                    .push_bind(s.rate_multiplier)
                    .push_bind(s.min_quantity)
                    .push_bind(s.max_quantity)
                    .push_bind(s.category_id)
                    .push_bind(s.provider_id)
                    .push_bind(s.provider_service_id.clone());
            });
            builder.push(" RETURNING ");
            builder.push(SERVICE_COLUMNS);

            let rows = builder
                .build_query_as::<Service>()
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error("Failed to insert services"))?;
            inserted.extend(rows);
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();
        info!(count = inserted.len(), "Services inserted");
        Ok(inserted)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    #[instrument(skip(self, new), fields(user_id = %new.user_id, amount = %new.amount))]
    async fn create_order_debiting_balance(
        &self,
        new: NewOrder,
    ) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_order"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let debited = sqlx::query(
            r#"
            UPDATE profiles
            SET balance = balance - $2, updated_at = now()
            WHERE user_id = $1 AND balance >= $2
            "#,
        )
        .bind(new.user_id)
        .bind(new.amount)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to debit balance"))?;

        if debited.rows_affected() == 0 {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (id, user_id, service_id, link, quantity, amount) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.service_id)
        .bind(&new.link)
        .bind(new.quantity)
        .bind(new.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to create order"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();
        let order = Order::try_from(row)?;
        info!(order_id = %order.id, "Order created");
        Ok(Some(order))
    }

    #[instrument(skip(self))]
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_order"])
            .start_timer();

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get order"))?;

        timer.observe_duration();
        row.map(Order::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_open_forwarded_orders(&self) -> Result<Vec<Order>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_open_forwarded_orders"])
            .start_timer();

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders \
             WHERE external_order_id IS NOT NULL AND status IN ('pending', 'processing') \
             ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list open orders"))?;

        timer.observe_duration();
        rows.into_iter().map(Order::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn record_forwarded(
        &self,
        order_id: Uuid,
        external_order_id: &str,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_forwarded"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET external_order_id = $2, status = 'processing', updated_at = now()
            WHERE id = $1 AND status = 'pending' AND external_order_id IS NULL
            "#,
        )
        .bind(order_id)
        .bind(external_order_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record forwarded order"))?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn cancel_pending_order(&self, order_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_pending_order"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE orders SET status = 'cancelled', updated_at = now() WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to cancel order"))?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn apply_progress(
        &self,
        order_id: Uuid,
        progress: &OrderProgress,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_progress"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = CASE
                    WHEN $2::text IS NOT NULL AND status IN ('pending', 'processing') THEN $2::text
                    ELSE status
                END,
                start_count = COALESCE($3, start_count),
                remains = COALESCE($4, remains),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(progress.status.map(|s| s.as_str()))
        .bind(progress.start_count)
        .bind(progress.remains)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update order progress"))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Order {} not found", order_id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_order_status"])
            .start_timer();

        let result =
            sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
                .bind(order_id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to set order status"))?;

        timer.observe_duration();
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Wallet
    // =========================================================================

    #[instrument(skip(self))]
    async fn get_balance(&self, user_id: Uuid) -> Result<Decimal, AppError> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get balance"))?;

        Ok(balance.unwrap_or_default())
    }

    #[instrument(skip(self, utr))]
    async fn create_payment(
        &self,
        user_id: Uuid,
        amount: Decimal,
        utr: &str,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_payment"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO payments (id, user_id, amount, utr) VALUES ($1, $2, $3, $4) RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(amount)
        .bind(utr)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        timer.observe_duration();
        Payment::try_from(row)
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to get payment"))?;

        row.map(Payment::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn approve_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["approve_payment"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE payments SET status = 'approved', updated_at = now() \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to approve payment"))?;

        let Some(row) = row else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, balance) VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET balance = profiles.balance + EXCLUDED.balance, updated_at = now()
            "#,
        )
        .bind(row.user_id)
        .bind(row.amount)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to credit balance"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;

        timer.observe_duration();
        Payment::try_from(row).map(Some)
    }

    #[instrument(skip(self))]
    async fn reject_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reject_payment"])
            .start_timer();

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "UPDATE payments SET status = 'rejected', updated_at = now() \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to reject payment"))?;

        timer.observe_duration();
        row.map(Payment::try_from).transpose()
    }
}
