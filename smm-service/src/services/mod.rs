pub mod database;
pub mod error;
pub mod forwarder;
pub mod importer;
pub mod memory;
pub mod metrics;
pub mod orders;
pub mod provider_client;
pub mod providers;
pub mod rate_sync;
pub mod reconciler;
pub mod scheduler;
pub mod store;
pub mod wallet;

pub use database::PgStore;
pub use error::FulfillmentError;
pub use forwarder::{ForwardOutcome, OrderForwarder};
pub use importer::{filter_catalog, price_service, ImportRequest, ImportSummary, ServiceImporter};
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use orders::{OrderDesk, PlaceOrder};
pub use provider_client::{ProviderApi, ProviderError, ProviderOrderStatus, SmmProviderClient};
pub use providers::ProviderRegistry;
pub use rate_sync::{RateSyncSummary, RateSynchronizer};
pub use reconciler::{ReconcileSummary, StatusReconciler};
pub use scheduler::{Scheduler, Sweep};
pub use store::Store;
pub use wallet::Wallet;
