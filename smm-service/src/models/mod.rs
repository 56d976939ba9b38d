//! Domain models for smm-service.

pub mod catalog;
pub mod order;
pub mod payment;
pub mod provider;

pub use catalog::{local_rate, ExternalService, NewService, Service, MULTIPLIER_SCALE, RATE_SCALE};
pub use order::{order_amount, NewOrder, Order, OrderProgress, OrderStatus};
pub use payment::{Payment, PaymentStatus};
pub use provider::{NewProvider, Provider, ProviderUpdate, ProviderView};
