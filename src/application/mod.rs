//! Use cases. Each sequences store calls around the domain rules and
//! publishes events; request handlers call into these and nothing else.

mod catalog;
mod checkout;
mod orders;
mod rates;

pub use catalog::MatrixUpsert;
pub use rates::RateUpdate;
pub use checkout::{CheckoutItem, CheckoutRequest};
pub use orders::OrderUpdateOutcome;

use std::sync::Arc;

use crate::config::Config;
use crate::domain::events::DomainEvent;
use crate::domain::ports::{Notifier, Store};

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<Config>,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: Config) -> Self {
        Self { store, notifier, config: Arc::new(config) }
    }

    /// Best effort: a failed publish is logged and swallowed.
    pub(crate) async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.notifier.publish(&event).await {
            tracing::warn!(kind = event.kind(), error = %e, "failed to publish event");
        }
    }
}
