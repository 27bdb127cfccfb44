use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::events::DomainEvent;
use crate::domain::ports::Notifier;
use crate::{EcommerceError, Result};

/// Writes every event to the log.
#[derive(Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let payload = serde_json::to_string(event).map_err(|e| EcommerceError::StorageError(e.to_string()))?;
        tracing::info!(kind = event.kind(), %payload, "event");
        Ok(())
    }
}

/// Publishes events as JSON on `hairstore.notifications.<kind>` for the mailer to pick up.
#[derive(Clone)]
pub struct NatsNotifier {
    client: async_nats::Client,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let payload = serde_json::to_vec(event).map_err(|e| EcommerceError::StorageError(e.to_string()))?;
        self.client
            .publish(format!("hairstore.notifications.{}", event.kind()), payload.into())
            .await
            .map_err(|e| EcommerceError::StorageError(format!("nats publish: {e}")))
    }
}

/// Sends to every inner notifier; the first error is returned after all have run.
#[derive(Clone, Default)]
pub struct FanoutNotifier {
    inner: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(inner: Vec<Arc<dyn Notifier>>) -> Self { Self { inner } }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let mut first_err = None;
        for n in &self.inner {
            if let Err(e) = n.publish(event).await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Keeps published events in memory, for tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self { Self::default() }
    pub async fn events(&self) -> Vec<DomainEvent> { self.events.lock().await.clone() }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderEvent;
    use crate::domain::events::OrderNotification;
    use uuid::Uuid;

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn publish(&self, _event: &DomainEvent) -> Result<()> {
            Err(EcommerceError::StorageError("smtp down".into()))
        }
    }

    #[tokio::test]
    async fn test_fanout_delivers_despite_failure() {
        let memory = MemoryNotifier::new();
        let fanout = FanoutNotifier::new(vec![Arc::new(Failing), Arc::new(memory.clone())]);
        let event = DomainEvent::Order(OrderNotification {
            order_id: Uuid::now_v7(), order_number: "HS-000001".into(), recipient: "a@b.cz".into(), event: OrderEvent::Delivered,
        });
        assert!(fanout.publish(&event).await.is_err());
        assert_eq!(memory.events().await, vec![event]);
    }
}
