use serde::Serialize;
use uuid::Uuid;

use super::Services;
use crate::domain::aggregates::{Invoice, Order, OrderPatch, OrderStatus, StatusChange};
use crate::domain::events::{CatalogEvent, DomainEvent, OrderEvent, OrderNotification};
use crate::domain::ports::AppliedMovement;
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct OrderUpdateOutcome {
    pub order: Order,
    pub invoice: Option<Invoice>,
    pub stock_movements: Vec<MovementView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MovementView { pub sku_id: Uuid, pub sku_code: String, pub delta: i32, pub stock_after: i32, pub shortfall: i32, pub reason: &'static str }

impl From<&AppliedMovement> for MovementView {
    fn from(a: &AppliedMovement) -> Self {
        Self {
            sku_id: a.movement.sku_id, sku_code: a.movement.sku_code.clone(), delta: a.movement.delta,
            stock_after: a.change.after, shortfall: a.change.shortfall, reason: a.movement.reason.as_str(),
        }
    }
}

impl Services {
    pub async fn get_order(&self, id: Uuid) -> Result<Order> {
        self.store.get_order(id).await?.ok_or(EcommerceError::NotFound("order"))
    }

    pub async fn list_orders(&self, status: Option<OrderStatus>, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)> {
        self.store.list_orders(status, page.max(1), per_page.clamp(1, 100)).await
    }

    pub async fn order_history(&self, id: Uuid) -> Result<Vec<StatusChange>> {
        self.get_order(id).await?;
        self.store.order_history(id).await
    }

    pub async fn order_invoice(&self, id: Uuid) -> Result<Invoice> {
        self.store.get_invoice(id).await?.ok_or(EcommerceError::NotFound("invoice"))
    }

    /// Admin status change. Statuses, stock and history are committed
    /// together; invoice and customer notifications follow and never fail the
    /// update.
    pub async fn update_order(&self, id: Uuid, patch: OrderPatch) -> Result<OrderUpdateOutcome> {
        let current = self.get_order(id).await?;
        let transition = current.plan_update(&patch)?;
        if transition.is_noop() {
            return Ok(OrderUpdateOutcome { order: current, invoice: None, stock_movements: vec![] });
        }

        let applied = self.store.commit_transition(&transition).await?;
        let mut order = transition.order.clone();
        tracing::info!(
            order = %order.order_number,
            status = %order.status, payment = %order.payment_status, delivery = %order.delivery_status,
            version = order.version, "order updated"
        );

        for a in &applied {
            if a.change.shortfall > 0 {
                tracing::warn!(order = %order.order_number, sku = %a.movement.sku_code, shortfall = a.change.shortfall, "stock went short, floored at zero");
            }
            tracing::info!(sku = %a.movement.sku_code, delta = a.movement.delta, stock = a.change.after, reason = a.movement.reason.as_str(), "stock moved");
            if a.movement.delta < 0 && a.change.after <= self.config.low_stock_threshold {
                self.publish(DomainEvent::Catalog(CatalogEvent::LowStock {
                    sku_id: a.movement.sku_id, code: a.movement.sku_code.clone(), stock: a.change.after,
                })).await;
            }
        }

        let mut invoice = None;
        if transition.issue_invoice {
            match self.store.issue_invoice(id, &self.config.invoice_prefix).await {
                Ok(inv) => {
                    tracing::info!(order = %order.order_number, invoice = %inv.number, "invoice issued");
                    order.invoice_number = Some(inv.number.clone());
                    self.publish(DomainEvent::Order(OrderNotification {
                        order_id: order.id, order_number: order.order_number.clone(), recipient: order.customer_email.clone(),
                        event: OrderEvent::InvoiceIssued { invoice_number: inv.number.clone() },
                    })).await;
                    invoice = Some(inv);
                }
                Err(e) => tracing::warn!(order = %order.order_number, error = %e, "invoice generation failed"),
            }
        }

        for notification in transition.notifications {
            self.publish(DomainEvent::Order(notification)).await;
        }

        Ok(OrderUpdateOutcome { order, invoice, stock_movements: applied.iter().map(MovementView::from).collect() })
    }
}
