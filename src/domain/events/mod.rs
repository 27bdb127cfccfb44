//! Domain events
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainEvent {
    Catalog(CatalogEvent),
    Order(OrderNotification),
}

impl DomainEvent {
    /// Dotted name, also used as the message subject suffix.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Catalog(CatalogEvent::SkuCreated { .. }) => "catalog.sku_created",
            Self::Catalog(CatalogEvent::SkusRepriced { .. }) => "catalog.skus_repriced",
            Self::Catalog(CatalogEvent::LowStock { .. }) => "catalog.low_stock",
            Self::Order(n) => n.event.kind(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    SkuCreated { sku_id: Uuid, code: String },
    SkusRepriced { category: String, tier: String, length_cm: u16, count: u64 },
    LowStock { sku_id: Uuid, code: String, stock: i32 },
}

/// Customer-facing order event addressed to the order's e-mail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderNotification {
    pub order_id: Uuid,
    pub order_number: String,
    pub recipient: String,
    pub event: OrderEvent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { total: Decimal, currency: String },
    PaymentReceived { total: Decimal, currency: String },
    Shipped { tracking_number: Option<String> },
    Delivered,
    Cancelled,
    Refunded { total: Decimal, currency: String },
    Returned,
    InvoiceIssued { invoice_number: String },
}

impl OrderEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "order.placed",
            Self::PaymentReceived { .. } => "order.payment_received",
            Self::Shipped { .. } => "order.shipped",
            Self::Delivered => "order.delivered",
            Self::Cancelled => "order.cancelled",
            Self::Refunded { .. } => "order.refunded",
            Self::Returned => "order.returned",
            Self::InvoiceIssued { .. } => "order.invoice_issued",
        }
    }
}
