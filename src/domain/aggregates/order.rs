//! Order Aggregate
//!
//! Orders move along three status axes: the order itself, payment and
//! delivery. [`Order::plan_update`] checks a requested change against the
//! allowed transitions and works out what else has to happen with it: stock
//! taken or put back, an invoice issued, customers notified. It does not touch
//! storage; the store applies the resulting [`OrderTransition`] atomically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::sku::Sku;
use crate::domain::events::{OrderEvent, OrderNotification};
use crate::domain::value_objects::{round_money, SaleMode, MAX_AMOUNT, MAX_QUANTITY};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub customer_name: String,
    pub phone: Option<String>,
    pub shipping_address: serde_json::Value,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub coupon_code: Option<String>,
    pub tracking_number: Option<String>,
    pub admin_note: Option<String>,
    /// Whether item quantities are currently taken out of SKU stock.
    pub stock_deducted: bool,
    pub invoice_number: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub sku_id: Uuid,
    pub sku_code: String,
    pub name: String,
    pub sale_mode: SaleMode,
    /// Grams for `BULK_G`, pieces for `PIECE_BY_WEIGHT`.
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl OrderItem {
    pub fn for_sku(sku: &Sku, quantity: u32) -> Result<Self, OrderError> {
        if quantity == 0 || quantity > MAX_QUANTITY { return Err(OrderError::InvalidQuantity); }
        let quantity_i32 = i32::try_from(quantity).map_err(|_| OrderError::InvalidQuantity)?;
        let total = sku.unit_price_for(quantity).ok_or(OrderError::AmountTooLarge)?;
        Ok(Self {
            id: Uuid::now_v7(), sku_id: sku.id, sku_code: sku.code.clone(), name: sku.name.clone(),
            sale_mode: sku.sale_mode, quantity: quantity_i32, unit_price: sku.price, total,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Open, Completed, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus { #[default] Pending, Processing, Shipped, Delivered, Returned }

macro_rules! status_strings {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str { match self { $(Self::$variant => $s),+ } }
            pub fn parse(s: &str) -> Option<Self> { match s.trim().to_lowercase().as_str() { $($s => Some(Self::$variant),)+ _ => None } }
        }
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
        }
    };
}

status_strings!(OrderStatus { Open => "open", Completed => "completed", Cancelled => "cancelled" });
status_strings!(PaymentStatus { Pending => "pending", Paid => "paid", Failed => "failed", Refunded => "refunded" });
status_strings!(DeliveryStatus { Pending => "pending", Processing => "processing", Shipped => "shipped", Delivered => "delivered", Returned => "returned" });

impl PaymentStatus {
    pub fn can_move_to(self, next: Self) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Pending, Paid) | (Pending, Failed) | (Failed, Pending) | (Failed, Paid) | (Paid, Refunded))
    }
}

impl DeliveryStatus {
    pub fn can_move_to(self, next: Self) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Shipped) | (Processing, Shipped) | (Shipped, Delivered) | (Shipped, Returned) | (Delivered, Returned)
        )
    }
}

/// Requested admin change. Absent fields are left alone.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
    pub tracking_number: Option<String>,
    pub admin_note: Option<String>,
    /// Free-text reason stored with the history entries.
    pub note: Option<String>,
    pub changed_by: Option<String>,
    pub expected_version: Option<i32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryField { Status, Payment, Delivery, TrackingNumber }

impl HistoryField {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Status => "status", Self::Payment => "payment", Self::Delivery => "delivery", Self::TrackingNumber => "tracking_number" }
    }
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "status" => Some(Self::Status),
            "payment" => Some(Self::Payment),
            "delivery" => Some(Self::Delivery),
            "tracking_number" => Some(Self::TrackingNumber),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: Uuid,
    pub order_id: Uuid,
    pub field: HistoryField,
    pub from: Option<String>,
    pub to: Option<String>,
    pub note: Option<String>,
    pub changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason { OrderPaid, OrderCancelled, OrderRefunded, OrderReturned }

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPaid => "order_paid",
            Self::OrderCancelled => "order_cancelled",
            Self::OrderRefunded => "order_refunded",
            Self::OrderReturned => "order_returned",
        }
    }
}

/// Stock change for one SKU. Negative `delta` takes stock out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement { pub sku_id: Uuid, pub sku_code: String, pub delta: i32, pub reason: MovementReason }

/// Everything one admin update does, computed up front.
#[derive(Clone, Debug)]
pub struct OrderTransition {
    pub order: Order,
    pub expected_version: i32,
    pub stock_movements: Vec<StockMovement>,
    pub history: Vec<StatusChange>,
    pub issue_invoice: bool,
    pub notifications: Vec<OrderNotification>,
}

impl OrderTransition {
    pub fn is_noop(&self) -> bool { self.order.version == self.expected_version }
}

/// Customer and money inputs for a new order.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub customer_email: String,
    pub customer_name: String,
    pub phone: Option<String>,
    pub shipping_address: serde_json::Value,
    pub items: Vec<OrderItem>,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub coupon_code: Option<String>,
    pub currency: String,
}

impl OrderDraft {
    pub fn subtotal(&self) -> Result<Decimal, OrderError> {
        self.items.iter()
            .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.total))
            .map(round_money)
            .ok_or(OrderError::AmountTooLarge)
    }
}

/// `HS-000042`
pub fn order_number(seq: u64) -> String { format!("HS-{seq:06}") }

impl Order {
    pub fn place(order_number: impl Into<String>, draft: OrderDraft) -> Result<Self, OrderError> {
        if draft.items.is_empty() { return Err(OrderError::NoItems); }
        if draft.shipping < Decimal::ZERO || draft.discount < Decimal::ZERO { return Err(OrderError::NegativeAmount); }
        if draft.shipping > MAX_AMOUNT { return Err(OrderError::AmountTooLarge); }
        let subtotal = draft.subtotal()?;
        let discount = draft.discount.min(subtotal);
        let total = (subtotal - discount).checked_add(draft.shipping).ok_or(OrderError::AmountTooLarge)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), order_number: order_number.into(), customer_email: draft.customer_email.trim().to_lowercase(),
            customer_name: draft.customer_name, phone: draft.phone, shipping_address: draft.shipping_address,
            status: OrderStatus::Open, payment_status: PaymentStatus::Pending, delivery_status: DeliveryStatus::Pending,
            items: draft.items, subtotal, discount, shipping: draft.shipping,
            total: round_money(total), currency: draft.currency.to_uppercase(),
            coupon_code: draft.coupon_code, tracking_number: None, admin_note: None, stock_deducted: false,
            invoice_number: None, version: 1, created_at: now, updated_at: now,
        })
    }

    /// Validates `patch` and computes the resulting order together with its side effects.
    pub fn plan_update(&self, patch: &OrderPatch) -> Result<OrderTransition, OrderError> {
        if let Some(v) = patch.expected_version {
            if v != self.version { return Err(OrderError::StaleVersion { expected: v, actual: self.version }); }
        }
        let mut next = self.clone();
        let cancelled = self.status == OrderStatus::Cancelled;

        if let Some(p) = patch.payment_status.filter(|p| *p != self.payment_status) {
            if !self.payment_status.can_move_to(p) {
                return Err(OrderError::InvalidTransition { field: HistoryField::Payment, from: self.payment_status.as_str(), to: p.as_str() });
            }
            if cancelled && p != PaymentStatus::Refunded { return Err(OrderError::Closed(self.status)); }
            next.payment_status = p;
        }

        if let Some(d) = patch.delivery_status.filter(|d| *d != self.delivery_status) {
            if !self.delivery_status.can_move_to(d) {
                return Err(OrderError::InvalidTransition { field: HistoryField::Delivery, from: self.delivery_status.as_str(), to: d.as_str() });
            }
            if cancelled { return Err(OrderError::Closed(self.status)); }
            next.delivery_status = d;
        }

        if let Some(s) = patch.status.filter(|s| *s != self.status) {
            match (self.status, s) {
                (OrderStatus::Open, OrderStatus::Cancelled) if next.delivery_status == DeliveryStatus::Delivered => {
                    return Err(OrderError::CannotCancelDelivered);
                }
                (OrderStatus::Open, OrderStatus::Cancelled) => {}
                (OrderStatus::Open, OrderStatus::Completed) if !next.is_fulfilled() => return Err(OrderError::NotFulfilled),
                (OrderStatus::Open, OrderStatus::Completed) => {}
                (from, to) => {
                    return Err(OrderError::InvalidTransition { field: HistoryField::Status, from: from.as_str(), to: to.as_str() });
                }
            }
            next.status = s;
        }

        if next.status == OrderStatus::Open && next.is_fulfilled() {
            next.status = OrderStatus::Completed;
        }

        if let Some(t) = &patch.tracking_number {
            let t = t.trim();
            next.tracking_number = if t.is_empty() { None } else { Some(t.to_string()) };
        }
        if let Some(n) = &patch.admin_note {
            next.admin_note = Some(n.clone()).filter(|n| !n.trim().is_empty());
        }

        let becomes_paid = self.payment_status != PaymentStatus::Paid && next.payment_status == PaymentStatus::Paid;
        if becomes_paid && next.status == OrderStatus::Cancelled {
            return Err(OrderError::Closed(OrderStatus::Cancelled));
        }
        let release = if next.status == OrderStatus::Cancelled && !cancelled {
            Some(MovementReason::OrderCancelled)
        } else if next.delivery_status == DeliveryStatus::Returned && self.delivery_status != DeliveryStatus::Returned {
            Some(MovementReason::OrderReturned)
        } else if next.payment_status == PaymentStatus::Refunded && self.payment_status != PaymentStatus::Refunded {
            Some(MovementReason::OrderRefunded)
        } else {
            None
        };

        let mut stock_movements = Vec::new();
        match release {
            Some(reason) if self.stock_deducted => {
                stock_movements = self.movements(1, reason);
                next.stock_deducted = false;
            }
            Some(_) => {}
            None if becomes_paid && !self.stock_deducted => {
                stock_movements = self.movements(-1, MovementReason::OrderPaid);
                next.stock_deducted = true;
            }
            None => {}
        }

        let now = Utc::now();
        let mut history = Vec::new();
        let mut record = |field: HistoryField, from: Option<&str>, to: Option<&str>| {
            history.push(StatusChange {
                id: Uuid::now_v7(), order_id: self.id, field,
                from: from.map(str::to_string), to: to.map(str::to_string),
                note: patch.note.clone(), changed_by: patch.changed_by.clone(), created_at: now,
            });
        };
        if next.status != self.status { record(HistoryField::Status, Some(self.status.as_str()), Some(next.status.as_str())); }
        if next.payment_status != self.payment_status { record(HistoryField::Payment, Some(self.payment_status.as_str()), Some(next.payment_status.as_str())); }
        if next.delivery_status != self.delivery_status { record(HistoryField::Delivery, Some(self.delivery_status.as_str()), Some(next.delivery_status.as_str())); }
        if next.tracking_number != self.tracking_number { record(HistoryField::TrackingNumber, self.tracking_number.as_deref(), next.tracking_number.as_deref()); }

        let notifications = self.notifications_for(&next);
        let issue_invoice = becomes_paid && self.invoice_number.is_none();

        let changed = !history.is_empty() || next.admin_note != self.admin_note;
        if changed {
            next.version = self.version + 1;
            next.updated_at = now;
        }

        Ok(OrderTransition { order: next, expected_version: self.version, stock_movements, history, issue_invoice, notifications })
    }

    fn is_fulfilled(&self) -> bool {
        self.payment_status == PaymentStatus::Paid && self.delivery_status == DeliveryStatus::Delivered
    }

    fn movements(&self, sign: i32, reason: MovementReason) -> Vec<StockMovement> {
        self.items.iter()
            .map(|i| StockMovement { sku_id: i.sku_id, sku_code: i.sku_code.clone(), delta: sign * i.quantity, reason })
            .collect()
    }

    fn notifications_for(&self, next: &Order) -> Vec<OrderNotification> {
        let mut events = Vec::new();
        if next.payment_status != self.payment_status {
            match next.payment_status {
                PaymentStatus::Paid => events.push(OrderEvent::PaymentReceived { total: next.total, currency: next.currency.clone() }),
                PaymentStatus::Refunded => events.push(OrderEvent::Refunded { total: next.total, currency: next.currency.clone() }),
                _ => {}
            }
        }
        if next.delivery_status != self.delivery_status {
            match next.delivery_status {
                DeliveryStatus::Shipped => events.push(OrderEvent::Shipped { tracking_number: next.tracking_number.clone() }),
                DeliveryStatus::Delivered => events.push(OrderEvent::Delivered),
                DeliveryStatus::Returned => events.push(OrderEvent::Returned),
                _ => {}
            }
        }
        if next.status == OrderStatus::Cancelled && self.status != OrderStatus::Cancelled {
            events.push(OrderEvent::Cancelled);
        }
        events.into_iter()
            .map(|event| OrderNotification { order_id: self.id, order_number: self.order_number.clone(), recipient: self.customer_email.clone(), event })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderError {
    NoItems,
    InvalidQuantity,
    NegativeAmount,
    AmountTooLarge,
    InvalidTransition { field: HistoryField, from: &'static str, to: &'static str },
    Closed(OrderStatus),
    CannotCancelDelivered,
    NotFulfilled,
    StaleVersion { expected: i32, actual: i32 },
}
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "order has no items"),
            Self::InvalidQuantity => write!(f, "quantity must be between 1 and {MAX_QUANTITY}"),
            Self::NegativeAmount => write!(f, "shipping and discount cannot be negative"),
            Self::AmountTooLarge => write!(f, "order amounts above {MAX_AMOUNT} are not accepted"),
            Self::InvalidTransition { field, from, to } => write!(f, "{} cannot move from {from} to {to}", field.as_str()),
            Self::Closed(s) => write!(f, "order is {s}"),
            Self::CannotCancelDelivered => write!(f, "delivered orders cannot be cancelled"),
            Self::NotFulfilled => write!(f, "order can only complete once paid and delivered"),
            Self::StaleVersion { expected, actual } => write!(f, "order changed meanwhile (version {actual}, expected {expected})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        let item = |code: &str, qty: i32, total: Decimal| OrderItem {
            id: Uuid::now_v7(), sku_id: Uuid::now_v7(), sku_code: code.into(), name: code.into(),
            sale_mode: SaleMode::PieceByWeight, quantity: qty, unit_price: total / Decimal::from(qty), total,
        };
        Order::place("HS-000001", OrderDraft {
            customer_email: " Jana@Example.com ".into(), customer_name: "Jana".into(), phone: None,
            shipping_address: serde_json::json!({"city": "Brno"}),
            items: vec![item("CLIP-LUXE-613-50-100G", 2, dec!(2400)), item("TAPE-STD-4-45-50G", 1, dec!(800))],
            shipping: dec!(99), discount: dec!(320), coupon_code: Some("WELCOME10".into()), currency: "czk".into(),
        }).unwrap()
    }

    fn patch() -> OrderPatch { OrderPatch::default() }

    #[test]
    fn test_place_totals() {
        let o = order();
        assert_eq!(o.customer_email, "jana@example.com");
        assert_eq!(o.subtotal, dec!(3200));
        assert_eq!(o.total, dec!(2979));
        assert_eq!(o.currency, "CZK");
        assert!(matches!(Order::place("x", OrderDraft { items: vec![], ..draft_of(&o) }), Err(OrderError::NoItems)));
    }

    #[test]
    fn test_place_rejects_oversized_amounts() {
        let o = order();
        let huge = Decimal::MAX;
        assert_eq!(Order::place("x", OrderDraft { shipping: huge, ..draft_of(&o) }).unwrap_err(), OrderError::AmountTooLarge);

        let mut items = o.items.clone();
        items[0].total = huge;
        items[1].total = huge;
        assert_eq!(Order::place("x", OrderDraft { items, ..draft_of(&o) }).unwrap_err(), OrderError::AmountTooLarge);
    }

    fn draft_of(o: &Order) -> OrderDraft {
        OrderDraft {
            customer_email: o.customer_email.clone(), customer_name: o.customer_name.clone(), phone: None,
            shipping_address: o.shipping_address.clone(), items: o.items.clone(), shipping: o.shipping,
            discount: o.discount, coupon_code: None, currency: o.currency.clone(),
        }
    }

    #[test]
    fn test_paid_deducts_stock_and_issues_invoice() {
        let o = order();
        let t = o.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), ..patch() }).unwrap();
        assert!(t.order.stock_deducted);
        assert!(t.issue_invoice);
        assert_eq!(t.stock_movements.iter().map(|m| m.delta).collect::<Vec<_>>(), vec![-2, -1]);
        assert_eq!(t.history.len(), 1);
        assert_eq!(t.order.version, 2);
        assert!(matches!(t.notifications[0].event, OrderEvent::PaymentReceived { .. }));
    }

    #[test]
    fn test_cancel_returns_deducted_stock_once() {
        let paid = order().plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), ..patch() }).unwrap().order;
        let t = paid.plan_update(&OrderPatch { status: Some(OrderStatus::Cancelled), ..patch() }).unwrap();
        assert_eq!(t.stock_movements.iter().map(|m| m.delta).collect::<Vec<_>>(), vec![2, 1]);
        assert!(t.stock_movements.iter().all(|m| m.reason == MovementReason::OrderCancelled));
        assert!(!t.order.stock_deducted);

        let refunded = t.order.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Refunded), ..patch() }).unwrap();
        assert!(refunded.stock_movements.is_empty());
        assert_eq!(refunded.order.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_cancel_unpaid_order_touches_no_stock() {
        let t = order().plan_update(&OrderPatch { status: Some(OrderStatus::Cancelled), ..patch() }).unwrap();
        assert!(t.stock_movements.is_empty());
        assert!(!t.issue_invoice);
        assert!(matches!(t.notifications[0].event, OrderEvent::Cancelled));
    }

    #[test]
    fn test_paying_and_cancelling_together_is_rejected() {
        let o = order();
        let err = o.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), status: Some(OrderStatus::Cancelled), ..patch() }).unwrap_err();
        assert_eq!(err, OrderError::Closed(OrderStatus::Cancelled));

        let failed = o.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Failed), status: Some(OrderStatus::Cancelled), ..patch() }).unwrap();
        assert!(!failed.issue_invoice);
        assert!(!failed.notifications.iter().any(|n| matches!(n.event, OrderEvent::PaymentReceived { .. })));
    }

    #[test]
    fn test_paid_and_delivered_completes() {
        let o = order();
        let t = o.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), delivery_status: Some(DeliveryStatus::Shipped), tracking_number: Some("Z123".into()), ..patch() }).unwrap();
        assert_eq!(t.order.status, OrderStatus::Open);
        assert!(t.notifications.iter().any(|n| n.event == OrderEvent::Shipped { tracking_number: Some("Z123".into()) }));
        let t = t.order.plan_update(&OrderPatch { delivery_status: Some(DeliveryStatus::Delivered), ..patch() }).unwrap();
        assert_eq!(t.order.status, OrderStatus::Completed);
        assert_eq!(t.history.iter().map(|h| h.field).collect::<Vec<_>>(), vec![HistoryField::Status, HistoryField::Delivery]);
    }

    #[test]
    fn test_returned_after_delivery_restocks() {
        let o = order();
        let o = o.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), delivery_status: Some(DeliveryStatus::Shipped), ..patch() }).unwrap().order;
        let o = o.plan_update(&OrderPatch { delivery_status: Some(DeliveryStatus::Delivered), ..patch() }).unwrap().order;
        let t = o.plan_update(&OrderPatch { delivery_status: Some(DeliveryStatus::Returned), ..patch() }).unwrap();
        assert_eq!(t.stock_movements.iter().map(|m| m.delta).sum::<i32>(), 3);
        assert_eq!(t.stock_movements[0].reason, MovementReason::OrderReturned);
    }

    #[test]
    fn test_rejected_transitions() {
        let o = order();
        assert!(matches!(o.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Refunded), ..patch() }), Err(OrderError::InvalidTransition { .. })));
        assert!(matches!(o.plan_update(&OrderPatch { delivery_status: Some(DeliveryStatus::Delivered), ..patch() }), Err(OrderError::InvalidTransition { .. })));
        assert_eq!(o.plan_update(&OrderPatch { status: Some(OrderStatus::Completed), ..patch() }).unwrap_err(), OrderError::NotFulfilled);
        assert_eq!(o.plan_update(&OrderPatch { expected_version: Some(7), ..patch() }).unwrap_err(), OrderError::StaleVersion { expected: 7, actual: 1 });

        let cancelled = o.plan_update(&OrderPatch { status: Some(OrderStatus::Cancelled), ..patch() }).unwrap().order;
        assert_eq!(cancelled.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), ..patch() }).unwrap_err(), OrderError::Closed(OrderStatus::Cancelled));
        assert!(matches!(cancelled.plan_update(&OrderPatch { status: Some(OrderStatus::Open), ..patch() }), Err(OrderError::InvalidTransition { .. })));
    }

    #[test]
    fn test_same_state_is_noop() {
        let o = order();
        let t = o.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Pending), status: Some(OrderStatus::Open), ..patch() }).unwrap();
        assert!(t.is_noop());
        assert!(t.history.is_empty() && t.notifications.is_empty() && t.stock_movements.is_empty());
    }
}
