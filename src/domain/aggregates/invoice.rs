//! Invoice issued when an order is paid

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::order::Order;

pub const PAYMENT_TERM_DAYS: i64 = 14;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub billing_address: serde_json::Value,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine { pub line_no: u32, pub sku_code: String, pub description: String, pub quantity: i32, pub unit: String, pub unit_price: Decimal, pub total: Decimal }

/// `{prefix}{year}{seq:05}`, e.g. `INV202600042`.
pub fn invoice_number(prefix: &str, year: i32, seq: u32) -> String { format!("{prefix}{year}{seq:05}") }

impl Invoice {
    pub fn for_order(order: &Order, number: String, issued_at: DateTime<Utc>) -> Self {
        let lines = order.items.iter().enumerate().map(|(idx, item)| InvoiceLine {
            line_no: idx as u32 + 1,
            sku_code: item.sku_code.clone(),
            description: item.name.clone(),
            quantity: item.quantity,
            unit: item.sale_mode.unit().to_string(),
            unit_price: item.unit_price,
            total: item.total,
        }).collect();
        Self {
            id: Uuid::now_v7(), number, order_id: order.id, order_number: order.order_number.clone(),
            customer_name: order.customer_name.clone(), customer_email: order.customer_email.clone(),
            billing_address: order.shipping_address.clone(), lines,
            subtotal: order.subtotal, discount: order.discount, shipping: order.shipping, total: order.total,
            currency: order.currency.clone(), issued_at, due_at: issued_at + Duration::days(PAYMENT_TERM_DAYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::{OrderDraft, OrderItem};
    use crate::domain::value_objects::SaleMode;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_invoice_from_order() {
        let item = OrderItem {
            id: Uuid::now_v7(), sku_id: Uuid::now_v7(), sku_code: "WEFT-PLAT-60A-60".into(), name: "Weft".into(),
            sale_mode: SaleMode::BulkG, quantity: 150, unit_price: dec!(20), total: dec!(3000),
        };
        let order = Order::place("HS-000007", OrderDraft {
            customer_email: "a@b.cz".into(), customer_name: "A".into(), phone: None, shipping_address: serde_json::json!({}),
            items: vec![item], shipping: dec!(0), discount: dec!(0), coupon_code: None, currency: "CZK".into(),
        }).unwrap();
        let issued = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let inv = Invoice::for_order(&order, invoice_number("INV", 2026, 42), issued);
        assert_eq!(inv.number, "INV202600042");
        assert_eq!(inv.lines[0].unit, "g");
        assert_eq!(inv.total, dec!(3000));
        assert_eq!(inv.due_at, Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap());
    }
}
