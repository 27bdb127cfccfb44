use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use super::Services;
use crate::domain::aggregates::{normalize_code, Coupon, CouponSpec, Order, OrderDraft, OrderItem};
use crate::domain::events::{DomainEvent, OrderEvent, OrderNotification};
use crate::domain::value_objects::{validate_amount, Money};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[serde(default)]
    pub shipping_address: serde_json::Value,
    #[validate(length(min = 1, max = 50))]
    pub items: Vec<CheckoutItem>,
    #[validate(length(max = 32))]
    pub coupon_code: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub shipping: Decimal,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckoutItem {
    pub sku_id: Uuid,
    /// Grams for `BULK_G` SKUs, pieces otherwise.
    pub quantity: u32,
}

impl Services {
    /// Prices the cart from current SKU prices and stores the order. The
    /// coupon, if any, is consumed in the same transaction. Stock is taken
    /// when the order is marked paid, not here.
    pub async fn place_order(&self, req: CheckoutRequest) -> Result<Order> {
        req.validate()?;

        let ids: Vec<Uuid> = req.items.iter().map(|i| i.sku_id).collect();
        let skus: HashMap<Uuid, _> = self.store.get_skus(&ids).await?.into_iter().map(|s| (s.id, s)).collect();

        // Every line must be priced in the cart's currency.
        let currency = skus.values().next().map_or(self.config.default_currency.as_str(), |s| s.currency.as_str());
        let mut subtotal = Money::zero(currency);
        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let sku = skus.get(&line.sku_id).filter(|s| s.active).ok_or(EcommerceError::NotFound("SKU"))?;
            let item = OrderItem::for_sku(sku, line.quantity)?;
            subtotal = subtotal.add(&Money::new(item.total, &sku.currency))?;
            items.push(item);
        }
        tracing::debug!(subtotal = %subtotal, lines = items.len(), "cart priced");

        let draft = OrderDraft {
            customer_email: req.customer_email,
            customer_name: req.customer_name.trim().to_string(),
            phone: req.phone,
            shipping_address: req.shipping_address,
            items,
            shipping: req.shipping,
            discount: Decimal::ZERO,
            coupon_code: None,
            currency: subtotal.currency().to_string(),
        };

        let order = self.store.place_order(draft, req.coupon_code.as_deref().filter(|c| !c.trim().is_empty())).await?;
        tracing::info!(order = %order.order_number, total = %order.total, coupon = ?order.coupon_code, "order placed");
        self.publish(DomainEvent::Order(OrderNotification {
            order_id: order.id,
            order_number: order.order_number.clone(),
            recipient: order.customer_email.clone(),
            event: OrderEvent::Placed { total: order.total, currency: order.currency.clone() },
        })).await;
        Ok(order)
    }

    /// Discount the coupon would give on `subtotal`, without using it up.
    pub async fn validate_coupon(&self, code: &str, subtotal: Decimal) -> Result<(Coupon, Decimal)> {
        let coupon = self.store.get_coupon(&normalize_code(code)).await?.ok_or(EcommerceError::NotFound("coupon"))?;
        let discount = coupon.evaluate(subtotal, Utc::now())?;
        Ok((coupon, discount))
    }

    pub async fn create_coupon(&self, spec: CouponSpec) -> Result<Coupon> {
        spec.validate()?;
        let coupon = Coupon::create(spec)?;
        self.store.create_coupon(&coupon).await?;
        tracing::info!(code = %coupon.code, "coupon created");
        Ok(coupon)
    }

    pub async fn list_coupons(&self) -> Result<Vec<Coupon>> { self.store.list_coupons().await }

    pub async fn deactivate_coupon(&self, code: &str) -> Result<()> {
        if !self.store.deactivate_coupon(&normalize_code(code)).await? { return Err(EcommerceError::NotFound("coupon")); }
        Ok(())
    }
}
