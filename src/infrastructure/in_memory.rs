use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::{
    invoice_number, normalize_code, order_number, Coupon, Invoice, MatrixKey, Order, OrderDraft,
    OrderError, OrderStatus, OrderTransition, PriceMatrix, PriceMatrixEntry, Sku, SkuUpdate, StatusChange,
};
use crate::domain::exchange::ExchangeRate;
use crate::domain::ports::{AppliedMovement, CatalogStore, CouponStore, OrderStore, RateStore};
use crate::domain::search::ProductFilter;
use crate::domain::value_objects::{Category, Tier};
use crate::{EcommerceError, Result};

#[derive(Default)]
struct State {
    skus: HashMap<Uuid, Sku>,
    matrix: HashMap<MatrixKey, PriceMatrixEntry>,
    orders: HashMap<Uuid, Order>,
    order_seq: u64,
    history: Vec<StatusChange>,
    invoices: HashMap<Uuid, Invoice>,
    invoice_seq: HashMap<i32, u32>,
    coupons: HashMap<String, Coupon>,
    rates: HashMap<(String, String), ExchangeRate>,
}

/// A thread-safe in-memory store.
///
/// All data sits behind one `RwLock`, so every write method is atomic with
/// respect to the others. Used by tests and when no database is configured.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_skus(&self, filter: &ProductFilter) -> Result<(Vec<Sku>, u64)> {
        let state = self.state.read().await;
        Ok(filter.apply(state.skus.values().cloned()))
    }

    async fn get_sku(&self, id: Uuid) -> Result<Option<Sku>> {
        Ok(self.state.read().await.skus.get(&id).cloned())
    }

    async fn get_skus(&self, ids: &[Uuid]) -> Result<Vec<Sku>> {
        let state = self.state.read().await;
        let mut out: Vec<Sku> = Vec::new();
        for id in ids {
            if let Some(sku) = state.skus.get(id) {
                if !out.iter().any(|s| s.id == sku.id) { out.push(sku.clone()); }
            }
        }
        Ok(out)
    }

    async fn insert_sku(&self, sku: &Sku) -> Result<()> {
        let mut state = self.state.write().await;
        if state.skus.values().any(|s| s.code == sku.code) {
            return Err(EcommerceError::DuplicateSku(sku.code.clone()));
        }
        state.skus.insert(sku.id, sku.clone());
        Ok(())
    }

    async fn update_sku(&self, id: Uuid, update: &SkuUpdate) -> Result<Sku> {
        let mut state = self.state.write().await;
        let sku = state.skus.get_mut(&id).ok_or(EcommerceError::NotFound("SKU"))?;
        let mut updated = sku.clone();
        updated.apply(update)?;
        *sku = updated.clone();
        Ok(updated)
    }

    async fn price_matrix(&self) -> Result<PriceMatrix> {
        Ok(PriceMatrix::from_entries(self.state.read().await.matrix.values().cloned()))
    }

    async fn list_matrix(&self, category: Option<Category>, tier: Option<Tier>) -> Result<Vec<PriceMatrixEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state.matrix.values()
            .filter(|e| category.map_or(true, |c| e.category == c) && tier.map_or(true, |t| e.tier == t))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.category.as_str(), e.tier, e.length_cm));
        Ok(entries)
    }

    async fn upsert_matrix_entry(&self, entry: &PriceMatrixEntry) -> Result<PriceMatrixEntry> {
        let mut state = self.state.write().await;
        let stored = match state.matrix.get(&entry.key()) {
            Some(existing) => PriceMatrixEntry { id: existing.id, ..entry.clone() },
            None => entry.clone(),
        };
        state.matrix.insert(stored.key(), stored.clone());
        Ok(stored)
    }

    async fn delete_matrix_entry(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let before = state.matrix.len();
        state.matrix.retain(|_, e| e.id != id);
        Ok(state.matrix.len() != before)
    }

    async fn reprice_skus(&self, key: &MatrixKey, price_per_gram: Decimal) -> Result<Vec<Sku>> {
        let mut state = self.state.write().await;
        let mut changed = Vec::new();
        for sku in state.skus.values_mut().filter(|s| &s.matrix_key() == key) {
            if sku.reprice(price_per_gram)? { changed.push(sku.clone()); }
        }
        Ok(changed)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn place_order(&self, mut draft: OrderDraft, coupon_code: Option<&str>) -> Result<Order> {
        let mut state = self.state.write().await;
        let code = coupon_code.map(normalize_code);
        if let Some(code) = &code {
            let coupon = state.coupons.get(code).ok_or(EcommerceError::NotFound("coupon"))?;
            draft.discount = coupon.evaluate(draft.subtotal()?, Utc::now())?;
            draft.coupon_code = Some(code.clone());
        }

        let order = Order::place(order_number(state.order_seq + 1), draft)?;
        if let Some(code) = &code {
            let coupon = state.coupons.get_mut(code).ok_or(EcommerceError::NotFound("coupon"))?;
            coupon.redeem()?;
        }
        state.order_seq += 1;
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, status: Option<OrderStatus>, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state.orders.values().filter(|o| status.map_or(true, |s| o.status == s)).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.order_number.cmp(&a.order_number)));
        let total = orders.len() as u64;
        let offset = (page.saturating_sub(1) as usize) * per_page as usize;
        Ok((orders.into_iter().skip(offset).take(per_page as usize).collect(), total))
    }

    async fn commit_transition(&self, t: &OrderTransition) -> Result<Vec<AppliedMovement>> {
        let mut state = self.state.write().await;
        let current = state.orders.get(&t.order.id).ok_or(EcommerceError::NotFound("order"))?;
        if current.version != t.expected_version {
            return Err(OrderError::StaleVersion { expected: t.expected_version, actual: current.version }.into());
        }
        let invoice_number = current.invoice_number.clone();
        if t.stock_movements.iter().any(|m| !state.skus.contains_key(&m.sku_id)) {
            return Err(EcommerceError::NotFound("SKU"));
        }

        let mut applied = Vec::with_capacity(t.stock_movements.len());
        for m in &t.stock_movements {
            if let Some(sku) = state.skus.get_mut(&m.sku_id) {
                applied.push(AppliedMovement { movement: m.clone(), change: sku.adjust_stock(m.delta) });
            }
        }
        state.history.extend(t.history.iter().cloned());
        let mut order = t.order.clone();
        order.invoice_number = invoice_number;
        state.orders.insert(order.id, order);
        Ok(applied)
    }

    async fn order_history(&self, order_id: Uuid) -> Result<Vec<StatusChange>> {
        let state = self.state.read().await;
        Ok(state.history.iter().filter(|h| h.order_id == order_id).cloned().collect())
    }

    async fn issue_invoice(&self, order_id: Uuid, prefix: &str) -> Result<Invoice> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.invoices.get(&order_id) { return Ok(existing.clone()); }
        let order = state.orders.get(&order_id).cloned().ok_or(EcommerceError::NotFound("order"))?;
        let now = Utc::now();
        let seq = state.invoice_seq.entry(now.year()).or_insert(0);
        *seq += 1;
        let invoice = Invoice::for_order(&order, invoice_number(prefix, now.year(), *seq), now);
        if let Some(o) = state.orders.get_mut(&order_id) { o.invoice_number = Some(invoice.number.clone()); }
        state.invoices.insert(order_id, invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(&self, order_id: Uuid) -> Result<Option<Invoice>> {
        Ok(self.state.read().await.invoices.get(&order_id).cloned())
    }
}

#[async_trait]
impl CouponStore for InMemoryStore {
    async fn create_coupon(&self, coupon: &Coupon) -> Result<()> {
        let mut state = self.state.write().await;
        if state.coupons.contains_key(&coupon.code) { return Err(EcommerceError::DuplicateCoupon(coupon.code.clone())); }
        state.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.state.read().await.coupons.get(code).cloned())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let state = self.state.read().await;
        let mut coupons: Vec<_> = state.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn deactivate_coupon(&self, code: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(state.coupons.get_mut(code).map(Coupon::deactivate).is_some())
    }
}

#[async_trait]
impl RateStore for InMemoryStore {
    async fn get_rate(&self, base: &str, quote: &str) -> Result<Option<ExchangeRate>> {
        Ok(self.state.read().await.rates.get(&(base.to_string(), quote.to_string())).cloned())
    }

    async fn put_rate(&self, rate: &ExchangeRate) -> Result<()> {
        let mut state = self.state.write().await;
        state.rates.insert((rate.base.clone(), rate.quote.clone()), rate.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CouponError, CouponSpec, DiscountKind, OrderItem, OrderPatch, PaymentStatus, SkuDraft};
    use crate::domain::value_objects::{LengthCm, SaleMode, Shade};
    use rust_decimal_macros::dec;

    async fn seeded() -> (InMemoryStore, Sku) {
        let store = InMemoryStore::new();
        let key = MatrixKey { category: Category::Weft, tier: Tier::Luxe, length_cm: LengthCm::new(55).unwrap() };
        store.upsert_matrix_entry(&PriceMatrixEntry::new(key, dec!(40), "CZK").unwrap()).await.unwrap();
        let matrix = store.price_matrix().await.unwrap();
        let sku = SkuDraft {
            category: Category::Weft, tier: Tier::Luxe, shade: Shade::new("6").unwrap(), length_cm: LengthCm::new(55).unwrap(),
            sale_mode: SaleMode::PieceByWeight, weight_g: Some(100), stock: 3, name: None,
        }.resolve(&matrix, "CZK").unwrap();
        store.insert_sku(&sku).await.unwrap();
        (store, sku)
    }

    fn draft(sku: &Sku, qty: u32) -> OrderDraft {
        OrderDraft {
            customer_email: "eva@example.cz".into(), customer_name: "Eva".into(), phone: None,
            shipping_address: serde_json::json!({}), items: vec![OrderItem::for_sku(sku, qty).unwrap()],
            shipping: dec!(0), discount: dec!(0), coupon_code: None, currency: "CZK".into(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_sku_code_rejected() {
        let (store, sku) = seeded().await;
        let copy = Sku { id: Uuid::now_v7(), ..sku };
        assert!(matches!(store.insert_sku(&copy).await, Err(EcommerceError::DuplicateSku(_))));
    }

    #[tokio::test]
    async fn test_coupon_limit_enforced_atomically() {
        let (store, sku) = seeded().await;
        store.create_coupon(&Coupon::create(CouponSpec {
            code: Some("ONCE".into()), kind: Some(DiscountKind::Fixed), value: dec!(100), usage_limit: Some(1), ..Default::default()
        }).unwrap()).await.unwrap();

        let order = store.place_order(draft(&sku, 1), Some("once")).await.unwrap();
        assert_eq!(order.order_number, "HS-000001");
        assert_eq!(order.discount, dec!(100));
        assert_eq!(order.coupon_code.as_deref(), Some("ONCE"));

        let err = store.place_order(draft(&sku, 1), Some("ONCE")).await.unwrap_err();
        assert!(matches!(err, EcommerceError::Coupon(CouponError::Exhausted)));
        let (orders, total) = store.list_orders(None, 1, 10).await.unwrap();
        assert_eq!((orders.len(), total), (1, 1));
        assert_eq!(store.get_coupon("ONCE").await.unwrap().unwrap().used_count, 1);
    }

    #[tokio::test]
    async fn test_stale_transition_rejected() {
        let (store, sku) = seeded().await;
        let order = store.place_order(draft(&sku, 2), None).await.unwrap();
        let paid = order.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), ..Default::default() }).unwrap();
        let applied = store.commit_transition(&paid).await.unwrap();
        assert_eq!(applied[0].change.after, 1);
        assert!(matches!(store.commit_transition(&paid).await, Err(EcommerceError::Order(OrderError::StaleVersion { .. }))));
        assert_eq!(store.get_sku(sku.id).await.unwrap().unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_rename_after_payment_keeps_stock() {
        let (store, sku) = seeded().await;
        let loaded = store.get_sku(sku.id).await.unwrap().unwrap();
        assert_eq!(loaded.stock, 3);

        let order = store.place_order(draft(&sku, 2), None).await.unwrap();
        let paid = order.plan_update(&OrderPatch { payment_status: Some(PaymentStatus::Paid), ..Default::default() }).unwrap();
        store.commit_transition(&paid).await.unwrap();

        let renamed = store.update_sku(loaded.id, &SkuUpdate { name: Some("Weft 55 cm".into()), ..Default::default() }).await.unwrap();
        assert_eq!((renamed.name.as_str(), renamed.stock), ("Weft 55 cm", 1));
        assert_eq!(store.get_sku(sku.id).await.unwrap().unwrap().stock, 1);

        let counted = store.update_sku(sku.id, &SkuUpdate { stock: Some(10), ..Default::default() }).await.unwrap();
        assert_eq!((counted.name.as_str(), counted.stock), ("Weft 55 cm", 10));
    }

    #[tokio::test]
    async fn test_invoice_is_idempotent() {
        let (store, sku) = seeded().await;
        let order = store.place_order(draft(&sku, 1), None).await.unwrap();
        let first = store.issue_invoice(order.id, "INV").await.unwrap();
        let second = store.issue_invoice(order.id, "INV").await.unwrap();
        assert_eq!(first.number, second.number);
        assert!(first.number.ends_with("00001"));
        assert_eq!(store.get_order(order.id).await.unwrap().unwrap().invoice_number, Some(first.number));
    }
}
