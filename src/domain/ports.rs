use async_trait::async_trait;
use uuid::Uuid;

use super::aggregates::{
    Coupon, Invoice, MatrixKey, Order, OrderDraft, OrderStatus, OrderTransition, PriceMatrix, PriceMatrixEntry, Sku,
    SkuUpdate, StatusChange, StockChange, StockMovement,
};
use super::events::DomainEvent;
use super::exchange::ExchangeRate;
use super::search::ProductFilter;
use super::value_objects::{Category, Tier};
use crate::Result;

/// A stock movement as it was applied, with the before/after levels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMovement { pub movement: StockMovement, pub change: StockChange }

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_skus(&self, filter: &ProductFilter) -> Result<(Vec<Sku>, u64)>;
    async fn get_sku(&self, id: Uuid) -> Result<Option<Sku>>;
    async fn get_skus(&self, ids: &[Uuid]) -> Result<Vec<Sku>>;
    /// Fails with `DuplicateSku` when the code is taken.
    async fn insert_sku(&self, sku: &Sku) -> Result<()>;
    /// Applies `update` to the stored SKU while holding it exclusively, so a
    /// concurrent stock movement is never overwritten. Only the fields the
    /// update names are written. Returns the SKU as stored afterwards.
    async fn update_sku(&self, id: Uuid, update: &SkuUpdate) -> Result<Sku>;

    async fn price_matrix(&self) -> Result<PriceMatrix>;
    async fn list_matrix(&self, category: Option<Category>, tier: Option<Tier>) -> Result<Vec<PriceMatrixEntry>>;
    /// Inserts or replaces the entry for its (category, tier, length). Returns the stored row.
    async fn upsert_matrix_entry(&self, entry: &PriceMatrixEntry) -> Result<PriceMatrixEntry>;
    async fn delete_matrix_entry(&self, id: Uuid) -> Result<bool>;
    /// Reprices every SKU on `key`. Returns the SKUs that changed.
    async fn reprice_skus(&self, key: &MatrixKey, price_per_gram: rust_decimal::Decimal) -> Result<Vec<Sku>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Assigns the next order number and saves the order. With a coupon code,
    /// the coupon is evaluated against the subtotal and one use is consumed in
    /// the same transaction; an exhausted coupon rolls the whole order back.
    async fn place_order(&self, draft: OrderDraft, coupon_code: Option<&str>) -> Result<Order>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn list_orders(&self, status: Option<OrderStatus>, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)>;
    /// Applies a planned transition if the order is still at `expected_version`.
    async fn commit_transition(&self, transition: &OrderTransition) -> Result<Vec<AppliedMovement>>;
    async fn order_history(&self, order_id: Uuid) -> Result<Vec<StatusChange>>;
    /// Returns the order's invoice, creating it with the next number for the year when missing.
    async fn issue_invoice(&self, order_id: Uuid, prefix: &str) -> Result<Invoice>;
    async fn get_invoice(&self, order_id: Uuid) -> Result<Option<Invoice>>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn create_coupon(&self, coupon: &Coupon) -> Result<()>;
    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>>;
    async fn list_coupons(&self) -> Result<Vec<Coupon>>;
    async fn deactivate_coupon(&self, code: &str) -> Result<bool>;
}

#[async_trait]
pub trait RateStore: Send + Sync {
    async fn get_rate(&self, base: &str, quote: &str) -> Result<Option<ExchangeRate>>;
    async fn put_rate(&self, rate: &ExchangeRate) -> Result<()>;
}

pub trait Store: CatalogStore + OrderStore + CouponStore + RateStore {}
impl<T: CatalogStore + OrderStore + CouponStore + RateStore> Store for T {}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<()>;
}
