use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgExecutor, PgPool, Postgres};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::aggregates::{
    invoice_number, normalize_code, order_number, Coupon, CouponError, DeliveryStatus, DiscountKind, HistoryField,
    Invoice, InvoiceLine, MatrixKey, Order, OrderDraft, OrderError, OrderItem, OrderStatus, OrderTransition,
    PaymentStatus, PriceMatrix, PriceMatrixEntry, Sku, SkuUpdate, StatusChange,
};
use crate::domain::exchange::ExchangeRate;
use crate::domain::ports::{AppliedMovement, CatalogStore, CouponStore, OrderStore, RateStore};
use crate::domain::search::{ProductFilter, SortOrder};
use crate::domain::value_objects::{Category, LengthCm, SaleMode, Shade, Tier};
use crate::{EcommerceError, Result};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn corrupt(column: &str, value: impl std::fmt::Display) -> EcommerceError {
    EcommerceError::StorageError(format!("unexpected {column} value '{value}' in database"))
}

fn unique_or(e: sqlx::Error, duplicate: impl FnOnce() -> EcommerceError) -> EcommerceError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => duplicate(),
        _ => e.into(),
    }
}

fn length_from_db(value: i32) -> Result<LengthCm> {
    u16::try_from(value).ok().and_then(|v| LengthCm::new(v).ok()).ok_or_else(|| corrupt("length_cm", value))
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

// =============================================================================
// Rows
// =============================================================================

#[derive(FromRow)]
struct SkuRow {
    id: Uuid, code: String, name: String, slug: String, category: String, tier: String, shade: String,
    length_cm: i32, sale_mode: String, weight_g: Option<i32>, price_per_gram: Decimal, price: Decimal,
    currency: String, stock: i32, active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<SkuRow> for Sku {
    type Error = EcommerceError;
    fn try_from(r: SkuRow) -> Result<Self> {
        Ok(Sku {
            category: Category::parse(&r.category).ok_or_else(|| corrupt("category", &r.category))?,
            tier: Tier::parse(&r.tier).ok_or_else(|| corrupt("tier", &r.tier))?,
            shade: Shade::new(r.shade.as_str()).map_err(|_| corrupt("shade", &r.shade))?,
            length_cm: length_from_db(r.length_cm)?,
            sale_mode: SaleMode::parse(&r.sale_mode).ok_or_else(|| corrupt("sale_mode", &r.sale_mode))?,
            weight_g: r.weight_g.map(|w| u32::try_from(w).map_err(|_| corrupt("weight_g", w))).transpose()?,
            id: r.id, code: r.code, name: r.name, slug: r.slug, price_per_gram: r.price_per_gram, price: r.price,
            currency: r.currency, stock: r.stock, active: r.active, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MatrixRow {
    id: Uuid, category: String, tier: String, length_cm: i32, price_per_gram: Decimal, currency: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MatrixRow> for PriceMatrixEntry {
    type Error = EcommerceError;
    fn try_from(r: MatrixRow) -> Result<Self> {
        Ok(PriceMatrixEntry {
            category: Category::parse(&r.category).ok_or_else(|| corrupt("category", &r.category))?,
            tier: Tier::parse(&r.tier).ok_or_else(|| corrupt("tier", &r.tier))?,
            length_cm: length_from_db(r.length_cm)?,
            id: r.id, price_per_gram: r.price_per_gram, currency: r.currency, updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, customer_email: String, customer_name: String, phone: Option<String>,
    shipping_address: serde_json::Value, status: String, payment_status: String, delivery_status: String,
    subtotal: Decimal, discount: Decimal, shipping: Decimal, total: Decimal, currency: String,
    coupon_code: Option<String>, tracking_number: Option<String>, admin_note: Option<String>,
    stock_deducted: bool, invoice_number: Option<String>, version: i32,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
        Ok(Order {
            status: OrderStatus::parse(&self.status).ok_or_else(|| corrupt("status", &self.status))?,
            payment_status: PaymentStatus::parse(&self.payment_status).ok_or_else(|| corrupt("payment_status", &self.payment_status))?,
            delivery_status: DeliveryStatus::parse(&self.delivery_status).ok_or_else(|| corrupt("delivery_status", &self.delivery_status))?,
            id: self.id, order_number: self.order_number, customer_email: self.customer_email,
            customer_name: self.customer_name, phone: self.phone, shipping_address: self.shipping_address, items,
            subtotal: self.subtotal, discount: self.discount, shipping: self.shipping, total: self.total,
            currency: self.currency, coupon_code: self.coupon_code, tracking_number: self.tracking_number,
            admin_note: self.admin_note, stock_deducted: self.stock_deducted, invoice_number: self.invoice_number,
            version: self.version, created_at: self.created_at, updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderItemRow {
    id: Uuid, order_id: Uuid, sku_id: Uuid, sku_code: String, name: String, sale_mode: String,
    quantity: i32, unit_price: Decimal, total: Decimal,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = EcommerceError;
    fn try_from(r: OrderItemRow) -> Result<Self> {
        Ok(OrderItem {
            sale_mode: SaleMode::parse(&r.sale_mode).ok_or_else(|| corrupt("sale_mode", &r.sale_mode))?,
            id: r.id, sku_id: r.sku_id, sku_code: r.sku_code, name: r.name, quantity: r.quantity,
            unit_price: r.unit_price, total: r.total,
        })
    }
}

#[derive(FromRow)]
struct HistoryRow {
    id: Uuid, order_id: Uuid, field: String, from_value: Option<String>, to_value: Option<String>,
    note: Option<String>, changed_by: Option<String>, created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for StatusChange {
    type Error = EcommerceError;
    fn try_from(r: HistoryRow) -> Result<Self> {
        Ok(StatusChange {
            field: HistoryField::parse(&r.field).ok_or_else(|| corrupt("field", &r.field))?,
            id: r.id, order_id: r.order_id, from: r.from_value, to: r.to_value, note: r.note,
            changed_by: r.changed_by, created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct InvoiceRow {
    id: Uuid, number: String, order_id: Uuid, order_number: String, customer_name: String, customer_email: String,
    billing_address: serde_json::Value, lines: Json<Vec<InvoiceLine>>, subtotal: Decimal, discount: Decimal,
    shipping: Decimal, total: Decimal, currency: String, issued_at: DateTime<Utc>, due_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(r: InvoiceRow) -> Self {
        Invoice {
            id: r.id, number: r.number, order_id: r.order_id, order_number: r.order_number,
            customer_name: r.customer_name, customer_email: r.customer_email, billing_address: r.billing_address,
            lines: r.lines.0, subtotal: r.subtotal, discount: r.discount, shipping: r.shipping, total: r.total,
            currency: r.currency, issued_at: r.issued_at, due_at: r.due_at,
        }
    }
}

#[derive(FromRow)]
struct CouponRow {
    id: Uuid, code: String, kind: String, value: Decimal, min_order_total: Option<Decimal>,
    usage_limit: Option<i32>, used_count: i32, valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>, active: bool, created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = EcommerceError;
    fn try_from(r: CouponRow) -> Result<Self> {
        Ok(Coupon {
            kind: DiscountKind::parse(&r.kind).ok_or_else(|| corrupt("kind", &r.kind))?,
            id: r.id, code: r.code, value: r.value, min_order_total: r.min_order_total, usage_limit: r.usage_limit,
            used_count: r.used_count, valid_from: r.valid_from, valid_until: r.valid_until, active: r.active,
            created_at: r.created_at,
        })
    }
}

#[derive(FromRow)]
struct RateRow { base: String, quote: String, rate: Decimal, updated_at: DateTime<Utc> }

impl From<RateRow> for ExchangeRate {
    fn from(r: RateRow) -> Self { ExchangeRate { base: r.base, quote: r.quote, rate: r.rate, updated_at: r.updated_at } }
}

// =============================================================================
// Shared queries
// =============================================================================

fn push_sku_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if !f.include_inactive { qb.push(" AND active"); }
    if f.in_stock { qb.push(" AND stock > 0"); }
    if !f.categories.is_empty() {
        let values: Vec<String> = f.categories.iter().map(|c| c.as_str().to_string()).collect();
        qb.push(" AND category = ANY(").push_bind(values).push(")");
    }
    if !f.tiers.is_empty() {
        let values: Vec<String> = f.tiers.iter().map(|t| t.as_str().to_string()).collect();
        qb.push(" AND tier = ANY(").push_bind(values).push(")");
    }
    if !f.shades.is_empty() {
        qb.push(" AND shade = ANY(").push_bind(f.shades.clone()).push(")");
    }
    if let Some(min) = f.length.min { qb.push(" AND length_cm >= ").push_bind(i32::from(min)); }
    if let Some(max) = f.length.max { qb.push(" AND length_cm <= ").push_bind(i32::from(max)); }
    if let Some(mode) = f.sale_mode { qb.push(" AND sale_mode = ").push_bind(mode.as_str()); }
    if let Some(q) = &f.q {
        for term in q.split(' ').filter(|t| !t.is_empty()) {
            qb.push(" AND (code || ' ' || name || ' ' || shade) ILIKE ").push_bind(format!("%{}%", escape_like(term)));
        }
    }
}

/// `UPDATE` writing only the columns `update` names, taken from the already
/// updated `sku`.
fn sku_update_query<'a>(sku: &Sku, update: &SkuUpdate) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE skus SET updated_at = ");
    qb.push_bind(sku.updated_at);
    if update.name.is_some() { qb.push(", name = ").push_bind(sku.name.clone()); }
    if update.stock.is_some() { qb.push(", stock = ").push_bind(sku.stock); }
    if update.active.is_some() { qb.push(", active = ").push_bind(sku.active); }
    if update.price_per_gram.is_some() {
        qb.push(", price_per_gram = ").push_bind(sku.price_per_gram);
        qb.push(", price = ").push_bind(sku.price);
    }
    qb.push(" WHERE id = ").push_bind(sku.id);
    qb
}

fn sort_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => " ORDER BY created_at DESC, code",
        SortOrder::PriceAsc => " ORDER BY price, code",
        SortOrder::PriceDesc => " ORDER BY price DESC, code",
        SortOrder::LengthAsc => " ORDER BY length_cm, code",
        SortOrder::LengthDesc => " ORDER BY length_cm DESC, code",
    }
}

async fn fetch_items<'e>(exec: impl PgExecutor<'e>, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderItem>>> {
    let rows = sqlx::query_as::<_, OrderItemRow>("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position")
        .bind(order_ids)
        .fetch_all(exec)
        .await?;
    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        let order_id = row.order_id;
        items.entry(order_id).or_default().push(row.try_into()?);
    }
    Ok(items)
}

async fn insert_order(conn: &mut sqlx::PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_email, customer_name, phone, shipping_address, status, payment_status, \
         delivery_status, subtotal, discount, shipping, total, currency, coupon_code, tracking_number, admin_note, \
         stock_deducted, invoice_number, version, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
    )
    .bind(order.id).bind(&order.order_number).bind(&order.customer_email).bind(&order.customer_name).bind(&order.phone)
    .bind(&order.shipping_address).bind(order.status.as_str()).bind(order.payment_status.as_str())
    .bind(order.delivery_status.as_str()).bind(order.subtotal).bind(order.discount).bind(order.shipping).bind(order.total)
    .bind(&order.currency).bind(&order.coupon_code).bind(&order.tracking_number).bind(&order.admin_note)
    .bind(order.stock_deducted).bind(&order.invoice_number).bind(order.version).bind(order.created_at).bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, position, sku_id, sku_code, name, sale_mode, quantity, unit_price, total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(item.id).bind(order.id).bind(position as i32).bind(item.sku_id).bind(&item.sku_code).bind(&item.name)
        .bind(item.sale_mode.as_str()).bind(item.quantity).bind(item.unit_price).bind(item.total)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_skus(&self, filter: &ProductFilter) -> Result<(Vec<Sku>, u64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM skus");
        push_sku_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new("SELECT * FROM skus");
        push_sku_filter(&mut qb, filter);
        qb.push(sort_clause(filter.sort));
        qb.push(" LIMIT ").push_bind(i64::from(filter.per_page));
        qb.push(" OFFSET ").push_bind(filter.offset() as i64);
        let rows = qb.build_query_as::<SkuRow>().fetch_all(&self.pool).await?;
        let skus = rows.into_iter().map(Sku::try_from).collect::<Result<Vec<_>>>()?;
        Ok((skus, total.max(0) as u64))
    }

    async fn get_sku(&self, id: Uuid) -> Result<Option<Sku>> {
        sqlx::query_as::<_, SkuRow>("SELECT * FROM skus WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Sku::try_from)
            .transpose()
    }

    async fn get_skus(&self, ids: &[Uuid]) -> Result<Vec<Sku>> {
        let rows = sqlx::query_as::<_, SkuRow>("SELECT * FROM skus WHERE id = ANY($1)").bind(ids).fetch_all(&self.pool).await?;
        rows.into_iter().map(Sku::try_from).collect()
    }

    async fn insert_sku(&self, sku: &Sku) -> Result<()> {
        sqlx::query(
            "INSERT INTO skus (id, code, name, slug, category, tier, shade, length_cm, sale_mode, weight_g, price_per_gram, \
             price, currency, stock, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(sku.id).bind(&sku.code).bind(&sku.name).bind(&sku.slug).bind(sku.category.as_str()).bind(sku.tier.as_str())
        .bind(sku.shade.as_str()).bind(i32::from(sku.length_cm.value())).bind(sku.sale_mode.as_str())
        .bind(sku.weight_g.map(|w| w as i32)).bind(sku.price_per_gram).bind(sku.price).bind(&sku.currency)
        .bind(sku.stock).bind(sku.active).bind(sku.created_at).bind(sku.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_or(e, || EcommerceError::DuplicateSku(sku.code.clone())))?;
        Ok(())
    }

    async fn update_sku(&self, id: Uuid, update: &SkuUpdate) -> Result<Sku> {
        let mut tx = self.pool.begin().await?;
        let mut sku: Sku = sqlx::query_as::<_, SkuRow>("SELECT * FROM skus WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(EcommerceError::NotFound("SKU"))?
            .try_into()?;
        sku.apply(update)?;
        sku_update_query(&sku, update).build().execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(sku)
    }

    async fn price_matrix(&self) -> Result<PriceMatrix> {
        let entries = self.list_matrix(None, None).await?;
        Ok(PriceMatrix::from_entries(entries))
    }

    async fn list_matrix(&self, category: Option<Category>, tier: Option<Tier>) -> Result<Vec<PriceMatrixEntry>> {
        let rows = sqlx::query_as::<_, MatrixRow>(
            "SELECT * FROM price_matrix WHERE ($1::text IS NULL OR category = $1) AND ($2::text IS NULL OR tier = $2) \
             ORDER BY category, tier, length_cm",
        )
        .bind(category.map(|c| c.as_str()))
        .bind(tier.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await?;
        let mut entries = rows.into_iter().map(PriceMatrixEntry::try_from).collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|e| (e.category.as_str(), e.tier, e.length_cm));
        Ok(entries)
    }

    async fn upsert_matrix_entry(&self, entry: &PriceMatrixEntry) -> Result<PriceMatrixEntry> {
        sqlx::query_as::<_, MatrixRow>(
            "INSERT INTO price_matrix (id, category, tier, length_cm, price_per_gram, currency, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (category, tier, length_cm) DO UPDATE SET price_per_gram = EXCLUDED.price_per_gram, \
             currency = EXCLUDED.currency, updated_at = EXCLUDED.updated_at RETURNING *",
        )
        .bind(entry.id).bind(entry.category.as_str()).bind(entry.tier.as_str()).bind(i32::from(entry.length_cm.value()))
        .bind(entry.price_per_gram).bind(&entry.currency).bind(entry.updated_at)
        .fetch_one(&self.pool)
        .await?
        .try_into()
    }

    async fn delete_matrix_entry(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM price_matrix WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn reprice_skus(&self, key: &MatrixKey, price_per_gram: Decimal) -> Result<Vec<Sku>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, SkuRow>(
            "SELECT * FROM skus WHERE category = $1 AND tier = $2 AND length_cm = $3 ORDER BY id FOR UPDATE",
        )
        .bind(key.category.as_str()).bind(key.tier.as_str()).bind(i32::from(key.length_cm.value()))
        .fetch_all(&mut *tx)
        .await?;

        let mut changed = Vec::new();
        for row in rows {
            let mut sku = Sku::try_from(row)?;
            if !sku.reprice(price_per_gram)? { continue; }
            sqlx::query("UPDATE skus SET price_per_gram = $2, price = $3, updated_at = $4 WHERE id = $1")
                .bind(sku.id).bind(sku.price_per_gram).bind(sku.price).bind(sku.updated_at)
                .execute(&mut *tx)
                .await?;
            changed.push(sku);
        }
        tx.commit().await?;
        Ok(changed)
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, mut draft: OrderDraft, coupon_code: Option<&str>) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        if let Some(code) = coupon_code.map(normalize_code) {
            let coupon: Coupon = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1 FOR UPDATE")
                .bind(&code)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(EcommerceError::NotFound("coupon"))?
                .try_into()?;
            draft.discount = coupon.evaluate(draft.subtotal()?, Utc::now())?;
            draft.coupon_code = Some(code.clone());

            let redeemed = sqlx::query(
                "UPDATE coupons SET used_count = used_count + 1 \
                 WHERE code = $1 AND active AND (usage_limit IS NULL OR used_count < usage_limit)",
            )
            .bind(&code)
            .execute(&mut *tx)
            .await?;
            if redeemed.rows_affected() == 0 { return Err(CouponError::Exhausted.into()); }
        }

        let seq: i64 = sqlx::query_scalar("SELECT nextval('order_number_seq')").fetch_one(&mut *tx).await?;
        let seq = u64::try_from(seq).map_err(|_| corrupt("order_number_seq", seq))?;
        let order = Order::place(order_number(seq), draft)?;
        insert_order(&mut *tx, &order).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };
        let mut items = fetch_items(&self.pool, &[id]).await?;
        row.into_order(items.remove(&id).unwrap_or_default()).map(Some)
    }

    async fn list_orders(&self, status: Option<OrderStatus>, page: u32, per_page: u32) -> Result<(Vec<Order>, u64)> {
        let status = status.map(|s| s.as_str());
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC, order_number DESC LIMIT $2 OFFSET $3",
        )
        .bind(status)
        .bind(i64::from(per_page))
        .bind(i64::from(page.saturating_sub(1)) * i64::from(per_page))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = fetch_items(&self.pool, &ids).await?;
        let orders = rows
            .into_iter()
            .map(|r| { let id = r.id; r.into_order(items.remove(&id).unwrap_or_default()) })
            .collect::<Result<Vec<_>>>()?;
        Ok((orders, total.max(0) as u64))
    }

    async fn commit_transition(&self, t: &OrderTransition) -> Result<Vec<AppliedMovement>> {
        let mut tx = self.pool.begin().await?;
        let order = &t.order;

        let actual: i32 = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(EcommerceError::NotFound("order"))?;
        if actual != t.expected_version {
            return Err(OrderError::StaleVersion { expected: t.expected_version, actual }.into());
        }

        sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, delivery_status = $4, tracking_number = $5, admin_note = $6, \
             stock_deducted = $7, version = $8, updated_at = $9 WHERE id = $1",
        )
        .bind(order.id).bind(order.status.as_str()).bind(order.payment_status.as_str()).bind(order.delivery_status.as_str())
        .bind(&order.tracking_number).bind(&order.admin_note).bind(order.stock_deducted).bind(order.version)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        // Lock in id order so concurrent transitions touching the same SKUs cannot deadlock.
        let mut ids: Vec<Uuid> = t.stock_movements.iter().map(|m| m.sku_id).collect();
        ids.sort();
        ids.dedup();
        let mut skus: HashMap<Uuid, Sku> = HashMap::new();
        if !ids.is_empty() {
            let rows = sqlx::query_as::<_, SkuRow>("SELECT * FROM skus WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await?;
            for row in rows {
                let sku = Sku::try_from(row)?;
                skus.insert(sku.id, sku);
            }
            if skus.len() != ids.len() { return Err(EcommerceError::NotFound("SKU")); }
        }

        let mut applied = Vec::with_capacity(t.stock_movements.len());
        for m in &t.stock_movements {
            let sku = skus.get_mut(&m.sku_id).ok_or(EcommerceError::NotFound("SKU"))?;
            let change = sku.adjust_stock(m.delta);
            sqlx::query("UPDATE skus SET stock = $2, updated_at = $3 WHERE id = $1")
                .bind(sku.id).bind(sku.stock).bind(sku.updated_at)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO inventory_movements (id, sku_id, order_id, delta, stock_before, stock_after, shortfall, reason, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(Uuid::now_v7()).bind(m.sku_id).bind(order.id).bind(m.delta).bind(change.before).bind(change.after)
            .bind(change.shortfall).bind(m.reason.as_str()).bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
            applied.push(AppliedMovement { movement: m.clone(), change });
        }

        for h in &t.history {
            sqlx::query(
                "INSERT INTO order_status_history (id, order_id, field, from_value, to_value, note, changed_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(h.id).bind(h.order_id).bind(h.field.as_str()).bind(&h.from).bind(&h.to).bind(&h.note)
            .bind(&h.changed_by).bind(h.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(applied)
    }

    async fn order_history(&self, order_id: Uuid) -> Result<Vec<StatusChange>> {
        let rows = sqlx::query_as::<_, HistoryRow>("SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY created_at, id")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(StatusChange::try_from).collect()
    }

    async fn issue_invoice(&self, order_id: Uuid, prefix: &str) -> Result<Invoice> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(EcommerceError::NotFound("order"))?;

        // Checked under the order lock so two callers cannot both number an invoice.
        if let Some(existing) = sqlx::query_as::<_, InvoiceRow>("SELECT * FROM invoices WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
        {
            return Ok(existing.into());
        }

        let mut items = fetch_items(&mut *tx, &[order_id]).await?;
        let order = row.into_order(items.remove(&order_id).unwrap_or_default())?;
        let now = Utc::now();
        let seq: i32 = sqlx::query_scalar(
            "INSERT INTO invoice_counters (year, last_seq) VALUES ($1, 1) \
             ON CONFLICT (year) DO UPDATE SET last_seq = invoice_counters.last_seq + 1 RETURNING last_seq",
        )
        .bind(now.year())
        .fetch_one(&mut *tx)
        .await?;
        let seq = u32::try_from(seq).map_err(|_| corrupt("invoice_counters.last_seq", seq))?;
        let invoice = Invoice::for_order(&order, invoice_number(prefix, now.year(), seq), now);

        sqlx::query(
            "INSERT INTO invoices (id, number, order_id, order_number, customer_name, customer_email, billing_address, lines, \
             subtotal, discount, shipping, total, currency, issued_at, due_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(invoice.id).bind(&invoice.number).bind(invoice.order_id).bind(&invoice.order_number)
        .bind(&invoice.customer_name).bind(&invoice.customer_email).bind(&invoice.billing_address)
        .bind(Json(&invoice.lines)).bind(invoice.subtotal).bind(invoice.discount).bind(invoice.shipping)
        .bind(invoice.total).bind(&invoice.currency).bind(invoice.issued_at).bind(invoice.due_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE orders SET invoice_number = $2 WHERE id = $1")
            .bind(order_id)
            .bind(&invoice.number)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(invoice)
    }

    async fn get_invoice(&self, order_id: Uuid) -> Result<Option<Invoice>> {
        Ok(sqlx::query_as::<_, InvoiceRow>("SELECT * FROM invoices WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Invoice::from))
    }
}

// =============================================================================
// Coupons and rates
// =============================================================================

#[async_trait]
impl CouponStore for PgStore {
    async fn create_coupon(&self, c: &Coupon) -> Result<()> {
        sqlx::query(
            "INSERT INTO coupons (id, code, kind, value, min_order_total, usage_limit, used_count, valid_from, valid_until, \
             active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(c.id).bind(&c.code).bind(c.kind.as_str()).bind(c.value).bind(c.min_order_total).bind(c.usage_limit)
        .bind(c.used_count).bind(c.valid_from).bind(c.valid_until).bind(c.active).bind(c.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_or(e, || EcommerceError::DuplicateCoupon(c.code.clone())))?;
        Ok(())
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(Coupon::try_from)
            .transpose()
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    async fn deactivate_coupon(&self, code: &str) -> Result<bool> {
        let done = sqlx::query("UPDATE coupons SET active = FALSE WHERE code = $1").bind(code).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl RateStore for PgStore {
    async fn get_rate(&self, base: &str, quote: &str) -> Result<Option<ExchangeRate>> {
        Ok(sqlx::query_as::<_, RateRow>("SELECT * FROM exchange_rates WHERE base = $1 AND quote = $2")
            .bind(base)
            .bind(quote)
            .fetch_optional(&self.pool)
            .await?
            .map(ExchangeRate::from))
    }

    async fn put_rate(&self, rate: &ExchangeRate) -> Result<()> {
        sqlx::query(
            "INSERT INTO exchange_rates (base, quote, rate, updated_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (base, quote) DO UPDATE SET rate = EXCLUDED.rate, updated_at = EXCLUDED.updated_at",
        )
        .bind(&rate.base).bind(&rate.quote).bind(rate.rate).bind(rate.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_filter_sql() {
        let filter = ProductFilter::parse([("category", "weft"), ("length", "40-"), ("q", "blond 613"), ("sort", "price")]);
        let mut qb = QueryBuilder::new("SELECT * FROM skus");
        push_sku_filter(&mut qb, &filter);
        qb.push(sort_clause(filter.sort));
        assert_eq!(
            qb.sql(),
            "SELECT * FROM skus WHERE TRUE AND active AND category = ANY($1) AND length_cm >= $2 \
             AND (code || ' ' || name || ' ' || shade) ILIKE $3 AND (code || ' ' || name || ' ' || shade) ILIKE $4 \
             ORDER BY price, code"
        );
    }

    #[test]
    fn test_sku_update_writes_named_columns_only() {
        use crate::domain::aggregates::SkuDraft;
        use crate::domain::value_objects::{LengthCm, Shade};
        use rust_decimal_macros::dec;

        let key = MatrixKey { category: Category::Weft, tier: Tier::Luxe, length_cm: LengthCm::new(55).unwrap() };
        let matrix = PriceMatrix::from_entries(vec![PriceMatrixEntry::new(key, dec!(40), "CZK").unwrap()]);
        let sku = SkuDraft {
            category: Category::Weft, tier: Tier::Luxe, shade: Shade::new("6").unwrap(), length_cm: LengthCm::new(55).unwrap(),
            sale_mode: SaleMode::PieceByWeight, weight_g: Some(100), stock: 3, name: None,
        }.resolve(&matrix, "CZK").unwrap();

        let rename = SkuUpdate { name: Some("Weft 55 cm".into()), ..SkuUpdate::default() };
        assert_eq!(sku_update_query(&sku, &rename).sql(), "UPDATE skus SET updated_at = $1, name = $2 WHERE id = $3");

        let recount = SkuUpdate { stock: Some(8), price_per_gram: Some(dec!(42)), ..SkuUpdate::default() };
        assert_eq!(
            sku_update_query(&sku, &recount).sql(),
            "UPDATE skus SET updated_at = $1, stock = $2, price_per_gram = $3, price = $4 WHERE id = $5"
        );
    }
}
