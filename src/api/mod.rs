//! HTTP JSON interface
//!
//! Thin axum handlers over [`Services`]. Every route shares the same error
//! shape, see [`errors::ApiError`].

pub mod errors;
mod catalog;
mod orders;
mod pricing;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::application::Services;

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: u64, pub page: u32, pub per_page: u32 }

pub fn router(services: Services) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "hairstore"})) }))
        .route("/api/sku", get(catalog::list_skus).post(catalog::create_sku))
        .route("/api/sku/preview", post(catalog::preview_sku))
        .route("/api/sku/:id", get(catalog::get_sku).put(catalog::update_sku).delete(catalog::delete_sku))
        .route("/api/sku/:id/seo", get(catalog::sku_seo))
        .route("/api/feed/products", get(catalog::product_feed))
        .route("/api/price-matrix", get(pricing::list_matrix).post(pricing::upsert_matrix))
        .route("/api/price-matrix/:id", delete(pricing::delete_matrix))
        .route("/api/exchange-rate", get(pricing::get_rate).put(pricing::put_rate))
        .route("/api/orders", post(orders::checkout))
        .route("/api/coupons/validate", post(orders::validate_coupon))
        .route("/api/admin/orders", get(orders::list_orders))
        .route("/api/admin/orders/:id", get(orders::get_order).patch(orders::update_order))
        .route("/api/admin/orders/:id/history", get(orders::order_history))
        .route("/api/admin/orders/:id/invoice", get(orders::order_invoice))
        .route("/api/admin/coupons", get(orders::list_coupons).post(orders::create_coupon))
        .route("/api/admin/coupons/:code", delete(orders::delete_coupon))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(services)
}
