use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::errors::{ApiError, ApiResult};
use super::PaginatedResponse;
use crate::application::{CheckoutRequest, OrderUpdateOutcome, Services};
use crate::domain::aggregates::{Coupon, CouponSpec, Invoice, Order, OrderPatch, OrderStatus, StatusChange};
use crate::domain::value_objects::validate_amount;
use crate::EcommerceError;

pub async fn checkout(State(s): State<Services>, Json(r): Json<CheckoutRequest>) -> ApiResult<(StatusCode, Json<Order>)> {
    Ok((StatusCode::CREATED, Json(s.place_order(r).await?)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams { pub status: Option<String>, pub page: Option<u32>, pub per_page: Option<u32> }

pub async fn list_orders(State(s): State<Services>, Query(p): Query<ListParams>) -> ApiResult<Json<PaginatedResponse<Order>>> {
    let status = match p.status.as_deref().filter(|v| !v.is_empty()) {
        Some(v) => Some(OrderStatus::parse(v).ok_or_else(|| ApiError::bad_request(format!("unknown status '{v}'")))?),
        None => None,
    };
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    let (data, total) = s.list_orders(status, page, per_page).await?;
    Ok(Json(PaginatedResponse { data, total, page, per_page }))
}

pub async fn get_order(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<Json<Order>> {
    Ok(Json(s.get_order(id).await?))
}

pub async fn update_order(State(s): State<Services>, Path(id): Path<Uuid>, Json(patch): Json<OrderPatch>) -> ApiResult<Json<OrderUpdateOutcome>> {
    Ok(Json(s.update_order(id, patch).await?))
}

pub async fn order_history(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<Json<Vec<StatusChange>>> {
    Ok(Json(s.order_history(id).await?))
}

pub async fn order_invoice(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<Json<Invoice>> {
    Ok(Json(s.order_invoice(id).await?))
}

pub async fn list_coupons(State(s): State<Services>) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(s.list_coupons().await?))
}

pub async fn create_coupon(State(s): State<Services>, Json(spec): Json<CouponSpec>) -> ApiResult<(StatusCode, Json<Coupon>)> {
    Ok((StatusCode::CREATED, Json(s.create_coupon(spec).await?)))
}

pub async fn delete_coupon(State(s): State<Services>, Path(code): Path<String>) -> ApiResult<StatusCode> {
    s.deactivate_coupon(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(custom = "validate_amount")]
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ValidateCouponResponse { pub code: String, pub discount: Decimal, pub total: Decimal }

pub async fn validate_coupon(State(s): State<Services>, Json(r): Json<ValidateCouponRequest>) -> ApiResult<Json<ValidateCouponResponse>> {
    r.validate().map_err(EcommerceError::from)?;
    let (coupon, discount) = s.validate_coupon(&r.code, r.subtotal).await?;
    Ok(Json(ValidateCouponResponse { code: coupon.code, discount, total: r.subtotal - discount }))
}
