use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::errors::{ApiError, ApiResult};
use crate::application::{MatrixUpsert, RateUpdate, Services};
use crate::domain::aggregates::PriceMatrixEntry;
use crate::domain::exchange::ExchangeRate;
use crate::domain::value_objects::{validate_amount, Category, Tier};
use crate::EcommerceError;

#[derive(Debug, Deserialize)]
pub struct MatrixParams { pub category: Option<String>, pub tier: Option<String> }

#[derive(Debug, Deserialize)]
pub struct UpsertParams { #[serde(default)] pub reprice: bool }

#[derive(Debug, Serialize)]
pub struct UpsertResponse { pub entry: PriceMatrixEntry, pub repriced: u64 }

pub async fn list_matrix(State(s): State<Services>, Query(p): Query<MatrixParams>) -> ApiResult<Json<Vec<PriceMatrixEntry>>> {
    let category = p.category.as_deref().map(|c| Category::parse(c).ok_or_else(|| ApiError::bad_request(format!("unknown category '{c}'")))).transpose()?;
    let tier = p.tier.as_deref().map(|t| Tier::parse(t).ok_or_else(|| ApiError::bad_request(format!("unknown tier '{t}'")))).transpose()?;
    Ok(Json(s.list_price_matrix(category, tier).await?))
}

pub async fn upsert_matrix(State(s): State<Services>, Query(p): Query<UpsertParams>, Json(r): Json<MatrixUpsert>) -> ApiResult<Json<UpsertResponse>> {
    let (entry, repriced) = s.upsert_price(r, p.reprice).await?;
    Ok(Json(UpsertResponse { entry, repriced }))
}

pub async fn delete_matrix(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    s.delete_price(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RateParams {
    pub from: Option<String>,
    pub to: Option<String>,
    #[validate(custom = "validate_amount")]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted: Option<Decimal>,
}

/// Defaults to EUR into the store currency.
pub async fn get_rate(State(s): State<Services>, Query(p): Query<RateParams>) -> ApiResult<Json<RateResponse>> {
    p.validate().map_err(EcommerceError::from)?;
    let from = p.from.unwrap_or_else(|| "EUR".to_string());
    let to = p.to.unwrap_or_else(|| s.config.default_currency.clone());
    let rate = s.exchange_rate(&from, &to).await?;
    let converted = p.amount
        .map(|a| rate.convert(a).ok_or_else(|| ApiError::bad_request("amount too large to convert")))
        .transpose()?;
    Ok(Json(RateResponse {
        converted, amount: p.amount,
        base: rate.base, quote: rate.quote, rate: rate.rate, updated_at: rate.updated_at,
    }))
}

pub async fn put_rate(State(s): State<Services>, Json(r): Json<RateUpdate>) -> ApiResult<Json<ExchangeRate>> {
    Ok(Json(s.set_exchange_rate(r).await?))
}
