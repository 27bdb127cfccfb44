use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use super::errors::ApiResult;
use super::PaginatedResponse;
use crate::application::Services;
use crate::domain::aggregates::{Sku, SkuDraft, SkuUpdate};
use crate::domain::feed::FeedItem;
use crate::domain::search::ProductFilter;
use crate::domain::seo::SeoContent;

pub async fn list_skus(State(s): State<Services>, Query(params): Query<Vec<(String, String)>>) -> ApiResult<Json<PaginatedResponse<Sku>>> {
    let filter = ProductFilter::parse(params);
    let (data, total) = s.list_skus(&filter).await?;
    Ok(Json(PaginatedResponse { data, total, page: filter.page, per_page: filter.per_page }))
}

pub async fn create_sku(State(s): State<Services>, Json(draft): Json<SkuDraft>) -> ApiResult<(StatusCode, Json<Sku>)> {
    Ok((StatusCode::CREATED, Json(s.create_sku(&draft).await?)))
}

pub async fn preview_sku(State(s): State<Services>, Json(draft): Json<SkuDraft>) -> ApiResult<Json<Sku>> {
    Ok(Json(s.preview_sku(&draft).await?))
}

pub async fn get_sku(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<Json<Sku>> {
    Ok(Json(s.get_sku(id).await?))
}

pub async fn update_sku(State(s): State<Services>, Path(id): Path<Uuid>, Json(r): Json<SkuUpdate>) -> ApiResult<Json<Sku>> {
    Ok(Json(s.update_sku(id, r).await?))
}

pub async fn delete_sku(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    s.deactivate_sku(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn sku_seo(State(s): State<Services>, Path(id): Path<Uuid>) -> ApiResult<Json<SeoContent>> {
    Ok(Json(s.sku_seo(id).await?))
}

pub async fn product_feed(State(s): State<Services>) -> ApiResult<Json<Vec<FeedItem>>> {
    Ok(Json(s.product_feed().await?))
}
