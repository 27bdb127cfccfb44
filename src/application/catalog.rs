use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::Services;
use crate::domain::aggregates::{MatrixKey, PriceMatrixEntry, Sku, SkuDraft, SkuUpdate};
use crate::domain::events::{CatalogEvent, DomainEvent};
use crate::domain::feed::{build_feed, FeedItem};
use crate::domain::search::{ProductFilter, SortOrder};
use crate::domain::seo::SeoContent;
use crate::domain::value_objects::{validate_price_per_gram, Category, LengthCm, Tier};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct MatrixUpsert {
    pub category: Category,
    pub tier: Tier,
    pub length_cm: LengthCm,
    #[validate(custom = "validate_price_per_gram")]
    pub price_per_gram: Decimal,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
}

impl Services {
    pub async fn list_skus(&self, filter: &ProductFilter) -> Result<(Vec<Sku>, u64)> {
        self.store.list_skus(filter).await
    }

    pub async fn get_sku(&self, id: Uuid) -> Result<Sku> {
        self.store.get_sku(id).await?.ok_or(EcommerceError::NotFound("SKU"))
    }

    /// Prices a wizard draft without saving it.
    pub async fn preview_sku(&self, draft: &SkuDraft) -> Result<Sku> {
        draft.validate()?;
        let matrix = self.store.price_matrix().await?;
        Ok(draft.resolve(&matrix, &self.config.default_currency)?)
    }

    pub async fn create_sku(&self, draft: &SkuDraft) -> Result<Sku> {
        let sku = self.preview_sku(draft).await?;
        self.store.insert_sku(&sku).await?;
        tracing::info!(sku = %sku.code, price = %sku.price, "SKU created");
        self.publish(DomainEvent::Catalog(CatalogEvent::SkuCreated { sku_id: sku.id, code: sku.code.clone() })).await;
        Ok(sku)
    }

    pub async fn update_sku(&self, id: Uuid, update: SkuUpdate) -> Result<Sku> {
        update.validate()?;
        let sku = self.store.update_sku(id, &update).await?;
        if let Some(stock) = update.stock {
            tracing::info!(sku = %sku.code, stock, "SKU stock set by admin");
        }
        Ok(sku)
    }

    /// Soft delete: the SKU stays referenced by past orders.
    pub async fn deactivate_sku(&self, id: Uuid) -> Result<Sku> {
        let sku = self.store.update_sku(id, &SkuUpdate { active: Some(false), ..SkuUpdate::default() }).await?;
        tracing::info!(sku = %sku.code, "SKU deactivated");
        Ok(sku)
    }

    pub async fn sku_seo(&self, id: Uuid) -> Result<SeoContent> {
        let sku = self.get_sku(id).await?;
        Ok(SeoContent::for_sku(&sku, &self.config.store_name, &self.config.public_base_url))
    }

    pub async fn product_feed(&self) -> Result<Vec<FeedItem>> {
        let filter = ProductFilter { per_page: u32::MAX, sort: SortOrder::LengthAsc, ..ProductFilter::default() };
        let (skus, _) = self.store.list_skus(&filter).await?;
        Ok(build_feed(&skus, &self.config.store_name, &self.config.public_base_url))
    }

    pub async fn list_price_matrix(&self, category: Option<Category>, tier: Option<Tier>) -> Result<Vec<PriceMatrixEntry>> {
        self.store.list_matrix(category, tier).await
    }

    /// Saves a matrix price. With `reprice`, SKUs on the same cell take the new price.
    pub async fn upsert_price(&self, input: MatrixUpsert, reprice: bool) -> Result<(PriceMatrixEntry, u64)> {
        input.validate()?;
        let key = MatrixKey { category: input.category, tier: input.tier, length_cm: input.length_cm };
        let currency = input.currency.unwrap_or_else(|| self.config.default_currency.clone());
        let entry = PriceMatrixEntry::new(key.clone(), input.price_per_gram.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero), &currency)?;
        let entry = self.store.upsert_matrix_entry(&entry).await?;
        tracing::info!(category = %key.category, tier = %key.tier, length = key.length_cm.value(), price_per_gram = %entry.price_per_gram, "price matrix updated");

        if !reprice { return Ok((entry, 0)); }
        let changed = self.store.reprice_skus(&key, entry.price_per_gram).await?;
        let count = changed.len() as u64;
        if count > 0 {
            tracing::info!(count, "SKUs repriced");
            self.publish(DomainEvent::Catalog(CatalogEvent::SkusRepriced {
                category: key.category.to_string(), tier: key.tier.to_string(), length_cm: key.length_cm.value(), count,
            })).await;
        }
        Ok((entry, count))
    }

    pub async fn delete_price(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_matrix_entry(id).await? { return Err(EcommerceError::NotFound("price matrix entry")); }
        Ok(())
    }
}
