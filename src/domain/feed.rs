//! Merchant catalog feed rows.

use serde::Serialize;
use crate::domain::aggregates::Sku;
use crate::domain::seo::{product_url, truncate_words, SeoContent};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub price: String,
    pub availability: &'static str,
    pub brand: String,
    pub product_type: String,
    pub color: String,
}

impl FeedItem {
    /// `None` for SKUs that are not sold any more.
    pub fn from_sku(sku: &Sku, store_name: &str, base_url: &str) -> Option<Self> {
        if !sku.active { return None; }
        let seo = SeoContent::for_sku(sku, store_name, base_url);
        Some(Self {
            id: sku.code.clone(),
            title: truncate_words(&sku.name, 150),
            description: seo.description,
            link: product_url(base_url, &sku.slug),
            price: format!("{:.2} {}", sku.price, sku.currency),
            availability: if sku.is_in_stock() { "in_stock" } else { "out_of_stock" },
            brand: store_name.to_string(),
            product_type: format!("{} > {}", sku.category.label(), sku.tier.label()),
            color: sku.shade.to_string(),
        })
    }
}

pub fn build_feed<'a>(skus: impl IntoIterator<Item = &'a Sku>, store_name: &str, base_url: &str) -> Vec<FeedItem> {
    skus.into_iter().filter_map(|s| FeedItem::from_sku(s, store_name, base_url)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{MatrixKey, PriceMatrix, PriceMatrixEntry, SkuDraft};
    use crate::domain::value_objects::{Category, LengthCm, SaleMode, Shade, Tier};
    use rust_decimal_macros::dec;

    #[test]
    fn test_feed_skips_inactive() {
        let key = MatrixKey { category: Category::Ponytail, tier: Tier::Standard, length_cm: LengthCm::new(45).unwrap() };
        let matrix = PriceMatrix::from_entries(vec![PriceMatrixEntry::new(key, dec!(9.9), "CZK").unwrap()]);
        let draft = SkuDraft {
            category: Category::Ponytail, tier: Tier::Standard, shade: Shade::new("1B").unwrap(),
            length_cm: LengthCm::new(45).unwrap(), sale_mode: SaleMode::PieceByWeight, weight_g: Some(120), stock: 0, name: None,
        };
        let live = draft.resolve(&matrix, "CZK").unwrap();
        let mut gone = live.clone();
        gone.active = false;

        let feed = build_feed([&live, &gone], "Hairstore", "https://shop.example");
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].price, "1188.00 CZK");
        assert_eq!(feed[0].availability, "out_of_stock");
        assert_eq!(feed[0].product_type, "Ponytail > Standard");
    }
}
