//! SEO metadata generated from SKU attributes.

use serde::Serialize;
use serde_json::json;
use crate::domain::aggregates::Sku;

pub const TITLE_MAX: usize = 60;
pub const DESCRIPTION_MAX: usize = 160;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeoContent {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    pub json_ld: serde_json::Value,
}

impl SeoContent {
    pub fn for_sku(sku: &Sku, store_name: &str, base_url: &str) -> Self {
        let canonical_url = product_url(base_url, &sku.slug);
        let headline = format!("{} {} {} cm, shade {}", sku.tier.label(), sku.category.label(), sku.length_cm.value(), sku.shade);
        let title = truncate_words(&format!("{headline} | {store_name}"), TITLE_MAX);

        let amount = match sku.weight_g {
            Some(w) => format!("{w} g piece"),
            None => "sold by the gram".to_string(),
        };
        let description = truncate_words(
            &format!(
                "{headline}, {amount}. 100% human hair {} extensions in {} quality from {store_name}. Price {:.2} {}.",
                sku.category.label().to_lowercase(), sku.tier.label(), sku.price, sku.currency
            ),
            DESCRIPTION_MAX,
        );

        let availability = if sku.is_in_stock() { "https://schema.org/InStock" } else { "https://schema.org/OutOfStock" };
        let json_ld = json!({
            "@context": "https://schema.org",
            "@type": "Product",
            "name": sku.name,
            "sku": sku.code,
            "brand": { "@type": "Brand", "name": store_name },
            "category": sku.category.label(),
            "color": sku.shade.as_str(),
            "url": canonical_url,
            "offers": {
                "@type": "Offer",
                "price": format!("{:.2}", sku.price),
                "priceCurrency": sku.currency,
                "availability": availability,
                "url": canonical_url,
            }
        });

        Self { title, description, canonical_url, json_ld }
    }
}

pub fn product_url(base_url: &str, slug: &str) -> String {
    format!("{}/products/{}", base_url.trim_end_matches('/'), slug)
}

/// Cuts `text` to at most `max` characters on a word boundary, appending `…` when cut.
pub fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max { return text.to_string(); }
    let budget = max.saturating_sub(1);
    let mut out = String::new();
    for word in text.split_whitespace() {
        let extra = if out.is_empty() { word.chars().count() } else { word.chars().count() + 1 };
        if out.chars().count() + extra > budget { break; }
        if !out.is_empty() { out.push(' '); }
        out.push_str(word);
    }
    if out.is_empty() { out = text.chars().take(budget).collect(); }
    out.trim_end_matches(&[',', '.', ';', ':', '|', '-'][..]).trim_end().to_string() + "…"
}

/// Lowercase ASCII slug. Czech and common Latin diacritics are folded.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        let c = fold(c);
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() { slug.push('-'); }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn fold(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'č' | 'ç' | 'ć' => 'c',
        'ď' => 'd',
        'é' | 'ě' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ľ' | 'ĺ' | 'ł' => 'l',
        'ň' | 'ñ' | 'ń' => 'n',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ř' | 'ŕ' => 'r',
        'š' | 'ś' => 's',
        'ť' => 't',
        'ú' | 'ů' | 'ù' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' | 'ź' | 'ż' => 'z',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{MatrixKey, PriceMatrix, PriceMatrixEntry, SkuDraft};
    use crate::domain::value_objects::{Category, LengthCm, SaleMode, Shade, Tier};
    use rust_decimal_macros::dec;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Příliš žluťoučký kůň"), "prilis-zlutoucky-kun");
        assert_eq!(slugify("  CLIP-LUXE-4/27--50 "), "clip-luxe-4-27-50");
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("short", 10), "short");
        let cut = truncate_words("alpha beta gamma delta", 12);
        assert_eq!(cut, "alpha beta…");
        assert!(cut.chars().count() <= 12);
    }

    #[test]
    fn test_sku_seo() {
        let key = MatrixKey { category: Category::TapeIn, tier: Tier::Platinum, length_cm: LengthCm::new(60).unwrap() };
        let matrix = PriceMatrix::from_entries(vec![PriceMatrixEntry::new(key, dec!(30), "CZK").unwrap()]);
        let sku = SkuDraft {
            category: Category::TapeIn, tier: Tier::Platinum, shade: Shade::new("613").unwrap(),
            length_cm: LengthCm::new(60).unwrap(), sale_mode: SaleMode::PieceByWeight, weight_g: Some(50), stock: 2, name: None,
        }.resolve(&matrix, "CZK").unwrap();
        let seo = SeoContent::for_sku(&sku, "Hairstore", "https://shop.example/");
        assert!(seo.title.chars().count() <= TITLE_MAX);
        assert!(seo.description.chars().count() <= DESCRIPTION_MAX);
        assert_eq!(seo.canonical_url, "https://shop.example/products/tape-plat-613-60-50g");
        assert_eq!(seo.json_ld["offers"]["price"], "1500.00");
        assert_eq!(seo.json_ld["offers"]["availability"], "https://schema.org/InStock");
    }
}
