//! Storefront search and filter parsing.
//!
//! Query parameters come straight from storefront URLs, so parsing is lenient:
//! unknown keys and malformed values are dropped rather than rejected.

use serde::Serialize;
use std::cmp::Ordering;
use crate::domain::aggregates::Sku;
use crate::domain::value_objects::{Category, SaleMode, Tier};

pub const DEFAULT_PER_PAGE: u32 = 24;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder { #[default] Newest, PriceAsc, PriceDesc, LengthAsc, LengthDesc }

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Some(Self::Newest),
            "price_asc" | "price" => Some(Self::PriceAsc),
            "price_desc" => Some(Self::PriceDesc),
            "length_asc" | "length" => Some(Self::LengthAsc),
            "length_desc" => Some(Self::LengthDesc),
            _ => None,
        }
    }

    pub fn compare(&self, a: &Sku, b: &Sku) -> Ordering {
        match self {
            Self::Newest => b.created_at.cmp(&a.created_at),
            Self::PriceAsc => a.price.cmp(&b.price),
            Self::PriceDesc => b.price.cmp(&a.price),
            Self::LengthAsc => a.length_cm.cmp(&b.length_cm),
            Self::LengthDesc => b.length_cm.cmp(&a.length_cm),
        }
        .then_with(|| a.code.cmp(&b.code))
    }
}

/// Inclusive length bounds in centimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LengthRange { pub min: Option<u16>, pub max: Option<u16> }

impl LengthRange {
    /// Accepts `45`, `40-60`, `40-` and `-60`. A reversed range is swapped.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let num = |v: &str| -> Option<Option<u16>> {
            let v = v.trim();
            if v.is_empty() { Some(None) } else { v.parse::<u16>().ok().map(Some) }
        };
        let range = match s.split_once('-') {
            None => { let v = num(s)??; Self { min: Some(v), max: Some(v) } }
            Some((lo, hi)) => Self { min: num(lo)?, max: num(hi)? },
        };
        match (range.min, range.max) {
            (None, None) => None,
            (Some(lo), Some(hi)) if lo > hi => Some(Self { min: Some(hi), max: Some(lo) }),
            _ => Some(range),
        }
    }

    pub fn contains(&self, value: u16) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProductFilter {
    pub q: Option<String>,
    pub categories: Vec<Category>,
    pub tiers: Vec<Tier>,
    pub shades: Vec<String>,
    pub length: LengthRange,
    pub sale_mode: Option<SaleMode>,
    pub in_stock: bool,
    pub include_inactive: bool,
    pub sort: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            q: None, categories: vec![], tiers: vec![], shades: vec![], length: LengthRange::default(),
            sale_mode: None, in_stock: false, include_inactive: false, sort: SortOrder::default(),
            page: 1, per_page: DEFAULT_PER_PAGE,
        }
    }
}

fn list<T>(value: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> where T: PartialEq {
    let mut out = Vec::new();
    for v in value.split(',').filter_map(|v| parse(v)) {
        if !out.contains(&v) { out.push(v); }
    }
    out
}

fn flag(value: &str) -> bool { matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on") }

impl ProductFilter {
    pub fn parse<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            let value = value.as_ref();
            match key.as_ref() {
                "q" | "search" => {
                    let q = value.split_whitespace().collect::<Vec<_>>().join(" ");
                    filter.q = Some(q).filter(|q| !q.is_empty());
                }
                "category" => filter.categories = list(value, Category::parse),
                "tier" => filter.tiers = list(value, Tier::parse),
                "shade" => filter.shades = list(value, |s| Some(s.trim().to_uppercase()).filter(|s| !s.is_empty())),
                "length" => filter.length = LengthRange::parse(value).unwrap_or_default(),
                "mode" | "sale_mode" => filter.sale_mode = SaleMode::parse(value),
                "in_stock" => filter.in_stock = flag(value),
                "include_inactive" => filter.include_inactive = flag(value),
                "sort" => filter.sort = SortOrder::parse(value).unwrap_or_default(),
                "page" => filter.page = value.trim().parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1),
                "per_page" => {
                    filter.per_page = value.trim().parse::<u32>().ok().filter(|p| *p > 0).map_or(DEFAULT_PER_PAGE, |p| p.min(MAX_PER_PAGE));
                }
                _ => {}
            }
        }
        filter
    }

    pub fn offset(&self) -> u64 { u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page) }

    pub fn matches(&self, sku: &Sku) -> bool {
        if !self.include_inactive && !sku.active { return false; }
        if self.in_stock && sku.stock <= 0 { return false; }
        if !self.categories.is_empty() && !self.categories.contains(&sku.category) { return false; }
        if !self.tiers.is_empty() && !self.tiers.contains(&sku.tier) { return false; }
        if !self.shades.is_empty() && !self.shades.iter().any(|s| s == sku.shade.as_str()) { return false; }
        if !self.length.contains(sku.length_cm.value()) { return false; }
        if self.sale_mode.is_some_and(|m| m != sku.sale_mode) { return false; }
        if let Some(q) = &self.q {
            let q = q.to_lowercase();
            let haystack = format!("{} {} {}", sku.code, sku.name, sku.shade).to_lowercase();
            if !q.split(' ').all(|term| haystack.contains(term)) { return false; }
        }
        true
    }

    /// Filters, sorts and pages `skus`. Returns the page and the total match count.
    pub fn apply(&self, skus: impl IntoIterator<Item = Sku>) -> (Vec<Sku>, u64) {
        let mut matched: Vec<Sku> = skus.into_iter().filter(|s| self.matches(s)).collect();
        matched.sort_by(|a, b| self.sort.compare(a, b));
        let total = matched.len() as u64;
        let page = matched.into_iter().skip(self.offset() as usize).take(self.per_page as usize).collect();
        (page, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{MatrixKey, PriceMatrix, PriceMatrixEntry, SkuDraft};
    use crate::domain::value_objects::{LengthCm, Shade};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_lenient() {
        let f = ProductFilter::parse([
            ("category", "clip-in, tape_in,wig"), ("tier", "LUXE"), ("length", "60-40"), ("shade", "613,613"),
            ("sort", "price_desc"), ("per_page", "500"), ("page", "0"), ("in_stock", "true"), ("bogus", "1"),
        ]);
        assert_eq!(f.categories, vec![Category::ClipIn, Category::TapeIn]);
        assert_eq!(f.tiers, vec![Tier::Luxe]);
        assert_eq!(f.length, LengthRange { min: Some(40), max: Some(60) });
        assert_eq!(f.shades, vec!["613".to_string()]);
        assert_eq!(f.sort, SortOrder::PriceDesc);
        assert_eq!((f.page, f.per_page), (1, MAX_PER_PAGE));
        assert!(f.in_stock);
    }

    #[test]
    fn test_length_range_forms() {
        assert_eq!(LengthRange::parse("45"), Some(LengthRange { min: Some(45), max: Some(45) }));
        assert_eq!(LengthRange::parse("40-"), Some(LengthRange { min: Some(40), max: None }));
        assert_eq!(LengthRange::parse("-60"), Some(LengthRange { min: None, max: Some(60) }));
        assert_eq!(LengthRange::parse("abc"), None);
        assert_eq!(LengthRange::parse("-"), None);
    }

    fn sku(tier: Tier, len: u16, stock: i32) -> Sku {
        let key = MatrixKey { category: Category::Keratin, tier, length_cm: LengthCm::new(len).unwrap() };
        let matrix = PriceMatrix::from_entries(vec![PriceMatrixEntry::new(key, dec!(10) + Decimal::from(len), "CZK").unwrap()]);
        SkuDraft {
            category: Category::Keratin, tier, shade: Shade::new("10").unwrap(), length_cm: LengthCm::new(len).unwrap(),
            sale_mode: SaleMode::BulkG, weight_g: None, stock, name: None,
        }.resolve(&matrix, "CZK").unwrap()
    }

    #[test]
    fn test_apply_filters_sorts_and_pages() {
        let skus = vec![sku(Tier::Luxe, 50, 10), sku(Tier::Luxe, 40, 0), sku(Tier::Luxe, 60, 5), sku(Tier::Standard, 55, 3)];
        let f = ProductFilter::parse([("tier", "luxe"), ("sort", "price_asc"), ("per_page", "1"), ("page", "2")]);
        let (page, total) = f.apply(skus.clone());
        assert_eq!(total, 3);
        assert_eq!(page[0].length_cm.value(), 50);

        let f = ProductFilter::parse([("in_stock", "1"), ("length", "50-"), ("q", "keratin 10")]);
        let (page, total) = f.apply(skus);
        assert_eq!(total, 3);
        assert!(page.iter().all(|s| s.stock > 0 && s.length_cm.value() >= 50));
    }
}
