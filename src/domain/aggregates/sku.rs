//! SKU Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::domain::aggregates::price_matrix::{MatrixKey, PriceMatrix, PriceMatrixError};
use crate::domain::seo::slugify;
use crate::domain::value_objects::{
    round_money, validate_not_blank, validate_price_per_gram, Category, LengthCm, SaleMode, Shade, Tier, MAX_PRICE_PER_GRAM,
    MAX_WEIGHT_G,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub slug: String,
    pub category: Category,
    pub tier: Tier,
    pub shade: Shade,
    pub length_cm: LengthCm,
    pub sale_mode: SaleMode,
    pub weight_g: Option<u32>,
    pub price_per_gram: Decimal,
    /// Price of one sale unit: one gram for `BULK_G`, one piece otherwise.
    pub price: Decimal,
    pub currency: String,
    /// Grams for `BULK_G`, pieces for `PIECE_BY_WEIGHT`.
    pub stock: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input collected by the SKU configuration wizard.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct SkuDraft {
    pub category: Category,
    pub tier: Tier,
    pub shade: Shade,
    pub length_cm: LengthCm,
    pub sale_mode: SaleMode,
    #[serde(default)]
    #[validate(range(min = 1, max = 10000))]
    pub weight_g: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub stock: i32,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub name: Option<String>,
}

/// Admin edits to an existing SKU. Absent fields are left alone; the
/// attributes that make up the code (category, tier, shade, length, weight)
/// are fixed once created.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct SkuUpdate {
    #[validate(length(max = 200), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(range(min = 0))]
    pub stock: Option<i32>,
    pub active: Option<bool>,
    /// Overrides the matrix price per gram for this SKU only.
    #[validate(custom = "validate_price_per_gram")]
    pub price_per_gram: Option<Decimal>,
}

/// Outcome of a stock adjustment. `shortfall` is what could not be taken
/// because stock hit zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockChange { pub before: i32, pub after: i32, pub shortfall: i32 }

impl SkuDraft {
    pub fn matrix_key(&self) -> MatrixKey {
        MatrixKey { category: self.category, tier: self.tier, length_cm: self.length_cm }
    }

    fn check_weight(&self) -> Result<(), SkuError> {
        match (self.sale_mode, self.weight_g) {
            (SaleMode::PieceByWeight, None) | (SaleMode::PieceByWeight, Some(0)) => Err(SkuError::MissingWeight),
            (SaleMode::BulkG, Some(_)) => Err(SkuError::UnexpectedWeight),
            (_, Some(w)) if w > MAX_WEIGHT_G => Err(SkuError::WeightOutOfRange(w)),
            _ if self.stock < 0 => Err(SkuError::NegativeStock),
            _ => Ok(()),
        }
    }

    /// Resolves the draft against the price matrix into a new, unsaved SKU.
    pub fn resolve(&self, matrix: &PriceMatrix, currency: &str) -> Result<Sku, SkuError> {
        self.check_weight()?;
        let per_gram = matrix.price_per_gram(&self.matrix_key())?;
        let code = sku_code(self.category, self.tier, &self.shade, self.length_cm, self.weight_g);
        let name = self.name.clone().filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name(self.category, self.tier, &self.shade, self.length_cm, self.weight_g));
        let now = Utc::now();
        Ok(Sku {
            id: Uuid::now_v7(),
            slug: slugify(&code),
            code,
            name,
            category: self.category,
            tier: self.tier,
            shade: self.shade.clone(),
            length_cm: self.length_cm,
            sale_mode: self.sale_mode,
            weight_g: self.weight_g,
            price_per_gram: per_gram,
            price: unit_price(self.sale_mode, per_gram, self.weight_g)?,
            currency: currency.to_uppercase(),
            stock: self.stock,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Sku {
    pub fn matrix_key(&self) -> MatrixKey {
        MatrixKey { category: self.category, tier: self.tier, length_cm: self.length_cm }
    }

    pub fn is_in_stock(&self) -> bool { self.active && self.stock > 0 }

    /// `None` when the line total does not fit a `Decimal`.
    pub fn unit_price_for(&self, quantity: u32) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(quantity)).map(round_money)
    }

    /// Applies a new per-gram price. Returns false when nothing changed.
    pub fn reprice(&mut self, price_per_gram: Decimal) -> Result<bool, SkuError> {
        let price = unit_price(self.sale_mode, price_per_gram, self.weight_g)?;
        if price == self.price && price_per_gram == self.price_per_gram { return Ok(false); }
        self.price_per_gram = price_per_gram;
        self.price = price;
        self.touch();
        Ok(true)
    }

    /// Applies the fields present in `update`. Stock is only written when
    /// the update names it.
    pub fn apply(&mut self, update: &SkuUpdate) -> Result<(), SkuError> {
        if let Some(name) = update.name.as_deref().map(str::trim) {
            if name.is_empty() { return Err(SkuError::BlankName); }
            self.name = name.to_string();
        }
        if let Some(stock) = update.stock {
            if stock < 0 { return Err(SkuError::NegativeStock); }
            self.stock = stock;
        }
        if let Some(active) = update.active { self.active = active; }
        if let Some(per_gram) = update.price_per_gram { self.reprice(per_gram)?; }
        self.touch();
        Ok(())
    }

    /// Adds `delta` to stock, flooring at zero.
    pub fn adjust_stock(&mut self, delta: i32) -> StockChange {
        let before = self.stock;
        let wanted = before.saturating_add(delta);
        let after = wanted.max(0);
        self.stock = after;
        self.touch();
        StockChange { before, after, shortfall: after - wanted }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

pub fn unit_price(mode: SaleMode, per_gram: Decimal, weight_g: Option<u32>) -> Result<Decimal, SkuError> {
    if per_gram <= Decimal::ZERO || per_gram > MAX_PRICE_PER_GRAM {
        return Err(PriceMatrixError::PriceOutOfRange.into());
    }
    match (mode, weight_g) {
        (SaleMode::PieceByWeight, Some(w)) => per_gram.checked_mul(Decimal::from(w)).map(round_money).ok_or(SkuError::PriceTooLarge),
        _ => Ok(per_gram),
    }
}

pub fn sku_code(category: Category, tier: Tier, shade: &Shade, length: LengthCm, weight_g: Option<u32>) -> String {
    let mut code = format!("{}-{}-{}-{}", category.code(), tier.code(), shade.code(), length.value());
    if let Some(w) = weight_g { code.push_str(&format!("-{w}G")); }
    code.to_uppercase()
}

fn default_name(category: Category, tier: Tier, shade: &Shade, length: LengthCm, weight_g: Option<u32>) -> String {
    let mut name = format!("{} {} extensions, shade {}, {} cm", tier.label(), category.label(), shade, length.value());
    if let Some(w) = weight_g { name.push_str(&format!(", {w} g")); }
    name
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkuError { MissingWeight, UnexpectedWeight, WeightOutOfRange(u32), NegativeStock, BlankName, PriceTooLarge, Pricing(PriceMatrixError) }
impl std::error::Error for SkuError {}
impl std::fmt::Display for SkuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingWeight => write!(f, "PIECE_BY_WEIGHT requires a positive weight_g"),
            Self::UnexpectedWeight => write!(f, "BULK_G SKUs are sold by the gram and take no weight_g"),
            Self::WeightOutOfRange(w) => write!(f, "weight_g {w} is above {MAX_WEIGHT_G}"),
            Self::NegativeStock => write!(f, "stock cannot be negative"),
            Self::BlankName => write!(f, "name cannot be empty"),
            Self::PriceTooLarge => write!(f, "price too large"),
            Self::Pricing(e) => write!(f, "{e}"),
        }
    }
}
impl From<PriceMatrixError> for SkuError {
    fn from(e: PriceMatrixError) -> Self { Self::Pricing(e) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::price_matrix::PriceMatrixEntry;
    use rust_decimal_macros::dec;

    fn matrix() -> PriceMatrix {
        let key = MatrixKey { category: Category::ClipIn, tier: Tier::Luxe, length_cm: LengthCm::new(50).unwrap() };
        PriceMatrix::from_entries(vec![PriceMatrixEntry::new(key, dec!(12.345), "CZK").unwrap()])
    }

    fn draft(mode: SaleMode, weight: Option<u32>) -> SkuDraft {
        SkuDraft {
            category: Category::ClipIn, tier: Tier::Luxe, shade: Shade::new("613").unwrap(),
            length_cm: LengthCm::new(50).unwrap(), sale_mode: mode, weight_g: weight, stock: 5, name: None,
        }
    }

    #[test]
    fn test_piece_sku_from_wizard() {
        let sku = draft(SaleMode::PieceByWeight, Some(100)).resolve(&matrix(), "czk").unwrap();
        assert_eq!(sku.code, "CLIP-LUXE-613-50-100G");
        assert_eq!(sku.slug, "clip-luxe-613-50-100g");
        assert_eq!(sku.price, dec!(1234.50));
        assert_eq!(sku.currency, "CZK");
        assert_eq!(sku.unit_price_for(2), Some(dec!(2469.00)));
    }

    #[test]
    fn test_bulk_sku_priced_per_gram() {
        let sku = draft(SaleMode::BulkG, None).resolve(&matrix(), "CZK").unwrap();
        assert_eq!(sku.code, "CLIP-LUXE-613-50");
        assert_eq!(sku.price, dec!(12.345));
        assert_eq!(sku.unit_price_for(150), Some(dec!(1851.75)));
    }

    #[test]
    fn test_wizard_rejects_bad_input() {
        assert_eq!(draft(SaleMode::PieceByWeight, None).resolve(&matrix(), "CZK"), Err(SkuError::MissingWeight));
        assert_eq!(draft(SaleMode::BulkG, Some(50)).resolve(&matrix(), "CZK"), Err(SkuError::UnexpectedWeight));
        assert_eq!(draft(SaleMode::PieceByWeight, Some(10_001)).resolve(&matrix(), "CZK"), Err(SkuError::WeightOutOfRange(10_001)));
        assert!(draft(SaleMode::PieceByWeight, Some(10_001)).validate().is_err());
        let mut d = draft(SaleMode::BulkG, None);
        d.tier = Tier::Platinum;
        assert!(matches!(d.resolve(&matrix(), "CZK"), Err(SkuError::Pricing(PriceMatrixError::Missing(_)))));
    }

    #[test]
    fn test_stock_floors_at_zero() {
        let mut sku = draft(SaleMode::PieceByWeight, Some(100)).resolve(&matrix(), "CZK").unwrap();
        assert_eq!(sku.adjust_stock(-7), StockChange { before: 5, after: 0, shortfall: 2 });
        assert_eq!(sku.adjust_stock(3), StockChange { before: 0, after: 3, shortfall: 0 });
    }

    #[test]
    fn test_reprice() {
        let mut sku = draft(SaleMode::PieceByWeight, Some(100)).resolve(&matrix(), "CZK").unwrap();
        assert_eq!(sku.reprice(dec!(15)), Ok(true));
        assert_eq!(sku.price, dec!(1500));
        assert_eq!(sku.reprice(dec!(15)), Ok(false));
        assert_eq!(sku.reprice(dec!(79228162514264337593543950335)), Err(SkuError::Pricing(PriceMatrixError::PriceOutOfRange)));
        assert_eq!(sku.price, dec!(1500));
    }

    #[test]
    fn test_update_leaves_absent_fields_alone() {
        let mut sku = draft(SaleMode::PieceByWeight, Some(100)).resolve(&matrix(), "CZK").unwrap();
        sku.adjust_stock(-2);
        sku.apply(&SkuUpdate { name: Some("  Luxe weft  ".into()), ..SkuUpdate::default() }).unwrap();
        assert_eq!((sku.name.as_str(), sku.stock, sku.price), ("Luxe weft", 3, dec!(1234.50)));

        assert_eq!(sku.apply(&SkuUpdate { stock: Some(-1), ..SkuUpdate::default() }), Err(SkuError::NegativeStock));
        assert!(SkuUpdate { name: Some(" ".into()), ..SkuUpdate::default() }.validate().is_err());
        assert!(SkuUpdate { price_per_gram: Some(dec!(0)), ..SkuUpdate::default() }.validate().is_err());
        assert!(SkuUpdate { stock: Some(4), active: Some(false), ..SkuUpdate::default() }.validate().is_ok());
    }
}
