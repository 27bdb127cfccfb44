//! Price matrix: category × tier × length → price per gram

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use crate::domain::value_objects::{Category, LengthCm, Tier, MAX_PRICE_PER_GRAM};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixKey { pub category: Category, pub tier: Tier, pub length_cm: LengthCm }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceMatrixEntry {
    pub id: Uuid,
    pub category: Category,
    pub tier: Tier,
    pub length_cm: LengthCm,
    pub price_per_gram: Decimal,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

impl PriceMatrixEntry {
    pub fn new(key: MatrixKey, price_per_gram: Decimal, currency: &str) -> Result<Self, PriceMatrixError> {
        if price_per_gram <= Decimal::ZERO || price_per_gram > MAX_PRICE_PER_GRAM {
            return Err(PriceMatrixError::PriceOutOfRange);
        }
        Ok(Self {
            id: Uuid::now_v7(), category: key.category, tier: key.tier, length_cm: key.length_cm,
            price_per_gram, currency: currency.to_uppercase(), updated_at: Utc::now(),
        })
    }

    pub fn key(&self) -> MatrixKey { MatrixKey { category: self.category, tier: self.tier, length_cm: self.length_cm } }
}

/// Lookup table built from stored entries.
#[derive(Clone, Debug, Default)]
pub struct PriceMatrix { entries: HashMap<MatrixKey, PriceMatrixEntry> }

impl PriceMatrix {
    pub fn from_entries(entries: impl IntoIterator<Item = PriceMatrixEntry>) -> Self {
        Self { entries: entries.into_iter().map(|e| (e.key(), e)).collect() }
    }

    pub fn price_per_gram(&self, key: &MatrixKey) -> Result<Decimal, PriceMatrixError> {
        self.entries.get(key).map(|e| e.price_per_gram).ok_or_else(|| PriceMatrixError::Missing(key.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)] pub enum PriceMatrixError { PriceOutOfRange, Missing(MatrixKey) }
impl std::error::Error for PriceMatrixError {}
impl std::fmt::Display for PriceMatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PriceOutOfRange => write!(f, "price per gram must be above 0 and at most {MAX_PRICE_PER_GRAM}"),
            Self::Missing(k) => write!(f, "no matrix price for {} / {} / {} cm", k.category, k.tier, k.length_cm.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key(tier: Tier, len: u16) -> MatrixKey {
        MatrixKey { category: Category::TapeIn, tier, length_cm: LengthCm::new(len).unwrap() }
    }

    #[test]
    fn test_lookup() {
        let matrix = PriceMatrix::from_entries(vec![
            PriceMatrixEntry::new(key(Tier::Luxe, 60), dec!(42), "CZK").unwrap(),
            PriceMatrixEntry::new(key(Tier::Luxe, 45), dec!(35), "CZK").unwrap(),
            PriceMatrixEntry::new(key(Tier::Standard, 50), dec!(20), "CZK").unwrap(),
        ]);
        assert_eq!(matrix.price_per_gram(&key(Tier::Luxe, 60)).unwrap(), dec!(42));
        assert!(matches!(matrix.price_per_gram(&key(Tier::Platinum, 60)), Err(PriceMatrixError::Missing(_))));
        assert_eq!(matrix.price_per_gram(&key(Tier::Luxe, 45)).unwrap(), dec!(35));
    }

    #[test]
    fn test_rejects_price_out_of_range() {
        assert_eq!(PriceMatrixEntry::new(key(Tier::Luxe, 50), dec!(0), "CZK"), Err(PriceMatrixError::PriceOutOfRange));
        assert_eq!(PriceMatrixEntry::new(key(Tier::Luxe, 50), dec!(79000000000000000000000000), "CZK"), Err(PriceMatrixError::PriceOutOfRange));
    }
}
