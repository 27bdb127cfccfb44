//! Currency exchange rates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{round_money, MAX_EXCHANGE_RATE};

/// `1 base = rate quote`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(base: &str, quote: &str, rate: Decimal) -> Result<Self, ExchangeRateError> {
        let base = normalize_currency(base)?;
        let quote = normalize_currency(quote)?;
        if rate <= Decimal::ZERO || rate > MAX_EXCHANGE_RATE { return Err(ExchangeRateError::RateOutOfRange); }
        Ok(Self { base, quote, rate, updated_at: Utc::now() })
    }

    pub fn identity(currency: &str) -> Result<Self, ExchangeRateError> { Self::new(currency, currency, Decimal::ONE) }

    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
            rate: (Decimal::ONE / self.rate).round_dp(8),
            updated_at: self.updated_at,
        }
    }

    /// `None` when the converted amount does not fit a `Decimal`.
    pub fn convert(&self, amount: Decimal) -> Option<Decimal> { amount.checked_mul(self.rate).map(round_money) }
}

/// Three ASCII letters, uppercased.
pub fn normalize_currency(code: &str) -> Result<String, ExchangeRateError> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ExchangeRateError::InvalidCurrency(code));
    }
    Ok(code)
}

#[derive(Debug, Clone, PartialEq)] pub enum ExchangeRateError { InvalidCurrency(String), RateOutOfRange }
impl std::error::Error for ExchangeRateError {}
impl std::fmt::Display for ExchangeRateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCurrency(c) => write!(f, "invalid currency code '{c}'"),
            Self::RateOutOfRange => write!(f, "rate must be above 0 and at most {MAX_EXCHANGE_RATE}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_convert_and_inverse() {
        let eur_czk = ExchangeRate::new("eur", "czk", dec!(25)).unwrap();
        assert_eq!(eur_czk.convert(dec!(10)), Some(dec!(250)));
        let czk_eur = eur_czk.inverse();
        assert_eq!((czk_eur.base.as_str(), czk_eur.quote.as_str()), ("CZK", "EUR"));
        assert_eq!(czk_eur.convert(dec!(1234)), Some(dec!(49.36)));
        assert_eq!(eur_czk.convert(Decimal::MAX), None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(ExchangeRate::new("EURO", "CZK", dec!(1)), Err(ExchangeRateError::InvalidCurrency("EURO".into())));
        assert_eq!(ExchangeRate::new("EUR", "CZK", dec!(0)), Err(ExchangeRateError::RateOutOfRange));
        assert_eq!(ExchangeRate::new("EUR", "CZK", dec!(1000001)), Err(ExchangeRateError::RateOutOfRange));
    }
}
