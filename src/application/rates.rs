use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::Services;
use crate::domain::exchange::{normalize_currency, ExchangeRate};
use crate::domain::value_objects::validate_exchange_rate;
use crate::{EcommerceError, Result};

/// `1 base = rate quote`, as set by an admin.
#[derive(Clone, Debug, Deserialize, Validate)]
#[validate(schema(function = "distinct_currencies"))]
pub struct RateUpdate {
    #[validate(length(equal = 3))]
    pub base: String,
    #[validate(length(equal = 3))]
    pub quote: String,
    #[validate(custom = "validate_exchange_rate")]
    pub rate: Decimal,
}

fn distinct_currencies(r: &RateUpdate) -> std::result::Result<(), ValidationError> {
    if r.base.trim().eq_ignore_ascii_case(r.quote.trim()) {
        let mut err = ValidationError::new("same_currency");
        err.message = Some("base and quote must differ".into());
        return Err(err);
    }
    Ok(())
}

impl Services {
    /// Stored rate, else the inverse of a stored reverse pair, else the
    /// configured EUR/CZK fallback.
    pub async fn exchange_rate(&self, from: &str, to: &str) -> Result<ExchangeRate> {
        let from = normalize_currency(from)?;
        let to = normalize_currency(to)?;
        if from == to { return Ok(ExchangeRate::identity(&from)?); }
        if let Some(rate) = self.store.get_rate(&from, &to).await? { return Ok(rate); }
        if let Some(rate) = self.store.get_rate(&to, &from).await? { return Ok(rate.inverse()); }

        let fallback = ExchangeRate::new("EUR", "CZK", self.config.fallback_eur_czk)?;
        match (from.as_str(), to.as_str()) {
            ("EUR", "CZK") => Ok(fallback),
            ("CZK", "EUR") => Ok(fallback.inverse()),
            _ => Err(EcommerceError::NotFound("exchange rate")),
        }
    }

    pub async fn set_exchange_rate(&self, update: RateUpdate) -> Result<ExchangeRate> {
        update.validate()?;
        let rate = ExchangeRate::new(&update.base, &update.quote, update.rate)?;
        self.store.put_rate(&rate).await?;
        tracing::info!(base = %rate.base, quote = %rate.quote, rate = %rate.rate, "exchange rate updated");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn update(base: &str, quote: &str, rate: Decimal) -> RateUpdate {
        RateUpdate { base: base.into(), quote: quote.into(), rate }
    }

    #[test]
    fn test_rate_update_validation() {
        assert!(update("EUR", "CZK", dec!(25.2)).validate().is_ok());
        assert!(update("eur", "EUR", dec!(1)).validate().is_err());
        assert!(update("EURO", "CZK", dec!(25)).validate().is_err());
        assert!(update("EUR", "CZK", dec!(0)).validate().is_err());
        assert!(update("EUR", "CZK", dec!(79228162514264337593543950335)).validate().is_err());
    }
}
