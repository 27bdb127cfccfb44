//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::{round_money, validate_amount, validate_positive_amount};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub kind: DiscountKind,
    /// Percent (0, 100] or a fixed amount in the store currency.
    pub value: Decimal,
    pub min_order_total: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind { Percent, Fixed }

impl DiscountKind {
    pub fn as_str(&self) -> &'static str { match self { Self::Percent => "percent", Self::Fixed => "fixed" } }
    pub fn parse(s: &str) -> Option<Self> {
        match s { "percent" => Some(Self::Percent), "fixed" => Some(Self::Fixed), _ => None }
    }
}

/// Admin input for a new coupon. Field ranges are checked with
/// [`Validate`]; [`Coupon::create`] enforces the rules that span fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct CouponSpec {
    /// Generated when absent.
    #[validate(length(min = 1, max = 32))]
    pub code: Option<String>,
    pub kind: Option<DiscountKind>,
    #[validate(custom = "validate_positive_amount")]
    pub value: Decimal,
    #[validate(custom = "validate_amount")]
    pub min_order_total: Option<Decimal>,
    #[validate(range(min = 1))]
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

impl Coupon {
    pub fn create(spec: CouponSpec) -> Result<Self, CouponError> {
        let kind = spec.kind.unwrap_or(DiscountKind::Percent);
        if spec.value <= Decimal::ZERO || (kind == DiscountKind::Percent && spec.value > Decimal::ONE_HUNDRED) {
            return Err(CouponError::InvalidValue);
        }
        if let (Some(from), Some(until)) = (spec.valid_from, spec.valid_until) {
            if until <= from { return Err(CouponError::InvalidWindow); }
        }
        let code = match spec.code.as_deref().map(normalize_code) {
            Some(c) if c.is_empty() || !c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_') => {
                return Err(CouponError::InvalidCode);
            }
            Some(c) => c,
            None => random_code(),
        };
        Ok(Self {
            id: Uuid::now_v7(), code, kind, value: spec.value, min_order_total: spec.min_order_total,
            usage_limit: spec.usage_limit, used_count: 0, valid_from: spec.valid_from, valid_until: spec.valid_until,
            active: true, created_at: Utc::now(),
        })
    }

    pub fn has_uses_left(&self) -> bool { self.usage_limit.map_or(true, |l| self.used_count < l) }

    /// Checks the coupon against an order subtotal and returns the discount.
    /// Does not consume a use.
    pub fn evaluate(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<Decimal, CouponError> {
        if !self.active { return Err(CouponError::Inactive); }
        if self.valid_from.is_some_and(|from| now < from) { return Err(CouponError::NotYetValid); }
        if self.valid_until.is_some_and(|until| now >= until) { return Err(CouponError::Expired); }
        if !self.has_uses_left() { return Err(CouponError::Exhausted); }
        if let Some(min) = self.min_order_total {
            if subtotal < min { return Err(CouponError::BelowMinimum(min)); }
        }
        let discount = match self.kind {
            DiscountKind::Percent => round_money(subtotal * self.value / Decimal::ONE_HUNDRED),
            DiscountKind::Fixed => self.value,
        };
        Ok(discount.min(subtotal).max(Decimal::ZERO))
    }

    /// Takes one use. Callers must hold the coupon row exclusively.
    pub fn redeem(&mut self) -> Result<(), CouponError> {
        if !self.has_uses_left() { return Err(CouponError::Exhausted); }
        self.used_count += 1;
        Ok(())
    }

    pub fn deactivate(&mut self) { self.active = false; }
}

fn random_code() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect::<String>().to_uppercase()
}

#[derive(Debug, Clone, PartialEq)]
pub enum CouponError { InvalidValue, InvalidWindow, InvalidCode, Inactive, NotYetValid, Expired, Exhausted, BelowMinimum(Decimal) }
impl std::error::Error for CouponError {}
impl std::fmt::Display for CouponError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue => write!(f, "discount value out of range"),
            Self::InvalidWindow => write!(f, "valid_until must be after valid_from"),
            Self::InvalidCode => write!(f, "coupon code may only contain letters, digits, '-' or '_'"),
            Self::Inactive => write!(f, "coupon is not active"),
            Self::NotYetValid => write!(f, "coupon is not valid yet"),
            Self::Expired => write!(f, "coupon has expired"),
            Self::Exhausted => write!(f, "coupon usage limit reached"),
            Self::BelowMinimum(min) => write!(f, "order total must be at least {min}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn spec(kind: DiscountKind, value: Decimal) -> CouponSpec {
        CouponSpec { code: Some(" welcome10 ".into()), kind: Some(kind), value, ..Default::default() }
    }

    #[test]
    fn test_percent_discount() {
        let c = Coupon::create(spec(DiscountKind::Percent, dec!(10))).unwrap();
        assert_eq!(c.code, "WELCOME10");
        assert_eq!(c.evaluate(dec!(1234.55), Utc::now()).unwrap(), dec!(123.46));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let c = Coupon::create(spec(DiscountKind::Fixed, dec!(500))).unwrap();
        assert_eq!(c.evaluate(dec!(300), Utc::now()).unwrap(), dec!(300));
    }

    #[test]
    fn test_limits_and_window() {
        let now = Utc::now();
        let mut c = Coupon::create(CouponSpec {
            usage_limit: Some(1), min_order_total: Some(dec!(1000)),
            valid_until: Some(now + Duration::days(1)), ..spec(DiscountKind::Percent, dec!(5))
        }).unwrap();
        assert_eq!(c.evaluate(dec!(999), now), Err(CouponError::BelowMinimum(dec!(1000))));
        assert!(c.evaluate(dec!(1000), now).is_ok());
        c.redeem().unwrap();
        assert_eq!(c.evaluate(dec!(1000), now), Err(CouponError::Exhausted));
        assert_eq!(c.redeem(), Err(CouponError::Exhausted));
        assert_eq!(c.evaluate(dec!(1000), now + Duration::days(2)), Err(CouponError::Expired));
    }

    #[test]
    fn test_create_validation() {
        assert_eq!(Coupon::create(spec(DiscountKind::Percent, dec!(120))), Err(CouponError::InvalidValue));
        assert_eq!(Coupon::create(CouponSpec { code: Some("bad code".into()), ..spec(DiscountKind::Fixed, dec!(1)) }), Err(CouponError::InvalidCode));
        let generated = Coupon::create(CouponSpec { code: None, ..spec(DiscountKind::Fixed, dec!(1)) }).unwrap();
        assert_eq!(generated.code.len(), 8);
    }

    #[test]
    fn test_spec_field_ranges() {
        assert!(spec(DiscountKind::Percent, dec!(10)).validate().is_ok());
        assert!(CouponSpec { usage_limit: Some(0), ..spec(DiscountKind::Percent, dec!(10)) }.validate().is_err());
        assert!(CouponSpec { code: Some("X".repeat(33)), ..spec(DiscountKind::Percent, dec!(10)) }.validate().is_err());
        assert!(CouponSpec { min_order_total: Some(dec!(-1)), ..spec(DiscountKind::Percent, dec!(10)) }.validate().is_err());
        assert!(spec(DiscountKind::Fixed, dec!(79228162514264337593543950335)).validate().is_err());
    }
}
