//! Value Objects for the hair-extension catalog

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::ValidationError;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_uppercase() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(self.currency.clone(), other.currency.clone()));
        }
        let amount = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2} {}", self.amount, self.currency) }
}

/// Rounds to two decimal places, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { CurrencyMismatch(String, String), Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrencyMismatch(a, b) => write!(f, "cannot mix {a} and {b} amounts"),
            Self::Overflow => write!(f, "amount too large"),
        }
    }
}

// Input bounds. Anything priced from these stays far below `Decimal::MAX`.

/// Largest money amount accepted as input (shipping, coupon values, subtotals).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
pub const MAX_PRICE_PER_GRAM: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);
pub const MAX_EXCHANGE_RATE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
/// Heaviest pre-weighed piece, in grams.
pub const MAX_WEIGHT_G: u32 = 10_000;
/// Largest line quantity: grams for `BULK_G`, pieces otherwise.
pub const MAX_QUANTITY: u32 = 100_000;

fn out_of_range(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Zero up to [`MAX_AMOUNT`].
pub fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > MAX_AMOUNT {
        return Err(out_of_range("amount", "must be between 0 and 1000000000"));
    }
    Ok(())
}

/// Above zero, up to [`MAX_AMOUNT`].
pub fn validate_positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO || *value > MAX_AMOUNT {
        return Err(out_of_range("amount", "must be above 0 and at most 1000000000"));
    }
    Ok(())
}

pub fn validate_price_per_gram(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO || *value > MAX_PRICE_PER_GRAM {
        return Err(out_of_range("price_per_gram", "must be above 0 and at most 100000"));
    }
    Ok(())
}

pub fn validate_exchange_rate(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO || *value > MAX_EXCHANGE_RATE {
        return Err(out_of_range("rate", "must be above 0 and at most 1000000"));
    }
    Ok(())
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { return Err(out_of_range("blank", "cannot be blank")); }
    Ok(())
}

/// Product category of an extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category { ClipIn, TapeIn, Keratin, Weft, Ponytail }

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClipIn => "clip-in",
            Self::TapeIn => "tape-in",
            Self::Keratin => "keratin",
            Self::Weft => "weft",
            Self::Ponytail => "ponytail",
        }
    }

    /// Short code used as the first segment of SKU codes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClipIn => "CLIP",
            Self::TapeIn => "TAPE",
            Self::Keratin => "KER",
            Self::Weft => "WEFT",
            Self::Ponytail => "PONY",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ClipIn => "Clip-in",
            Self::TapeIn => "Tape-in",
            Self::Keratin => "Keratin",
            Self::Weft => "Weft",
            Self::Ponytail => "Ponytail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "clip-in" | "clipin" => Some(Self::ClipIn),
            "tape-in" | "tapein" => Some(Self::TapeIn),
            "keratin" => Some(Self::Keratin),
            "weft" => Some(Self::Weft),
            "ponytail" => Some(Self::Ponytail),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Quality grade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier { Standard, Luxe, Platinum }

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Standard => "standard", Self::Luxe => "luxe", Self::Platinum => "platinum" }
    }

    pub fn code(&self) -> &'static str {
        match self { Self::Standard => "STD", Self::Luxe => "LUXE", Self::Platinum => "PLAT" }
    }

    pub fn label(&self) -> &'static str {
        match self { Self::Standard => "Standard", Self::Luxe => "LUXE", Self::Platinum => "Platinum edition" }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "std" => Some(Self::Standard),
            "luxe" => Some(Self::Luxe),
            "platinum" | "plat" => Some(Self::Platinum),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// How a SKU is sold: by gram quantity, or as a fixed pre-weighed piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleMode { BulkG, PieceByWeight }

impl SaleMode {
    pub fn as_str(&self) -> &'static str {
        match self { Self::BulkG => "BULK_G", Self::PieceByWeight => "PIECE_BY_WEIGHT" }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BULK_G" | "BULK" => Some(Self::BulkG),
            "PIECE_BY_WEIGHT" | "PIECE" => Some(Self::PieceByWeight),
            _ => None,
        }
    }

    /// Unit in which quantities and stock are counted.
    pub fn unit(&self) -> &'static str {
        match self { Self::BulkG => "g", Self::PieceByWeight => "pcs" }
    }
}

/// Hair shade designation such as `613` or `4/27`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Shade(String);

impl Shade {
    pub fn new(value: impl Into<String>) -> Result<Self, ShadeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(ShadeError::Empty); }
        if value.len() > 16 { return Err(ShadeError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '/' || c == '-') {
            return Err(ShadeError::InvalidChar);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }

    /// Shade as used inside SKU codes, where `/` is not allowed.
    pub fn code(&self) -> String { self.0.replace('/', "-") }
}

impl TryFrom<String> for Shade {
    type Error = ShadeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Shade> for String {
    fn from(value: Shade) -> Self { value.0 }
}

impl fmt::Display for Shade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ShadeError { Empty, TooLong, InvalidChar }
impl std::error::Error for ShadeError {}
impl fmt::Display for ShadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "shade empty"),
            Self::TooLong => write!(f, "shade too long"),
            Self::InvalidChar => write!(f, "shade may only contain letters, digits, '/' and '-'"),
        }
    }
}

/// Hair length in centimetres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct LengthCm(u16);

impl LengthCm {
    pub const MIN: u16 = 20;
    pub const MAX: u16 = 100;

    pub fn new(value: u16) -> Result<Self, LengthError> {
        if !(Self::MIN..=Self::MAX).contains(&value) { return Err(LengthError(value)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u16 { self.0 }
}

impl TryFrom<u16> for LengthCm {
    type Error = LengthError;
    fn try_from(value: u16) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<LengthCm> for u16 {
    fn from(value: LengthCm) -> Self { value.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct LengthError(pub u16);
impl std::error::Error for LengthError {}
impl fmt::Display for LengthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "length {} cm outside {}..={}", self.0, LengthCm::MIN, LengthCm::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_add() {
        let a = Money::new(dec!(100), "czk");
        let b = Money::new(dec!(50), "CZK");
        assert_eq!(a.add(&b).unwrap(), Money::new(dec!(150), "CZK"));
        assert_eq!(a.add(&Money::new(dec!(1), "EUR")), Err(MoneyError::CurrencyMismatch("CZK".into(), "EUR".into())));
        assert_eq!(Money::new(Decimal::MAX, "CZK").add(&b), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_input_bounds() {
        assert!(validate_amount(&dec!(0)).is_ok());
        assert!(validate_amount(&dec!(-0.01)).is_err());
        assert!(validate_amount(&dec!(79228162514264337593543950335)).is_err());
        assert!(validate_positive_amount(&dec!(0)).is_err());
        assert!(validate_price_per_gram(&dec!(100000)).is_ok());
        assert!(validate_price_per_gram(&dec!(100000.01)).is_err());
        assert!(validate_exchange_rate(&dec!(25.1)).is_ok());
        assert!(validate_not_blank("  ").is_err());
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn test_shade() {
        assert_eq!(Shade::new(" 4/27 ").unwrap().code(), "4-27");
        assert_eq!(Shade::new("  "), Err(ShadeError::Empty));
        assert_eq!(Shade::new("6#"), Err(ShadeError::InvalidChar));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(Category::parse("Clip_In"), Some(Category::ClipIn));
        assert_eq!(Tier::parse("LUXE"), Some(Tier::Luxe));
        assert_eq!(SaleMode::parse("piece_by_weight"), Some(SaleMode::PieceByWeight));
        assert_eq!(serde_json::to_string(&SaleMode::BulkG).unwrap(), "\"BULK_G\"");
        assert!(LengthCm::new(19).is_err());
    }
}
