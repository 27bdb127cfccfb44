//! Hairstore back office
//!
//! Catalog and order back office for a hair-extension retailer.
//!
//! ## Features
//! - SKU catalog with a configuration wizard priced from the price matrix
//! - Price matrix management (category × tier × length → price per gram)
//! - Order lifecycle with stock reconciliation, invoices and notifications
//! - Coupons with atomic usage limits
//! - Storefront search filters, SEO metadata and a merchant feed
//! - Exchange rates

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

use thiserror::Error;

use crate::domain::aggregates::{CouponError, OrderError, PriceMatrixError, SkuError};
use crate::domain::exchange::ExchangeRateError;
use crate::domain::value_objects::MoneyError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("SKU {0} already exists")]
    DuplicateSku(String),

    #[error("Coupon {0} already exists")]
    DuplicateCoupon(String),

    #[error(transparent)]
    Sku(#[from] SkuError),

    #[error(transparent)]
    PriceMatrix(#[from] PriceMatrixError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    ExchangeRate(#[from] ExchangeRateError),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<sqlx::Error> for EcommerceError {
    fn from(e: sqlx::Error) -> Self { Self::StorageError(e.to_string()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
