//! Aggregates module
pub mod sku;
pub mod price_matrix;
pub mod order;
pub mod coupon;
pub mod invoice;

pub use sku::{Sku, SkuDraft, SkuError, SkuUpdate, StockChange};
pub use price_matrix::{MatrixKey, PriceMatrix, PriceMatrixEntry, PriceMatrixError};
pub use order::{
    DeliveryStatus, HistoryField, MovementReason, Order, OrderDraft, OrderError, OrderItem, OrderPatch, OrderStatus,
    OrderTransition, PaymentStatus, StatusChange, StockMovement, order_number,
};
pub use coupon::{normalize_code, Coupon, CouponError, CouponSpec, DiscountKind};
pub use invoice::{invoice_number, Invoice, InvoiceLine};
