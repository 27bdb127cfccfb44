use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::domain::aggregates::{CouponError, OrderError, PriceMatrixError, SkuError};
use crate::EcommerceError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Handler error. Renders as `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub struct ApiError(pub EcommerceError);

impl From<EcommerceError> for ApiError {
    fn from(e: EcommerceError) -> Self { Self(e) }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self { Self(EcommerceError::Validation(message.into())) }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (status, axum::Json(json!({ "error": code, "message": message.into() }))).into_response()
}

pub fn classify(err: &EcommerceError) -> (StatusCode, &'static str) {
    use EcommerceError as E;
    match err {
        E::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        E::DuplicateSku(_) | E::DuplicateCoupon(_) => (StatusCode::CONFLICT, "duplicate"),
        E::Sku(SkuError::Pricing(PriceMatrixError::Missing(_))) | E::PriceMatrix(PriceMatrixError::Missing(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "missing_matrix_price")
        }
        E::Sku(_) | E::PriceMatrix(_) | E::ExchangeRate(_) | E::Money(_) | E::Validation(_) => {
            (StatusCode::BAD_REQUEST, "validation_error")
        }
        E::Order(OrderError::StaleVersion { .. }) => (StatusCode::CONFLICT, "stale_version"),
        E::Order(OrderError::NoItems | OrderError::InvalidQuantity | OrderError::NegativeAmount | OrderError::AmountTooLarge) => {
            (StatusCode::BAD_REQUEST, "validation_error")
        }
        E::Order(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition"),
        E::Coupon(CouponError::Exhausted) => (StatusCode::CONFLICT, "coupon_exhausted"),
        E::Coupon(CouponError::Inactive | CouponError::NotYetValid | CouponError::Expired | CouponError::BelowMinimum(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "coupon_not_applicable")
        }
        E::Coupon(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        E::StorageError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = classify(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            return json_error(status, code, "internal error");
        }
        json_error(status, code, self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::HistoryField;
    use crate::domain::value_objects::MoneyError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (EcommerceError::NotFound("SKU"), StatusCode::NOT_FOUND),
            (EcommerceError::DuplicateSku("CLIP-STD-1-40".into()), StatusCode::CONFLICT),
            (CouponError::Exhausted.into(), StatusCode::CONFLICT),
            (CouponError::Expired.into(), StatusCode::UNPROCESSABLE_ENTITY),
            (OrderError::StaleVersion { expected: 1, actual: 2 }.into(), StatusCode::CONFLICT),
            (OrderError::InvalidTransition { field: HistoryField::Payment, from: "refunded", to: "paid" }.into(), StatusCode::UNPROCESSABLE_ENTITY),
            (OrderError::NoItems.into(), StatusCode::BAD_REQUEST),
            (SkuError::MissingWeight.into(), StatusCode::BAD_REQUEST),
            (OrderError::AmountTooLarge.into(), StatusCode::BAD_REQUEST),
            (MoneyError::CurrencyMismatch("CZK".into(), "EUR".into()).into(), StatusCode::BAD_REQUEST),
            (EcommerceError::StorageError("db down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(classify(&err).0, status, "{err}");
        }
    }
}
