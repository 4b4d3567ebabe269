use rust_decimal::Decimal;
use tokio_postgres::error::SqlState;
use validator::ValidationErrors;

use crate::models::{CouponError, OrderStatus};
use crate::types::ProductId;

/// Broad failure category, used when shaping responses for callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    ExternalService,
    Internal,
}

#[derive(Debug, Fail)]
pub enum RepoError {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Connection: {}", reason)]
    Connection { reason: String },
    #[fail(display = "Unique constraint {} violated", constraint)]
    UniqueViolation { constraint: String },
    #[fail(display = "Failed to parse column {}: {}", column, reason)]
    Parse { column: &'static str, reason: String },
}

impl From<tokio_postgres::Error> for RepoError {
    fn from(v: tokio_postgres::Error) -> Self {
        if v.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let constraint = v.as_db_error().and_then(|e| e.constraint()).unwrap_or_default();
            return RepoError::UniqueViolation {
                constraint: constraint.to_string(),
            };
        }
        RepoError::Connection { reason: format!("{}", v) }
    }
}

impl From<bb8::RunError<tokio_postgres::Error>> for RepoError {
    fn from(v: bb8::RunError<tokio_postgres::Error>) -> Self {
        RepoError::Connection { reason: format!("{}", v) }
    }
}

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Invalid input: {}", _0)]
    Validation(String),
    #[fail(display = "Cart is empty for this store")]
    EmptyCart,
    #[fail(display = "Invalid delivery address")]
    InvalidAddress,
    #[fail(display = "User already has a default address")]
    DuplicateDefaultAddress,
    #[fail(display = "{} not found", _0)]
    NotFound(&'static str),
    #[fail(display = "Product is not available")]
    ProductUnavailable,
    #[fail(display = "Only {} items of product {} available", available, product)]
    InsufficientStock { product: ProductId, available: i32 },
    #[fail(display = "{}", _0)]
    Coupon(#[cause] CouponError),
    #[fail(display = "Coupon code {} already exists", _0)]
    DuplicateCoupon(String),
    #[fail(display = "Order cannot move from {} to {}", from, to)]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[fail(display = "Operation is not permitted")]
    Forbidden,
    #[fail(display = "A payment already exists for this order")]
    PaymentExists,
    #[fail(display = "Payment not successful, gateway status: {}", status)]
    PaymentDeclined { status: String },
    #[fail(display = "No charge ID found")]
    NoChargeReference,
    #[fail(display = "Refund exceeds refundable amount of {}", refundable)]
    RefundExceedsPayment { refundable: Decimal },
    #[fail(display = "Payment gateway error: {}", _0)]
    Gateway(String),
    #[fail(display = "Failed to allocate a unique {}", _0)]
    IdentifierExhausted(&'static str),
    #[fail(display = "{}", _0)]
    Repo(#[cause] RepoError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use self::Error::*;

        match self {
            Validation(_) | EmptyCart | InvalidAddress => ErrorKind::Validation,
            NotFound(_) => ErrorKind::NotFound,
            Coupon(e) => e.kind(),
            ProductUnavailable
            | InsufficientStock { .. }
            | DuplicateCoupon(_)
            | DuplicateDefaultAddress
            | InvalidTransition { .. }
            | PaymentExists
            | PaymentDeclined { .. }
            | NoChargeReference
            | RefundExceedsPayment { .. } => ErrorKind::Conflict,
            Forbidden => ErrorKind::Forbidden,
            Gateway(_) => ErrorKind::ExternalService,
            IdentifierExhausted(_) | Repo(_) => ErrorKind::Internal,
        }
    }
}

impl From<RepoError> for Error {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => Error::NotFound("Record"),
            other => Error::Repo(other),
        }
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(e: tokio_postgres::Error) -> Self {
        Error::Repo(e.into())
    }
}

impl From<bb8::RunError<tokio_postgres::Error>> for Error {
    fn from(e: bb8::RunError<tokio_postgres::Error>) -> Self {
        Error::Repo(e.into())
    }
}

impl From<CouponError> for Error {
    fn from(e: CouponError) -> Self {
        Error::Coupon(e)
    }
}

impl From<ValidationErrors> for Error {
    fn from(e: ValidationErrors) -> Self {
        Error::Validation(format!("{}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(Error::NotFound("Order").kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::InsufficientStock {
                product: ProductId::new(),
                available: 0,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(Error::Coupon(CouponError::NotFound).kind(), ErrorKind::NotFound);
        assert_eq!(Error::Coupon(CouponError::Expired).kind(), ErrorKind::Conflict);
        assert_eq!(Error::Gateway("timeout".into()).kind(), ErrorKind::ExternalService);
        assert_eq!(Error::from(RepoError::NotFound).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn stock_message_names_available_quantity() {
        let e = Error::InsufficientStock {
            product: ProductId::new(),
            available: 3,
        };
        assert!(format!("{}", e).starts_with("Only 3 items"));
    }
}
