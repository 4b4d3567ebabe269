use chrono::prelude::*;
use rust_decimal::Decimal;
use tokio_postgres::Row;
use uuid::Uuid;
use validator::Validate;

use super::common::round_money;
use crate::errors::{ErrorKind, RepoError};
use crate::types::*;
use crate::util::{column, parsed_column, FromRow};

pub const ID_COLUMN: &str = "id";
pub const CODE_COLUMN: &str = "code";
pub const DESCRIPTION_COLUMN: &str = "description";
pub const DISCOUNT_TYPE_COLUMN: &str = "discount_type";
pub const DISCOUNT_VALUE_COLUMN: &str = "discount_value";
pub const MIN_ORDER_AMOUNT_COLUMN: &str = "min_order_amount";
pub const MAX_DISCOUNT_AMOUNT_COLUMN: &str = "max_discount_amount";
pub const VALID_FROM_COLUMN: &str = "valid_from";
pub const VALID_UNTIL_COLUMN: &str = "valid_until";
pub const USAGE_LIMIT_COLUMN: &str = "usage_limit";
pub const USAGE_PER_USER_COLUMN: &str = "usage_per_user";
pub const TIMES_USED_COLUMN: &str = "times_used";
pub const STORE_ID_COLUMN: &str = "store_id";
pub const IS_ACTIVE_COLUMN: &str = "is_active";
pub const CREATED_AT_COLUMN: &str = "created_at";

pub const COUPON_ID_COLUMN: &str = "coupon_id";
pub const ORDER_ID_COLUMN: &str = "order_id";
pub const USER_ID_COLUMN: &str = "user_id";
pub const DISCOUNT_AMOUNT_COLUMN: &str = "discount_amount";
pub const USED_AT_COLUMN: &str = "used_at";

string_enum! {
    pub enum DiscountType {
        Percentage => "percentage",
        Fixed => "fixed",
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Fail)]
pub enum CouponError {
    #[fail(display = "Invalid coupon code")]
    NotFound,
    #[fail(display = "Coupon is not valid or has expired")]
    Expired,
    #[fail(display = "Coupon is not active")]
    Inactive,
    #[fail(display = "Coupon usage limit has been reached")]
    UsageExceeded,
    #[fail(display = "Coupon is not valid for this store")]
    StoreMismatch,
    #[fail(display = "Order subtotal is below the coupon minimum of {}", minimum)]
    BelowMinimum { minimum: Decimal },
    #[fail(display = "Coupon already used the maximum number of times by this user")]
    PerUserLimitReached,
}

impl CouponError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CouponError::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Conflict,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Global cap on redemptions, `None` for unlimited
    pub usage_limit: Option<i32>,
    pub usage_per_user: i32,
    pub times_used: i32,
    /// Store the coupon is restricted to, `None` for every store
    pub store_id: Option<StoreId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.is_within_window(now) && !self.is_exhausted()
    }

    fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    fn is_exhausted(&self) -> bool {
        self.usage_limit.map_or(false, |limit| self.times_used >= limit)
    }

    /// Checks validity window, active flag, global usage and store scope, in that order.
    pub fn check(&self, now: DateTime<Utc>, store_id: StoreId) -> Result<(), CouponError> {
        if !self.is_within_window(now) {
            return Err(CouponError::Expired);
        }
        if !self.is_active {
            return Err(CouponError::Inactive);
        }
        if self.is_exhausted() {
            return Err(CouponError::UsageExceeded);
        }
        if let Some(scope) = self.store_id {
            if scope != store_id {
                return Err(CouponError::StoreMismatch);
            }
        }

        Ok(())
    }

    /// Checks the per-order conditions applied at checkout.
    pub fn check_order(&self, subtotal: Decimal, redemptions_by_user: i64) -> Result<(), CouponError> {
        if subtotal < self.min_order_amount {
            return Err(CouponError::BelowMinimum {
                minimum: self.min_order_amount,
            });
        }
        if redemptions_by_user >= i64::from(self.usage_per_user) {
            return Err(CouponError::PerUserLimitReached);
        }

        Ok(())
    }

    /// Discount granted on `subtotal`, never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let discount = match self.discount_type {
            DiscountType::Percentage => {
                let raw = round_money(subtotal * self.discount_value / Decimal::ONE_HUNDRED);
                match self.max_discount_amount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
            DiscountType::Fixed => self.discount_value,
        };

        discount.max(Decimal::ZERO).min(subtotal)
    }
}

impl FromRow for Coupon {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: CouponId(column(row, ID_COLUMN)?),
            code: column(row, CODE_COLUMN)?,
            description: column(row, DESCRIPTION_COLUMN)?,
            discount_type: parsed_column(row, DISCOUNT_TYPE_COLUMN)?,
            discount_value: column(row, DISCOUNT_VALUE_COLUMN)?,
            min_order_amount: column(row, MIN_ORDER_AMOUNT_COLUMN)?,
            max_discount_amount: column(row, MAX_DISCOUNT_AMOUNT_COLUMN)?,
            valid_from: column(row, VALID_FROM_COLUMN)?,
            valid_until: column(row, VALID_UNTIL_COLUMN)?,
            usage_limit: column(row, USAGE_LIMIT_COLUMN)?,
            usage_per_user: column(row, USAGE_PER_USER_COLUMN)?,
            times_used: column(row, TIMES_USED_COLUMN)?,
            store_id: column::<Option<Uuid>>(row, STORE_ID_COLUMN)?.map(StoreId),
            is_active: column(row, IS_ACTIVE_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
        })
    }
}

fn default_usage_per_user() -> i32 {
    1
}

fn return_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewCoupon {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[validate(range(min = 0))]
    pub usage_limit: Option<i32>,
    #[serde(default = "default_usage_per_user")]
    #[validate(range(min = 1))]
    pub usage_per_user: i32,
    pub store_id: Option<StoreId>,
    #[serde(default = "return_true")]
    pub is_active: bool,
}

impl NewCoupon {
    /// Checks the constraints `validator` cannot express on decimals and date pairs.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.discount_value <= Decimal::ZERO {
            return Err("discount_value must be positive".to_string());
        }
        if self.discount_type == DiscountType::Percentage && self.discount_value > Decimal::ONE_HUNDRED {
            return Err("percentage discount cannot exceed 100".to_string());
        }
        if self.valid_until < self.valid_from {
            return Err("valid_until precedes valid_from".to_string());
        }

        Ok(())
    }

    pub fn into_coupon(self) -> Coupon {
        Coupon {
            id: CouponId::new(),
            code: self.code,
            description: self.description,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            min_order_amount: self.min_order_amount,
            max_discount_amount: self.max_discount_amount,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            usage_limit: self.usage_limit,
            usage_per_user: self.usage_per_user,
            times_used: 0,
            store_id: self.store_id,
            is_active: self.is_active,
            created_at: Utc::now(),
        }
    }
}

/// Discount a valid coupon grants on a given subtotal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponQuote {
    pub coupon: Coupon,
    pub discount_amount: Decimal,
}

/// Links one coupon use to the order it discounted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouponRedemption {
    pub id: CouponRedemptionId,
    pub coupon_id: CouponId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub discount_amount: Decimal,
    pub used_at: DateTime<Utc>,
}

impl CouponRedemption {
    pub fn new(coupon_id: CouponId, order_id: OrderId, user_id: UserId, discount_amount: Decimal) -> Self {
        Self {
            id: CouponRedemptionId::new(),
            coupon_id,
            order_id,
            user_id,
            discount_amount,
            used_at: Utc::now(),
        }
    }
}

impl FromRow for CouponRedemption {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: CouponRedemptionId(column(row, ID_COLUMN)?),
            coupon_id: CouponId(column(row, COUPON_ID_COLUMN)?),
            order_id: OrderId(column(row, ORDER_ID_COLUMN)?),
            user_id: UserId(column(row, USER_ID_COLUMN)?),
            discount_amount: column(row, DISCOUNT_AMOUNT_COLUMN)?,
            used_at: column(row, USED_AT_COLUMN)?,
        })
    }
}
