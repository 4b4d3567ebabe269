use chrono::Utc;
use rust_decimal::Decimal;
use validator::Validate;

use super::memory::SharedStorage;
use super::types::ServiceResult;
use crate::errors::*;
use crate::models::*;
use crate::repos;
use crate::types::*;

#[async_trait]
pub trait CouponService: Send + Sync {
    /// Checks that the code exists and may be used in the store right now
    async fn validate(&self, code: &str, store_id: StoreId) -> ServiceResult<Coupon>;
    /// Discount the coupon would grant on `subtotal`
    async fn quote(&self, code: &str, store_id: StoreId, subtotal: Decimal) -> ServiceResult<CouponQuote>;
    async fn create_coupon(&self, payload: NewCoupon) -> ServiceResult<Coupon>;
}

fn check_new_coupon(payload: &NewCoupon) -> ServiceResult<()> {
    payload.validate()?;
    payload.check_consistency().map_err(Error::Validation)
}

fn quote_for(coupon: Coupon, subtotal: Decimal) -> CouponQuote {
    CouponQuote {
        discount_amount: coupon.discount_for(subtotal),
        coupon,
    }
}

pub struct CouponServiceImpl {
    db_pool: DbPool,
}

impl CouponServiceImpl {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CouponService for CouponServiceImpl {
    async fn validate(&self, code: &str, store_id: StoreId) -> ServiceResult<Coupon> {
        debug!("Validating coupon {} for store {}", code, store_id);
        let conn = self.db_pool.get().await?;
        let coupon = repos::coupon::find_by_code(&*conn, code).await?.ok_or(CouponError::NotFound)?;
        coupon.check(Utc::now(), store_id)?;

        Ok(coupon)
    }

    async fn quote(&self, code: &str, store_id: StoreId, subtotal: Decimal) -> ServiceResult<CouponQuote> {
        let coupon = self.validate(code, store_id).await?;
        Ok(quote_for(coupon, subtotal))
    }

    async fn create_coupon(&self, payload: NewCoupon) -> ServiceResult<Coupon> {
        check_new_coupon(&payload)?;
        let conn = self.db_pool.get().await?;
        let code = payload.code.clone();
        let coupon = repos::coupon::insert(&*conn, &payload.into_coupon())
            .await?
            .ok_or(Error::DuplicateCoupon(code))?;
        info!("Created coupon {}", coupon.code);

        Ok(coupon)
    }
}

pub struct CouponServiceMemory {
    pub inner: SharedStorage,
}

#[async_trait]
impl CouponService for CouponServiceMemory {
    async fn validate(&self, code: &str, store_id: StoreId) -> ServiceResult<Coupon> {
        let inner = self.inner.lock().unwrap();
        let coupon = inner
            .coupons
            .values()
            .find(|c| c.code == code)
            .cloned()
            .ok_or(CouponError::NotFound)?;
        coupon.check(Utc::now(), store_id)?;

        Ok(coupon)
    }

    async fn quote(&self, code: &str, store_id: StoreId, subtotal: Decimal) -> ServiceResult<CouponQuote> {
        let coupon = self.validate(code, store_id).await?;
        Ok(quote_for(coupon, subtotal))
    }

    async fn create_coupon(&self, payload: NewCoupon) -> ServiceResult<Coupon> {
        check_new_coupon(&payload)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.coupons.values().any(|c| c.code == payload.code) {
            return Err(Error::DuplicateCoupon(payload.code));
        }
        let coupon = payload.into_coupon();
        inner.coupons.insert(coupon.id, coupon.clone());

        Ok(coupon)
    }
}
