use super::*;
use crate::models::{Coupon, CouponRedemption};
use crate::types::*;

pub async fn find_by_code<C: GenericClient + Sync>(client: &C, code: &str) -> Result<Option<Coupon>, RepoError> {
    fetch_opt(client, "SELECT * FROM coupons WHERE code = $1;", &[Box::new(code.to_string()) as SqlArg]).await
}

/// Inserts the coupon unless its code is taken, in which case `None` is returned.
pub async fn insert<C: GenericClient + Sync>(client: &C, coupon: &Coupon) -> Result<Option<Coupon>, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO coupons \
         (id, code, description, discount_type, discount_value, min_order_amount, max_discount_amount, \
          valid_from, valid_until, usage_limit, usage_per_user, times_used, store_id, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (code) DO NOTHING \
         RETURNING *;",
        &[
            Box::new(coupon.id.0) as SqlArg,
            Box::new(coupon.code.clone()),
            Box::new(coupon.description.clone()),
            Box::new(coupon.discount_type.as_str()),
            Box::new(coupon.discount_value),
            Box::new(coupon.min_order_amount),
            Box::new(coupon.max_discount_amount),
            Box::new(coupon.valid_from),
            Box::new(coupon.valid_until),
            Box::new(coupon.usage_limit),
            Box::new(coupon.usage_per_user),
            Box::new(coupon.times_used),
            Box::new(coupon.store_id.map(|v| v.0)),
            Box::new(coupon.is_active),
            Box::new(coupon.created_at),
        ],
    )
    .await
}

/// Counts one more use of the coupon. Returns `None` when the global limit is already reached.
pub async fn increment_usage<C: GenericClient + Sync>(client: &C, id: CouponId) -> Result<Option<Coupon>, RepoError> {
    fetch_opt(
        client,
        "UPDATE coupons SET times_used = times_used + 1 \
         WHERE id = $1 AND (usage_limit IS NULL OR times_used < usage_limit) \
         RETURNING *;",
        &[Box::new(id.0) as SqlArg],
    )
    .await
}

pub async fn count_redemptions<C: GenericClient + Sync>(client: &C, coupon_id: CouponId, user_id: UserId) -> Result<i64, RepoError> {
    let row = client
        .query_one(
            "SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = $1 AND user_id = $2;",
            &[&coupon_id.0, &user_id.0],
        )
        .await?;
    Ok(row.try_get(0)?)
}

pub async fn insert_redemption<C: GenericClient + Sync>(client: &C, redemption: &CouponRedemption) -> Result<CouponRedemption, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO coupon_redemptions (id, coupon_id, order_id, user_id, discount_amount, used_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *;",
        &[
            Box::new(redemption.id.0) as SqlArg,
            Box::new(redemption.coupon_id.0),
            Box::new(redemption.order_id.0),
            Box::new(redemption.user_id.0),
            Box::new(redemption.discount_amount),
            Box::new(redemption.used_at),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}

pub async fn redemption_for_order<C: GenericClient + Sync>(client: &C, order_id: OrderId) -> Result<Option<CouponRedemption>, RepoError> {
    fetch_opt(
        client,
        "SELECT * FROM coupon_redemptions WHERE order_id = $1;",
        &[Box::new(order_id.0) as SqlArg],
    )
    .await
}

/// Same as `find_by_code`, locking the coupon until the transaction ends.
pub async fn lock_by_code<C: GenericClient + Sync>(client: &C, code: &str) -> Result<Option<Coupon>, RepoError> {
    fetch_opt(
        client,
        "SELECT * FROM coupons WHERE code = $1 FOR UPDATE;",
        &[Box::new(code.to_string()) as SqlArg],
    )
    .await
}
