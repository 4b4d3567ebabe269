use chrono::{DateTime, Utc};

use super::*;
use crate::models::Payment;
use crate::types::*;

pub async fn get<C: GenericClient + Sync>(client: &C, id: PaymentId) -> Result<Option<Payment>, RepoError> {
    fetch_opt(client, "SELECT * FROM payments WHERE id = $1;", &[Box::new(id.0) as SqlArg]).await
}

pub async fn lock<C: GenericClient + Sync>(client: &C, id: PaymentId) -> Result<Option<Payment>, RepoError> {
    fetch_opt(client, "SELECT * FROM payments WHERE id = $1 FOR UPDATE;", &[Box::new(id.0) as SqlArg]).await
}

pub async fn get_for_order<C: GenericClient + Sync>(client: &C, order_id: OrderId) -> Result<Option<Payment>, RepoError> {
    fetch_opt(client, "SELECT * FROM payments WHERE order_id = $1;", &[Box::new(order_id.0) as SqlArg]).await
}

pub async fn lock_by_intent<C: GenericClient + Sync>(client: &C, intent_id: &str) -> Result<Option<Payment>, RepoError> {
    fetch_opt(
        client,
        "SELECT * FROM payments WHERE gateway_intent_id = $1 FOR UPDATE;",
        &[Box::new(intent_id.to_string()) as SqlArg],
    )
    .await
}

pub async fn get_by_intent<C: GenericClient + Sync>(client: &C, intent_id: &str) -> Result<Option<Payment>, RepoError> {
    fetch_opt(
        client,
        "SELECT * FROM payments WHERE gateway_intent_id = $1;",
        &[Box::new(intent_id.to_string()) as SqlArg],
    )
    .await
}

/// Claims a payment for an intent request. Returns `None` when another request
/// holds a live claim or the payment already has an intent.
pub async fn claim_for_intent<C: GenericClient + Sync>(
    client: &C,
    payment: &Payment,
    stale_before: DateTime<Utc>,
) -> Result<Option<Payment>, RepoError> {
    fetch_opt(
        client,
        "UPDATE payments \
         SET amount = $1, status = $2, updated_at = $3 \
         WHERE id = $4 AND gateway_intent_id IS NULL \
           AND (status = 'pending' OR (status = 'processing' AND updated_at < $5)) \
         RETURNING *;",
        &[
            Box::new(payment.amount) as SqlArg,
            Box::new(payment.status.as_str()),
            Box::new(payment.updated_at),
            Box::new(payment.id.0),
            Box::new(stale_before),
        ],
    )
    .await
}

/// Inserts the payment unless the order already has one or the transaction id is taken.
pub async fn insert<C: GenericClient + Sync>(client: &C, payment: &Payment) -> Result<Option<Payment>, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO payments \
         (id, order_id, user_id, transaction_id, payment_method, amount, currency, status, gateway_intent_id, gateway_charge_id, \
          gateway_response, failure_reason, failure_code, refunded_amount, created_at, updated_at, completed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
         ON CONFLICT DO NOTHING \
         RETURNING *;",
        &[
            Box::new(payment.id.0) as SqlArg,
            Box::new(payment.order_id.0),
            Box::new(payment.user_id.0),
            Box::new(payment.transaction_id.0.clone()),
            Box::new(payment.payment_method.as_str()),
            Box::new(payment.amount),
            Box::new(payment.currency.clone()),
            Box::new(payment.status.as_str()),
            Box::new(payment.gateway_intent_id.clone()),
            Box::new(payment.gateway_charge_id.clone()),
            Box::new(payment.gateway_response.clone()),
            Box::new(payment.failure_reason.clone()),
            Box::new(payment.failure_code.clone()),
            Box::new(payment.refunded_amount),
            Box::new(payment.created_at),
            Box::new(payment.updated_at),
            Box::new(payment.completed_at),
        ],
    )
    .await
}

/// Writes back everything but the identity of the payment.
pub async fn update<C: GenericClient + Sync>(client: &C, payment: &Payment) -> Result<Payment, RepoError> {
    fetch_opt(
        client,
        "UPDATE payments \
         SET amount = $1, status = $2, gateway_intent_id = $3, gateway_charge_id = $4, gateway_response = $5, \
             failure_reason = $6, failure_code = $7, refunded_amount = $8, updated_at = $9, completed_at = $10 \
         WHERE id = $11 \
         RETURNING *;",
        &[
            Box::new(payment.amount) as SqlArg,
            Box::new(payment.status.as_str()),
            Box::new(payment.gateway_intent_id.clone()),
            Box::new(payment.gateway_charge_id.clone()),
            Box::new(payment.gateway_response.clone()),
            Box::new(payment.failure_reason.clone()),
            Box::new(payment.failure_code.clone()),
            Box::new(payment.refunded_amount),
            Box::new(payment.updated_at),
            Box::new(payment.completed_at),
            Box::new(payment.id.0),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}
