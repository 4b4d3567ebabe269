use super::*;
use crate::models::Refund;
use crate::types::*;

pub async fn list_for_payment<C: GenericClient + Sync>(client: &C, payment_id: PaymentId) -> Result<Vec<Refund>, RepoError> {
    fetch(
        client,
        "SELECT * FROM refunds WHERE payment_id = $1 ORDER BY created_at;",
        &[Box::new(payment_id.0) as SqlArg],
    )
    .await
}

/// Refunds reserved against the payment but not yet answered by the gateway.
pub async fn list_pending<C: GenericClient + Sync>(client: &C, payment_id: PaymentId) -> Result<Vec<Refund>, RepoError> {
    fetch(
        client,
        "SELECT * FROM refunds WHERE payment_id = $1 AND status = 'pending';",
        &[Box::new(payment_id.0) as SqlArg],
    )
    .await
}

pub async fn insert<C: GenericClient + Sync>(client: &C, refund: &Refund) -> Result<Refund, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO refunds \
         (id, payment_id, order_id, amount, reason, description, status, gateway_refund_id, failure_reason, created_at, processed_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING *;",
        &[
            Box::new(refund.id.0) as SqlArg,
            Box::new(refund.payment_id.0),
            Box::new(refund.order_id.0),
            Box::new(refund.amount),
            Box::new(refund.reason.as_str()),
            Box::new(refund.description.clone()),
            Box::new(refund.status.as_str()),
            Box::new(refund.gateway_refund_id.clone()),
            Box::new(refund.failure_reason.clone()),
            Box::new(refund.created_at),
            Box::new(refund.processed_at),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}

pub async fn update<C: GenericClient + Sync>(client: &C, refund: &Refund) -> Result<Refund, RepoError> {
    fetch_opt(
        client,
        "UPDATE refunds \
         SET status = $1, gateway_refund_id = $2, failure_reason = $3, processed_at = $4 \
         WHERE id = $5 \
         RETURNING *;",
        &[
            Box::new(refund.status.as_str()) as SqlArg,
            Box::new(refund.gateway_refund_id.clone()),
            Box::new(refund.failure_reason.clone()),
            Box::new(refund.processed_at),
            Box::new(refund.id.0),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}
