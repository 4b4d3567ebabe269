use super::*;
use crate::models::{Order, OrderFilter};

const TABLE: &str = "orders";

pub async fn find<C: GenericClient + Sync>(client: &C, filter: OrderFilter) -> Result<Vec<Order>, RepoError> {
    select(client, TABLE, filter).await
}

pub async fn find_one<C: GenericClient + Sync>(client: &C, filter: OrderFilter) -> Result<Option<Order>, RepoError> {
    Ok(find(client, filter).await?.into_iter().next())
}

pub async fn lock<C: GenericClient + Sync>(client: &C, filter: OrderFilter) -> Result<Option<Order>, RepoError> {
    Ok(select_for_update(client, TABLE, filter).await?.into_iter().next())
}

/// Inserts the order unless its number is already taken, in which case `None` is returned.
pub async fn insert<C: GenericClient + Sync>(client: &C, order: &Order) -> Result<Option<Order>, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO orders \
         (id, order_number, customer_id, store_id, delivery_address_id, status, payment_method, payment_status, \
          subtotal, delivery_fee, tax_amount, discount_amount, total_amount, delivery_instructions, \
          created_at, updated_at, confirmed_at, delivered_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         ON CONFLICT (order_number) DO NOTHING \
         RETURNING *;",
        &[
            Box::new(order.id.0) as SqlArg,
            Box::new(order.order_number.0.clone()),
            Box::new(order.customer_id.0),
            Box::new(order.store_id.0),
            Box::new(order.delivery_address_id.map(|v| v.0)),
            Box::new(order.status.as_str()),
            Box::new(order.payment_method.as_str()),
            Box::new(order.payment_status.as_str()),
            Box::new(order.subtotal),
            Box::new(order.delivery_fee),
            Box::new(order.tax_amount),
            Box::new(order.discount_amount),
            Box::new(order.total_amount),
            Box::new(order.delivery_instructions.clone()),
            Box::new(order.created_at),
            Box::new(order.updated_at),
            Box::new(order.confirmed_at),
            Box::new(order.delivered_at),
        ],
    )
    .await
}

/// Writes back the mutable parts of an order: statuses and their timestamps.
pub async fn update_state<C: GenericClient + Sync>(client: &C, order: &Order) -> Result<Order, RepoError> {
    fetch_opt(
        client,
        "UPDATE orders \
         SET status = $1, payment_status = $2, updated_at = $3, confirmed_at = $4, delivered_at = $5 \
         WHERE id = $6 \
         RETURNING *;",
        &[
            Box::new(order.status.as_str()) as SqlArg,
            Box::new(order.payment_status.as_str()),
            Box::new(order.updated_at),
            Box::new(order.confirmed_at),
            Box::new(order.delivered_at),
            Box::new(order.id.0),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}
