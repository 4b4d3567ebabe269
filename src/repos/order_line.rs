use super::*;
use crate::models::OrderLine;
use crate::types::*;

pub async fn list_for_order<C: GenericClient + Sync>(client: &C, order_id: OrderId) -> Result<Vec<OrderLine>, RepoError> {
    fetch(
        client,
        "SELECT * FROM order_lines WHERE order_id = $1 ORDER BY product_name;",
        &[Box::new(order_id.0) as SqlArg],
    )
    .await
}

pub async fn insert<C: GenericClient + Sync>(client: &C, line: &OrderLine) -> Result<OrderLine, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO order_lines (id, order_id, product_id, product_name, product_price, quantity, subtotal, special_instructions) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *;",
        &[
            Box::new(line.id.0) as SqlArg,
            Box::new(line.order_id.0),
            Box::new(line.product_id.map(|v| v.0)),
            Box::new(line.product_name.clone()),
            Box::new(line.product_price),
            Box::new(line.quantity),
            Box::new(line.subtotal),
            Box::new(line.special_instructions.clone()),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}
