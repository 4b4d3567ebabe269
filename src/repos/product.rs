use uuid::Uuid;

use super::*;
use crate::models::Product;
use crate::types::*;

const TABLE: &str = "products";

pub async fn get<C: GenericClient + Sync>(client: &C, id: ProductId) -> Result<Option<Product>, RepoError> {
    fetch_opt(client, "SELECT * FROM products WHERE id = $1;", &[Box::new(id.0) as SqlArg]).await
}

pub async fn get_many<C: GenericClient + Sync>(client: &C, ids: &[ProductId]) -> Result<Vec<Product>, RepoError> {
    let ids = ids.iter().map(|id| id.0).collect::<Vec<Uuid>>();
    fetch(client, "SELECT * FROM products WHERE id = ANY($1) ORDER BY id;", &[Box::new(ids) as SqlArg]).await
}

/// Locks the given products in id order, so concurrent checkouts never deadlock on each other.
pub async fn lock_many<C: GenericClient + Sync>(client: &C, ids: &[ProductId]) -> Result<Vec<Product>, RepoError> {
    let ids = ids.iter().map(|id| id.0).collect::<Vec<Uuid>>();
    fetch(
        client,
        &format!("SELECT * FROM {} WHERE id = ANY($1) ORDER BY id FOR UPDATE;", TABLE),
        &[Box::new(ids) as SqlArg],
    )
    .await
}

/// Takes `quantity` units out of stock. Returns `None` when not enough units are left.
pub async fn decrement_stock<C: GenericClient + Sync>(client: &C, id: ProductId, quantity: Quantity) -> Result<Option<Product>, RepoError> {
    fetch_opt(
        client,
        "UPDATE products \
         SET stock_quantity = stock_quantity - $1, total_sold = total_sold + $1, updated_at = now() \
         WHERE id = $2 AND stock_quantity >= $1 \
         RETURNING *;",
        &[Box::new(quantity) as SqlArg, Box::new(id.0)],
    )
    .await
}
