use uuid::Uuid;

use super::*;
use crate::models::cart::CartLineFilter;
use crate::models::CartLine;
use crate::types::*;

const TABLE: &str = "cart_lines";

pub async fn lock<C: GenericClient + Sync>(client: &C, filter: CartLineFilter) -> Result<Option<CartLine>, RepoError> {
    Ok(select_for_update(client, TABLE, filter).await?.into_iter().next())
}

pub async fn list_for_carts<C: GenericClient + Sync>(client: &C, cart_ids: &[CartId]) -> Result<Vec<CartLine>, RepoError> {
    let ids = cart_ids.iter().map(|id| id.0).collect::<Vec<Uuid>>();
    fetch(
        client,
        "SELECT * FROM cart_lines WHERE cart_id = ANY($1) ORDER BY created_at;",
        &[Box::new(ids) as SqlArg],
    )
    .await
}

/// Line `id` if it sits in a cart owned by `user_id`.
pub async fn get_owned<C: GenericClient + Sync>(client: &C, id: CartLineId, user_id: UserId) -> Result<Option<CartLine>, RepoError> {
    fetch_opt(
        client,
        "SELECT l.* FROM cart_lines l JOIN carts c ON c.id = l.cart_id WHERE l.id = $1 AND c.user_id = $2 FOR UPDATE OF l;",
        &[Box::new(id.0) as SqlArg, Box::new(user_id.0)],
    )
    .await
}

pub async fn insert<C: GenericClient + Sync>(client: &C, line: &CartLine) -> Result<CartLine, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO cart_lines (id, cart_id, product_id, quantity, special_instructions, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING *;",
        &[
            Box::new(line.id.0) as SqlArg,
            Box::new(line.cart_id.0),
            Box::new(line.product_id.0),
            Box::new(line.quantity),
            Box::new(line.special_instructions.clone()),
            Box::new(line.created_at),
            Box::new(line.updated_at),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}

pub async fn update<C: GenericClient + Sync>(client: &C, line: &CartLine) -> Result<Option<CartLine>, RepoError> {
    fetch_opt(
        client,
        "UPDATE cart_lines SET quantity = $1, special_instructions = $2, updated_at = now() WHERE id = $3 RETURNING *;",
        &[
            Box::new(line.quantity) as SqlArg,
            Box::new(line.special_instructions.clone()),
            Box::new(line.id.0),
        ],
    )
    .await
}

pub async fn remove<C: GenericClient + Sync>(client: &C, filter: CartLineFilter) -> Result<Vec<CartLine>, RepoError> {
    delete(client, TABLE, filter).await
}
