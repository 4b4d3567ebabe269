use super::*;
use crate::models::cart::CartFilter;
use crate::models::Cart;
use crate::types::*;

const TABLE: &str = "carts";

pub async fn find<C: GenericClient + Sync>(client: &C, filter: CartFilter) -> Result<Vec<Cart>, RepoError> {
    select(client, TABLE, filter).await
}

pub async fn lock<C: GenericClient + Sync>(client: &C, user_id: UserId, store_id: StoreId) -> Result<Option<Cart>, RepoError> {
    let filter = CartFilter {
        user_id: Some(user_id),
        store_id: Some(store_id),
        ..Default::default()
    };
    Ok(select_for_update(client, TABLE, filter).await?.into_iter().next())
}

/// Returns the cart of the user in the store, creating it first if needed.
pub async fn get_or_create<C: GenericClient + Sync>(client: &C, user_id: UserId, store_id: StoreId) -> Result<Cart, RepoError> {
    let cart = Cart::new(user_id, store_id);
    fetch_opt(
        client,
        "INSERT INTO carts (id, user_id, store_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $4) \
         ON CONFLICT (user_id, store_id) DO UPDATE SET updated_at = EXCLUDED.updated_at \
         RETURNING *;",
        &[
            Box::new(cart.id.0) as SqlArg,
            Box::new(user_id.0),
            Box::new(store_id.0),
            Box::new(cart.created_at),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}

pub async fn touch<C: GenericClient + Sync>(client: &C, id: CartId) -> Result<(), RepoError> {
    client.execute("UPDATE carts SET updated_at = now() WHERE id = $1;", &[&id.0]).await?;
    Ok(())
}

/// Deletes carts together with their lines.
pub async fn remove<C: GenericClient + Sync>(client: &C, filter: CartFilter) -> Result<Vec<Cart>, RepoError> {
    delete(client, TABLE, filter).await
}
