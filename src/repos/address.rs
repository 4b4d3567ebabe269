use super::*;
use crate::models::Address;
use crate::types::*;

pub async fn get<C: GenericClient + Sync>(client: &C, id: AddressId) -> Result<Option<Address>, RepoError> {
    fetch_opt(client, "SELECT * FROM addresses WHERE id = $1;", &[Box::new(id.0) as SqlArg]).await
}

pub async fn list_for_user<C: GenericClient + Sync>(client: &C, user_id: UserId) -> Result<Vec<Address>, RepoError> {
    fetch(
        client,
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC;",
        &[Box::new(user_id.0) as SqlArg],
    )
    .await
}

pub async fn count_for_user<C: GenericClient + Sync>(client: &C, user_id: UserId) -> Result<i64, RepoError> {
    let row = client.query_one("SELECT COUNT(*) FROM addresses WHERE user_id = $1;", &[&user_id.0]).await?;
    Ok(row.try_get(0)?)
}

pub async fn insert<C: GenericClient + Sync>(client: &C, address: &Address) -> Result<Address, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO addresses \
         (id, user_id, address_type, address_line1, address_line2, city, state, postal_code, country, is_default, delivery_instructions, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         RETURNING *;",
        &[
            Box::new(address.id.0) as SqlArg,
            Box::new(address.user_id.0),
            Box::new(address.address_type.as_str()),
            Box::new(address.address_line1.clone()),
            Box::new(address.address_line2.clone()),
            Box::new(address.city.clone()),
            Box::new(address.state.clone()),
            Box::new(address.postal_code.clone()),
            Box::new(address.country.clone()),
            Box::new(address.is_default),
            Box::new(address.delivery_instructions.clone()),
            Box::new(address.created_at),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}

/// Drops the default flag from every address of the user.
pub async fn clear_default<C: GenericClient + Sync>(client: &C, user_id: UserId) -> Result<u64, RepoError> {
    Ok(client
        .execute(
            "UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default;",
            &[&user_id.0],
        )
        .await?)
}

pub async fn mark_default<C: GenericClient + Sync>(client: &C, id: AddressId) -> Result<Option<Address>, RepoError> {
    fetch_opt(
        client,
        "UPDATE addresses SET is_default = TRUE WHERE id = $1 RETURNING *;",
        &[Box::new(id.0) as SqlArg],
    )
    .await
}
