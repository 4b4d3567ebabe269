use super::*;
use crate::models::Store;
use crate::types::*;

pub async fn get<C: GenericClient + Sync>(client: &C, id: StoreId) -> Result<Option<Store>, RepoError> {
    fetch_opt(client, "SELECT * FROM stores WHERE id = $1;", &[Box::new(id.0) as SqlArg]).await
}
