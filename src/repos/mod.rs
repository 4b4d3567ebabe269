//! Row mapping and SQL for each table.
//!
//! Every function takes any `GenericClient`, so the same code runs on a pooled
//! connection or inside a transaction.

use tokio_postgres::GenericClient;

use crate::errors::RepoError;
use crate::util::*;

pub mod address;
pub mod cart;
pub mod cart_line;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod order_diff;
pub mod order_line;
pub mod payment;
pub mod product;
pub mod refund;
pub mod store;

/// Runs `query` and converts every returned row.
pub async fn fetch<C, T>(client: &C, query: &str, args: &[SqlArg]) -> Result<Vec<T>, RepoError>
where
    C: GenericClient + Sync,
    T: FromRow,
{
    let rows = client.query(query, &as_params(args)).await?;
    rows.iter().map(T::from_row).collect()
}

/// Runs `query` and converts the first returned row, if any.
pub async fn fetch_opt<C, T>(client: &C, query: &str, args: &[SqlArg]) -> Result<Option<T>, RepoError>
where
    C: GenericClient + Sync,
    T: FromRow,
{
    let rows = client.query(query, &as_params(args)).await?;
    rows.first().map(T::from_row).transpose()
}

pub async fn select<C, T, F>(client: &C, table: &'static str, filter: F) -> Result<Vec<T>, RepoError>
where
    C: GenericClient + Sync,
    T: FromRow,
    F: Filter,
{
    let (query, args) = filter.into_query_builder(SimpleQueryOperation::Select, table).build();
    fetch(client, &query, &args).await
}

/// Same as `select`, locking the returned rows until the transaction ends.
pub async fn select_for_update<C, T, F>(client: &C, table: &'static str, filter: F) -> Result<Vec<T>, RepoError>
where
    C: GenericClient + Sync,
    T: FromRow,
    F: Filter,
{
    let (query, args) = filter.into_query_builder(SimpleQueryOperation::SelectForUpdate, table).build();
    fetch(client, &query, &args).await
}

pub async fn delete<C, T, F>(client: &C, table: &'static str, filter: F) -> Result<Vec<T>, RepoError>
where
    C: GenericClient + Sync,
    T: FromRow,
    F: Filter,
{
    let (query, args) = filter.into_query_builder(SimpleQueryOperation::Delete, table).build();
    fetch(client, &query, &args).await
}
