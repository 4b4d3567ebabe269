use super::*;
use crate::models::{OrderDiff, OrderDiffFilter};

const TABLE: &str = "order_diffs";

/// Status history, oldest entry first.
pub async fn find<C: GenericClient + Sync>(client: &C, filter: OrderDiffFilter) -> Result<Vec<OrderDiff>, RepoError> {
    select(client, TABLE, filter).await
}

pub async fn insert<C: GenericClient + Sync>(client: &C, diff: &OrderDiff) -> Result<OrderDiff, RepoError> {
    fetch_opt(
        client,
        "INSERT INTO order_diffs (id, order_id, status, committer, notes, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *;",
        &[
            Box::new(diff.id.0) as SqlArg,
            Box::new(diff.order_id.0),
            Box::new(diff.status.as_str()),
            Box::new(diff.committer.map(|v| v.0)),
            Box::new(diff.notes.clone()),
            Box::new(diff.created_at),
        ],
    )
    .await?
    .ok_or(RepoError::NotFound)
}
