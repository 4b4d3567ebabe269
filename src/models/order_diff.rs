use chrono::prelude::*;
use tokio_postgres::Row;
use uuid::Uuid;

use super::order::OrderStatus;
use crate::errors::RepoError;
use crate::types::*;
use crate::util::{column, parsed_column, Filter, FromRow, SimpleQueryBuilder, SimpleQueryOperation};

const ID_COLUMN: &str = "id";
const ORDER_ID_COLUMN: &str = "order_id";
const STATUS_COLUMN: &str = "status";
const COMMITTER_COLUMN: &str = "committer";
const NOTES_COLUMN: &str = "notes";
const CREATED_AT_COLUMN: &str = "created_at";

/// Append-only record of one order status transition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDiff {
    pub id: OrderDiffId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// `None` when the transition was made by the system, e.g. a payment confirmation
    pub committer: Option<UserId>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl OrderDiff {
    pub fn new<S: Into<String>>(order_id: OrderId, status: OrderStatus, committer: Option<UserId>, notes: S) -> Self {
        Self {
            id: OrderDiffId::new(),
            order_id,
            status,
            committer,
            notes: notes.into(),
            created_at: Utc::now(),
        }
    }
}

impl FromRow for OrderDiff {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: OrderDiffId(column(row, ID_COLUMN)?),
            order_id: OrderId(column(row, ORDER_ID_COLUMN)?),
            status: parsed_column(row, STATUS_COLUMN)?,
            committer: column::<Option<Uuid>>(row, COMMITTER_COLUMN)?.map(UserId),
            notes: column(row, NOTES_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderDiffFilter {
    pub order_id: Option<OrderId>,
    pub status: Option<OrderStatus>,
}

impl From<OrderId> for OrderDiffFilter {
    fn from(v: OrderId) -> Self {
        Self {
            order_id: Some(v),
            ..Default::default()
        }
    }
}

impl Filter for OrderDiffFilter {
    fn into_query_builder(self, op: SimpleQueryOperation, table: &'static str) -> SimpleQueryBuilder {
        let mut b = SimpleQueryBuilder::new(op, table);

        if let Some(v) = self.order_id {
            b = b.with_arg(ORDER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.status {
            b = b.with_arg(STATUS_COLUMN, v.as_str().to_string());
        }

        b.with_ordering("created_at ASC, seq ASC")
    }
}
