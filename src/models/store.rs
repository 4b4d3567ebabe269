use rust_decimal::Decimal;
use tokio_postgres::Row;

use crate::errors::RepoError;
use crate::types::*;
use crate::util::{column, FromRow};

const ID_COLUMN: &str = "id";
const OWNER_ID_COLUMN: &str = "owner_id";
const NAME_COLUMN: &str = "name";
const DELIVERY_FEE_COLUMN: &str = "delivery_fee";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub name: String,
    pub delivery_fee: Decimal,
}

impl FromRow for Store {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: StoreId(column(row, ID_COLUMN)?),
            owner_id: UserId(column(row, OWNER_ID_COLUMN)?),
            name: column(row, NAME_COLUMN)?,
            delivery_fee: column(row, DELIVERY_FEE_COLUMN)?,
        })
    }
}
