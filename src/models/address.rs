use chrono::prelude::*;
use tokio_postgres::Row;
use validator::Validate;

use crate::errors::RepoError;
use crate::types::*;
use crate::util::{column, parsed_column, FromRow};

pub const ID_COLUMN: &str = "id";
pub const USER_ID_COLUMN: &str = "user_id";
pub const ADDRESS_TYPE_COLUMN: &str = "address_type";
pub const LINE1_COLUMN: &str = "address_line1";
pub const LINE2_COLUMN: &str = "address_line2";
pub const CITY_COLUMN: &str = "city";
pub const STATE_COLUMN: &str = "state";
pub const POSTAL_CODE_COLUMN: &str = "postal_code";
pub const COUNTRY_COLUMN: &str = "country";
pub const IS_DEFAULT_COLUMN: &str = "is_default";
pub const DELIVERY_INSTRUCTIONS_COLUMN: &str = "delivery_instructions";
pub const CREATED_AT_COLUMN: &str = "created_at";

string_enum! {
    pub enum AddressType {
        Home => "home",
        Work => "work",
        Other => "other",
    }
}

impl Default for AddressType {
    fn default() -> Self {
        AddressType::Home
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub address_type: AddressType,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub delivery_instructions: String,
    pub created_at: DateTime<Utc>,
}

impl Address {
    pub fn belongs_to(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

impl FromRow for Address {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: AddressId(column(row, ID_COLUMN)?),
            user_id: UserId(column(row, USER_ID_COLUMN)?),
            address_type: parsed_column(row, ADDRESS_TYPE_COLUMN)?,
            address_line1: column(row, LINE1_COLUMN)?,
            address_line2: column(row, LINE2_COLUMN)?,
            city: column(row, CITY_COLUMN)?,
            state: column(row, STATE_COLUMN)?,
            postal_code: column(row, POSTAL_CODE_COLUMN)?,
            country: column(row, COUNTRY_COLUMN)?,
            is_default: column(row, IS_DEFAULT_COLUMN)?,
            delivery_instructions: column(row, DELIVERY_INSTRUCTIONS_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
        })
    }
}

fn default_country() -> String {
    "USA".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewAddress {
    #[serde(default)]
    pub address_type: AddressType,
    #[validate(length(min = 1, max = 255))]
    pub address_line1: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub address_line2: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub delivery_instructions: String,
}

impl NewAddress {
    pub fn into_address(self, user_id: UserId) -> Address {
        Address {
            id: AddressId::new(),
            user_id,
            address_type: self.address_type,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            is_default: self.is_default,
            delivery_instructions: self.delivery_instructions,
            created_at: Utc::now(),
        }
    }
}
