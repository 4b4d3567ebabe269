use chrono::prelude::*;
use rust_decimal::Decimal;
use tokio_postgres::Row;

use super::common::round_money;
use crate::errors::{Error, RepoError};
use crate::types::*;
use crate::util::{column, FromRow};

pub const ID_COLUMN: &str = "id";
pub const STORE_ID_COLUMN: &str = "store_id";
pub const NAME_COLUMN: &str = "name";
pub const PRICE_COLUMN: &str = "price";
pub const DISCOUNT_PERCENTAGE_COLUMN: &str = "discount_percentage";
pub const STOCK_QUANTITY_COLUMN: &str = "stock_quantity";
pub const LOW_STOCK_THRESHOLD_COLUMN: &str = "low_stock_threshold";
pub const IS_AVAILABLE_COLUMN: &str = "is_available";
pub const TOTAL_SOLD_COLUMN: &str = "total_sold";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Catalog entry as seen by carts and orders
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: String,
    pub price: Decimal,
    pub discount_percentage: Decimal,
    pub stock_quantity: Quantity,
    pub low_stock_threshold: Quantity,
    pub is_available: bool,
    pub total_sold: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit price after the product's own percentage discount.
    ///
    /// Never negative and never above `price`, whatever the stored percentage is.
    pub fn discount_price(&self) -> Decimal {
        if self.discount_percentage <= Decimal::ZERO {
            return self.price;
        }
        let percentage = self.discount_percentage.min(Decimal::ONE_HUNDRED);
        let discounted = round_money(self.price - self.price * percentage / Decimal::ONE_HUNDRED);

        discounted.max(Decimal::ZERO).min(self.price)
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }

    /// Checks that `quantity` units can be put into a cart or an order.
    pub fn ensure_orderable(&self, quantity: Quantity) -> Result<(), Error> {
        if !self.is_available || !self.is_in_stock() {
            return Err(Error::ProductUnavailable);
        }
        if quantity > self.stock_quantity {
            return Err(Error::InsufficientStock {
                product: self.id,
                available: self.stock_quantity,
            });
        }

        Ok(())
    }

    /// Checks stock for a checkout: a sold out product reports the shortage rather than unavailability.
    pub fn ensure_reservable(&self, quantity: Quantity) -> Result<(), Error> {
        if !self.is_available {
            return Err(Error::ProductUnavailable);
        }
        if quantity > self.stock_quantity {
            return Err(Error::InsufficientStock {
                product: self.id,
                available: self.stock_quantity.max(0),
            });
        }

        Ok(())
    }
}

impl FromRow for Product {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: ProductId(column(row, ID_COLUMN)?),
            store_id: StoreId(column(row, STORE_ID_COLUMN)?),
            name: column(row, NAME_COLUMN)?,
            price: column(row, PRICE_COLUMN)?,
            discount_percentage: column(row, DISCOUNT_PERCENTAGE_COLUMN)?,
            stock_quantity: column(row, STOCK_QUANTITY_COLUMN)?,
            low_stock_threshold: column(row, LOW_STOCK_THRESHOLD_COLUMN)?,
            is_available: column(row, IS_AVAILABLE_COLUMN)?,
            total_sold: column(row, TOTAL_SOLD_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
            updated_at: column(row, UPDATED_AT_COLUMN)?,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn make_product(price: Decimal, discount_percentage: Decimal, stock_quantity: Quantity) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(),
            store_id: StoreId::new(),
            name: "Margherita".to_string(),
            price,
            discount_percentage,
            stock_quantity,
            low_stock_threshold: 2,
            is_available: true,
            total_sold: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn discount_price_applies_percentage() {
        let product = make_product(Decimal::new(1000, 2), Decimal::new(15, 0), 5);
        assert_eq!(product.discount_price(), Decimal::new(850, 2));
    }

    #[test]
    fn discount_price_without_discount_is_price() {
        let product = make_product(Decimal::new(1000, 2), Decimal::ZERO, 5);
        assert_eq!(product.discount_price(), Decimal::new(1000, 2));
    }

    #[test]
    fn discount_price_is_clamped() {
        let over = make_product(Decimal::new(1000, 2), Decimal::new(150, 0), 5);
        assert_eq!(over.discount_price(), Decimal::ZERO);

        let negative = make_product(Decimal::new(1000, 2), Decimal::new(-20, 0), 5);
        assert_eq!(negative.discount_price(), Decimal::new(1000, 2));
    }

    #[test]
    fn orderable_checks() {
        let mut product = make_product(Decimal::new(500, 2), Decimal::ZERO, 3);
        assert!(product.ensure_orderable(3).is_ok());
        match product.ensure_orderable(4) {
            Err(Error::InsufficientStock { available, .. }) => assert_eq!(available, 3),
            other => panic!("Unexpected result {:?}", other),
        }

        product.is_available = false;
        match product.ensure_orderable(1) {
            Err(Error::ProductUnavailable) => {}
            other => panic!("Unexpected result {:?}", other),
        }

        product.is_available = true;
        product.stock_quantity = 0;
        match product.ensure_orderable(1) {
            Err(Error::ProductUnavailable) => {}
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn sold_out_product_reports_shortage_at_checkout() {
        let product = make_product(Decimal::new(500, 2), Decimal::ZERO, 0);
        match product.ensure_reservable(1) {
            Err(Error::InsufficientStock { available, .. }) => assert_eq!(available, 0),
            other => panic!("Unexpected result {:?}", other),
        }
    }
}
