use chrono::prelude::*;
use rust_decimal::Decimal;
use tokio_postgres::Row;
use validator::Validate;

use super::product::Product;
use super::store::Store;
use crate::errors::RepoError;
use crate::types::*;
use crate::util::{column, Filter, FromRow, SimpleQueryBuilder, SimpleQueryOperation};

pub const ID_COLUMN: &str = "id";
pub const USER_ID_COLUMN: &str = "user_id";
pub const STORE_ID_COLUMN: &str = "store_id";
pub const CART_ID_COLUMN: &str = "cart_id";
pub const PRODUCT_ID_COLUMN: &str = "product_id";
pub const QUANTITY_COLUMN: &str = "quantity";
pub const INSTRUCTIONS_COLUMN: &str = "special_instructions";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// One open cart per (user, store)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub store_id: StoreId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: UserId, store_id: StoreId) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            user_id,
            store_id,
            created_at: now,
            updated_at: now,
        }
    }
}

impl FromRow for Cart {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: CartId(column(row, ID_COLUMN)?),
            user_id: UserId(column(row, USER_ID_COLUMN)?),
            store_id: StoreId(column(row, STORE_ID_COLUMN)?),
            created_at: column(row, CREATED_AT_COLUMN)?,
            updated_at: column(row, UPDATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct CartFilter {
    pub id: Option<CartId>,
    pub user_id: Option<UserId>,
    pub store_id: Option<StoreId>,
}

impl Filter for CartFilter {
    fn into_query_builder(self, op: SimpleQueryOperation, table: &'static str) -> SimpleQueryBuilder {
        let mut b = SimpleQueryBuilder::new(op, table);

        if let Some(v) = self.id {
            b = b.with_arg(ID_COLUMN, v.0);
        }

        if let Some(v) = self.user_id {
            b = b.with_arg(USER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.store_id {
            b = b.with_arg(STORE_ID_COLUMN, v.0);
        }

        b.with_ordering("created_at")
    }
}

/// Product line in a cart. Prices are not stored, they come from the live product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub special_instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(cart_id: CartId, product_id: ProductId, quantity: Quantity, special_instructions: String) -> Self {
        let now = Utc::now();
        Self {
            id: CartLineId::new(),
            cart_id,
            product_id,
            quantity,
            special_instructions,
            created_at: now,
            updated_at: now,
        }
    }
}

impl FromRow for CartLine {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: CartLineId(column(row, ID_COLUMN)?),
            cart_id: CartId(column(row, CART_ID_COLUMN)?),
            product_id: ProductId(column(row, PRODUCT_ID_COLUMN)?),
            quantity: column(row, QUANTITY_COLUMN)?,
            special_instructions: column(row, INSTRUCTIONS_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
            updated_at: column(row, UPDATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct CartLineFilter {
    pub id: Option<CartLineId>,
    pub cart_id: Option<CartId>,
    pub product_id: Option<ProductId>,
}

impl Filter for CartLineFilter {
    fn into_query_builder(self, op: SimpleQueryOperation, table: &'static str) -> SimpleQueryBuilder {
        let mut b = SimpleQueryBuilder::new(op, table);

        if let Some(v) = self.id {
            b = b.with_arg(ID_COLUMN, v.0);
        }

        if let Some(v) = self.cart_id {
            b = b.with_arg(CART_ID_COLUMN, v.0);
        }

        if let Some(v) = self.product_id {
            b = b.with_arg(PRODUCT_ID_COLUMN, v.0);
        }

        b.with_ordering("created_at")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewCartItem {
    pub product_id: ProductId,
    #[validate(range(min = 1))]
    pub quantity: Quantity,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub special_instructions: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub product_name: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Cart contents with values derived from the current catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub store_name: String,
    pub lines: Vec<CartLineView>,
    pub delivery_fee: Decimal,
    pub total_items: Quantity,
    pub subtotal: Decimal,
    pub total: Decimal,
}

impl CartView {
    pub fn new(cart: Cart, store: &Store, lines: Vec<(CartLine, Product)>) -> Self {
        let lines = lines
            .into_iter()
            .map(|(line, product)| {
                let unit_price = product.discount_price();
                CartLineView {
                    total_price: unit_price * Decimal::from(line.quantity),
                    unit_price,
                    product_name: product.name,
                    line,
                }
            })
            .collect::<Vec<_>>();

        let total_items = lines.iter().map(|v| v.line.quantity).sum();
        let subtotal = lines.iter().map(|v| v.total_price).sum::<Decimal>();

        Self {
            cart,
            store_name: store.name.clone(),
            lines,
            delivery_fee: store.delivery_fee,
            total_items,
            subtotal,
            total: subtotal + store.delivery_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::tests::make_product;

    #[test]
    fn derived_totals() {
        let store = Store {
            id: StoreId::new(),
            owner_id: UserId::new(),
            name: "Corner Deli".to_string(),
            delivery_fee: Decimal::new(300, 2),
        };
        let cart = Cart::new(UserId::new(), store.id);
        let pizza = make_product(Decimal::new(1000, 2), Decimal::new(10, 0), 10);
        let soda = make_product(Decimal::new(250, 2), Decimal::ZERO, 10);

        let view = CartView::new(
            cart.clone(),
            &store,
            vec![
                (CartLine::new(cart.id, pizza.id, 2, String::new()), pizza),
                (CartLine::new(cart.id, soda.id, 3, "cold".to_string()), soda),
            ],
        );

        assert_eq!(view.total_items, 5);
        // 2 * 9.00 + 3 * 2.50
        assert_eq!(view.subtotal, Decimal::new(2550, 2));
        assert_eq!(view.total, Decimal::new(2850, 2));
        assert_eq!(view.lines[0].unit_price, Decimal::new(900, 2));
    }
}
