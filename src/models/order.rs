use std::fmt;
use std::str::FromStr;

use chrono::prelude::*;
use rand::Rng;
use regex::Regex;
use rust_decimal::Decimal;
use tokio_postgres::Row;
use uuid::Uuid;
use validator::Validate;

use super::cart::CartLine;
use super::common::round_money;
use super::coupon::CouponRedemption;
use super::order_diff::OrderDiff;
use super::payment::PaymentStatus;
use super::product::Product;
use crate::errors::{Error, RepoError};
use crate::types::*;
use crate::util::{column, parsed_column, Filter, FromRow, SimpleQueryBuilder, SimpleQueryOperation};

pub const ID_COLUMN: &str = "id";
pub const ORDER_NUMBER_COLUMN: &str = "order_number";
pub const CUSTOMER_ID_COLUMN: &str = "customer_id";
pub const STORE_ID_COLUMN: &str = "store_id";
pub const DELIVERY_ADDRESS_ID_COLUMN: &str = "delivery_address_id";
pub const STATUS_COLUMN: &str = "status";
pub const PAYMENT_METHOD_COLUMN: &str = "payment_method";
pub const PAYMENT_STATUS_COLUMN: &str = "payment_status";
pub const SUBTOTAL_COLUMN: &str = "subtotal";
pub const DELIVERY_FEE_COLUMN: &str = "delivery_fee";
pub const TAX_AMOUNT_COLUMN: &str = "tax_amount";
pub const DISCOUNT_AMOUNT_COLUMN: &str = "discount_amount";
pub const TOTAL_AMOUNT_COLUMN: &str = "total_amount";
pub const DELIVERY_INSTRUCTIONS_COLUMN: &str = "delivery_instructions";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";
pub const CONFIRMED_AT_COLUMN: &str = "confirmed_at";
pub const DELIVERED_AT_COLUMN: &str = "delivered_at";

pub const ORDER_ID_COLUMN: &str = "order_id";
pub const PRODUCT_ID_COLUMN: &str = "product_id";
pub const PRODUCT_NAME_COLUMN: &str = "product_name";
pub const PRODUCT_PRICE_COLUMN: &str = "product_price";
pub const QUANTITY_COLUMN: &str = "quantity";
pub const INSTRUCTIONS_COLUMN: &str = "special_instructions";

lazy_static! {
    static ref ORDER_NUMBER_RE: Regex = Regex::new(r"^ORD-\d{6}$").unwrap();
}

string_enum! {
    /// Order lifecycle. Moves forward one step at a time, or to `Cancelled`.
    pub enum OrderStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Preparing => "preparing",
        Ready => "ready",
        OutForDelivery => "out_for_delivery",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        match self {
            OrderStatus::Delivered | OrderStatus::Cancelled => true,
            _ => false,
        }
    }

    /// The state following this one in the delivery sequence.
    pub fn next(&self) -> Option<OrderStatus> {
        use self::OrderStatus::*;

        match self {
            Pending => Some(Confirmed),
            Confirmed => Some(Preparing),
            Preparing => Some(Ready),
            Ready => Some(OutForDelivery),
            OutForDelivery => Some(Delivered),
            Delivered | Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        if to == OrderStatus::Cancelled {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

string_enum! {
    pub enum PaymentMethod {
        Card => "card",
        Cash => "cash",
        Wallet => "wallet",
    }
}

/// Human readable order reference, e.g. `ORD-123456`
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn generate() -> Self {
        OrderNumber(format!("ORD-{}", rand::thread_rng().gen_range(100_000..=999_999)))
    }

    pub fn is_well_formed(s: &str) -> bool {
        ORDER_NUMBER_RE.is_match(s)
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer_id: UserId,
    pub store_id: StoreId,
    pub delivery_address_id: Option<AddressId>,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub delivery_instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Moves the order to `status`, stamping the milestone timestamps.
    pub fn apply_status(&mut self, status: OrderStatus, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: status,
            });
        }

        self.status = status;
        self.updated_at = now;
        match status {
            OrderStatus::Confirmed => self.confirmed_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }

        Ok(())
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: OrderId(column(row, ID_COLUMN)?),
            order_number: OrderNumber(column(row, ORDER_NUMBER_COLUMN)?),
            customer_id: UserId(column(row, CUSTOMER_ID_COLUMN)?),
            store_id: StoreId(column(row, STORE_ID_COLUMN)?),
            delivery_address_id: column::<Option<Uuid>>(row, DELIVERY_ADDRESS_ID_COLUMN)?.map(AddressId),
            status: parsed_column(row, STATUS_COLUMN)?,
            payment_method: parsed_column(row, PAYMENT_METHOD_COLUMN)?,
            payment_status: parsed_column(row, PAYMENT_STATUS_COLUMN)?,
            subtotal: column(row, SUBTOTAL_COLUMN)?,
            delivery_fee: column(row, DELIVERY_FEE_COLUMN)?,
            tax_amount: column(row, TAX_AMOUNT_COLUMN)?,
            discount_amount: column(row, DISCOUNT_AMOUNT_COLUMN)?,
            total_amount: column(row, TOTAL_AMOUNT_COLUMN)?,
            delivery_instructions: column(row, DELIVERY_INSTRUCTIONS_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
            updated_at: column(row, UPDATED_AT_COLUMN)?,
            confirmed_at: column(row, CONFIRMED_AT_COLUMN)?,
            delivered_at: column(row, DELIVERED_AT_COLUMN)?,
        })
    }
}

/// Frozen copy of a product line at checkout time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: Quantity,
    pub subtotal: Decimal,
    pub special_instructions: String,
}

impl FromRow for OrderLine {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: OrderLineId(column(row, ID_COLUMN)?),
            order_id: OrderId(column(row, ORDER_ID_COLUMN)?),
            product_id: column::<Option<Uuid>>(row, PRODUCT_ID_COLUMN)?.map(ProductId),
            product_name: column(row, PRODUCT_NAME_COLUMN)?,
            product_price: column(row, PRODUCT_PRICE_COLUMN)?,
            quantity: column(row, QUANTITY_COLUMN)?,
            subtotal: column(row, SUBTOTAL_COLUMN)?,
            special_instructions: column(row, INSTRUCTIONS_COLUMN)?,
        })
    }
}

/// Order line before it is attached to an order
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: Quantity,
    pub subtotal: Decimal,
    pub special_instructions: String,
}

impl NewOrderLine {
    pub fn into_line(self, order_id: OrderId) -> OrderLine {
        OrderLine {
            id: OrderLineId::new(),
            order_id,
            product_id: Some(self.product_id),
            product_name: self.product_name,
            product_price: self.product_price,
            quantity: self.quantity,
            subtotal: self.subtotal,
            special_instructions: self.special_instructions,
        }
    }
}

/// Snapshots cart lines against current product data, checking every line can be fulfilled.
pub fn snapshot_lines(lines: &[(CartLine, Product)]) -> Result<Vec<NewOrderLine>, Error> {
    lines
        .iter()
        .map(|(line, product)| {
            product.ensure_reservable(line.quantity)?;
            let price = product.discount_price();
            Ok(NewOrderLine {
                product_id: product.id,
                product_name: product.name.clone(),
                product_price: price,
                quantity: line.quantity,
                subtotal: price * Decimal::from(line.quantity),
                special_instructions: line.special_instructions.clone(),
            })
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderPricing {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderPricing {
    /// `total = subtotal + delivery_fee + tax - discount`, tax charged on the undiscounted subtotal.
    pub fn compute(lines: &[NewOrderLine], delivery_fee: Decimal, tax_rate: Decimal, discount: Decimal) -> Self {
        let subtotal = lines.iter().map(|l| l.subtotal).sum::<Decimal>();
        let tax_amount = round_money(subtotal * tax_rate);
        let discount_amount = discount.max(Decimal::ZERO).min(subtotal);

        Self {
            subtotal,
            delivery_fee,
            tax_amount,
            discount_amount,
            total_amount: subtotal + delivery_fee + tax_amount - discount_amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateOrder {
    pub store_id: StoreId,
    pub delivery_address_id: AddressId,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub delivery_instructions: String,
    #[validate(length(min = 1, max = 50))]
    pub coupon_code: Option<String>,
}

impl CreateOrder {
    pub fn into_order(self, customer_id: UserId, order_number: OrderNumber, pricing: OrderPricing) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            order_number,
            customer_id,
            store_id: self.store_id,
            delivery_address_id: Some(self.delivery_address_id),
            status: OrderStatus::Pending,
            payment_method: self.payment_method,
            payment_status: PaymentStatus::Pending,
            subtotal: pricing.subtotal,
            delivery_fee: pricing.delivery_fee,
            tax_amount: pricing.tax_amount,
            discount_amount: pricing.discount_amount,
            total_amount: pricing.total_amount,
            delivery_instructions: self.delivery_instructions,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            delivered_at: None,
        }
    }
}

/// Order with its lines and status history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub history: Vec<OrderDiff>,
    pub coupon_redemption: Option<CouponRedemption>,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum OrderIdentifier {
    Id(OrderId),
    Number(OrderNumber),
}

impl FromStr for OrderIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if OrderNumber::is_well_formed(s) {
            return Ok(OrderIdentifier::Number(OrderNumber(s.to_string())));
        }
        Uuid::parse_str(s)
            .map(|id| OrderIdentifier::Id(OrderId(id)))
            .map_err(|_| Error::Validation(format!("{} is neither an order id nor an order number", s)))
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub id: Option<OrderId>,
    pub order_number: Option<OrderNumber>,
    pub customer_id: Option<UserId>,
    pub store_id: Option<StoreId>,
    pub status: Option<OrderStatus>,
}

impl From<OrderIdentifier> for OrderFilter {
    fn from(v: OrderIdentifier) -> Self {
        use self::OrderIdentifier::*;

        match v {
            Id(id) => Self {
                id: Some(id),
                ..Default::default()
            },
            Number(number) => Self {
                order_number: Some(number),
                ..Default::default()
            },
        }
    }
}

impl OrderFilter {
    /// Whether an order matches this filter, for callers that filter in memory.
    pub fn matches(&self, order: &Order) -> bool {
        self.id.map_or(true, |v| v == order.id)
            && self.order_number.as_ref().map_or(true, |v| *v == order.order_number)
            && self.customer_id.map_or(true, |v| v == order.customer_id)
            && self.store_id.map_or(true, |v| v == order.store_id)
            && self.status.map_or(true, |v| v == order.status)
    }
}

impl Filter for OrderFilter {
    fn into_query_builder(self, op: SimpleQueryOperation, table: &'static str) -> SimpleQueryBuilder {
        let mut b = SimpleQueryBuilder::new(op, table);

        if let Some(v) = self.id {
            b = b.with_arg(ID_COLUMN, v.0);
        }

        if let Some(v) = self.order_number {
            b = b.with_arg(ORDER_NUMBER_COLUMN, v.0);
        }

        if let Some(v) = self.customer_id {
            b = b.with_arg(CUSTOMER_ID_COLUMN, v.0);
        }

        if let Some(v) = self.store_id {
            b = b.with_arg(STORE_ID_COLUMN, v.0);
        }

        if let Some(v) = self.status {
            b = b.with_arg(STATUS_COLUMN, v.as_str().to_string());
        }

        b.with_ordering("created_at DESC")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::tests::make_product;

    #[test]
    fn state_machine() {
        use self::OrderStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(OutForDelivery.can_transition_to(Delivered));
        assert!(Ready.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Preparing));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("out_for_delivery".parse::<OrderStatus>(), Ok(OrderStatus::OutForDelivery));
        assert_eq!(OrderStatus::OutForDelivery.to_string(), "out_for_delivery");
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn pricing_scenario_without_coupon() {
        // 2 units of a 10.00 product, 3.00 delivery, 5% tax
        let product = make_product(Decimal::new(1000, 2), Decimal::ZERO, 5);
        let line = CartLine::new(CartId::new(), product.id, 2, String::new());
        let lines = snapshot_lines(&[(line, product)]).unwrap();

        let pricing = OrderPricing::compute(&lines, Decimal::new(300, 2), Decimal::new(5, 2), Decimal::ZERO);

        assert_eq!(pricing.subtotal, Decimal::new(2000, 2));
        assert_eq!(pricing.tax_amount, Decimal::new(100, 2));
        assert_eq!(pricing.total_amount, Decimal::new(2400, 2));
    }

    #[test]
    fn pricing_invariant_with_discount() {
        let a = make_product(Decimal::new(1234, 2), Decimal::new(10, 0), 5);
        let b = make_product(Decimal::new(399, 2), Decimal::ZERO, 5);
        let cart_id = CartId::new();
        let lines = snapshot_lines(&[
            (CartLine::new(cart_id, a.id, 3, String::new()), a),
            (CartLine::new(cart_id, b.id, 1, String::new()), b),
        ])
        .unwrap();

        let pricing = OrderPricing::compute(&lines, Decimal::new(299, 2), Decimal::new(5, 2), Decimal::new(500, 2));

        assert_eq!(pricing.subtotal, lines.iter().map(|l| l.subtotal).sum::<Decimal>());
        assert_eq!(
            pricing.total_amount,
            pricing.subtotal + pricing.delivery_fee + pricing.tax_amount - pricing.discount_amount
        );
    }

    #[test]
    fn discount_never_exceeds_subtotal() {
        let product = make_product(Decimal::new(500, 2), Decimal::ZERO, 5);
        let line = CartLine::new(CartId::new(), product.id, 1, String::new());
        let lines = snapshot_lines(&[(line, product)]).unwrap();

        let pricing = OrderPricing::compute(&lines, Decimal::new(300, 2), Decimal::new(5, 2), Decimal::new(5000, 2));

        assert_eq!(pricing.discount_amount, Decimal::new(500, 2));
        assert_eq!(pricing.total_amount, Decimal::new(325, 2));
    }

    #[test]
    fn snapshot_rejects_oversold_line() {
        let product = make_product(Decimal::new(500, 2), Decimal::ZERO, 1);
        let line = CartLine::new(CartId::new(), product.id, 2, String::new());

        match snapshot_lines(&[(line, product)]) {
            Err(Error::InsufficientStock { available, .. }) => assert_eq!(available, 1),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn apply_status_stamps_milestones() {
        let product = make_product(Decimal::new(500, 2), Decimal::ZERO, 1);
        let line = CartLine::new(CartId::new(), product.id, 1, String::new());
        let lines = snapshot_lines(&[(line, product)]).unwrap();
        let payload = CreateOrder {
            store_id: StoreId::new(),
            delivery_address_id: AddressId::new(),
            payment_method: PaymentMethod::Card,
            delivery_instructions: String::new(),
            coupon_code: None,
        };
        let pricing = OrderPricing::compute(&lines, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        let mut order = payload.into_order(UserId::new(), OrderNumber::generate(), pricing);

        let now = Utc::now();
        order.apply_status(OrderStatus::Confirmed, now).unwrap();
        assert_eq!(order.confirmed_at, Some(now));

        match order.apply_status(OrderStatus::Delivered, now) {
            Err(Error::InvalidTransition { from, to }) => {
                assert_eq!(from, OrderStatus::Confirmed);
                assert_eq!(to, OrderStatus::Delivered);
            }
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn identifiers() {
        let number = OrderNumber::generate();
        assert!(OrderNumber::is_well_formed(&number.0));
        assert_eq!(
            number.0.parse::<OrderIdentifier>().unwrap(),
            OrderIdentifier::Number(number.clone())
        );

        let id = OrderId::new();
        assert_eq!(id.0.to_string().parse::<OrderIdentifier>().unwrap(), OrderIdentifier::Id(id));
        assert!("ORD-12".parse::<OrderIdentifier>().is_err());
    }
}
