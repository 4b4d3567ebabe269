#[macro_use]
pub mod common;
pub use self::common::*;

pub mod address;
pub use self::address::{Address, AddressType, NewAddress};

pub mod cart;
pub use self::cart::{Cart, CartFilter, CartLine, CartLineFilter, CartLineView, CartView, NewCartItem};

pub mod coupon;
pub use self::coupon::{Coupon, CouponError, CouponQuote, CouponRedemption, DiscountType, NewCoupon};

pub mod notification;
pub use self::notification::{Notification, NotificationKind};

pub mod order;
pub use self::order::{
    snapshot_lines, CreateOrder, NewOrderLine, Order, OrderDetails, OrderFilter, OrderIdentifier, OrderLine, OrderNumber, OrderPricing,
    OrderStatus, PaymentMethod,
};

pub mod order_diff;
pub use self::order_diff::{OrderDiff, OrderDiffFilter};

pub mod payment;
pub use self::payment::{
    intent_metadata, NewRefund, Payment, PaymentIntentCreated, PaymentStatus, Refund, RefundReason, RefundStatus, TransactionId,
    INTENT_SUCCEEDED,
};

pub mod product;
pub use self::product::Product;

pub mod store;
pub use self::store::Store;
