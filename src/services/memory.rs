use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::Error;
use crate::models::*;
use crate::types::*;

/// Tables of the in-memory services, all behind one lock
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pub stores: HashMap<StoreId, Store>,
    pub products: HashMap<ProductId, Product>,
    pub addresses: HashMap<AddressId, Address>,
    pub carts: HashMap<CartId, Cart>,
    pub cart_lines: HashMap<CartLineId, CartLine>,
    pub orders: HashMap<OrderId, Order>,
    pub order_lines: Vec<OrderLine>,
    pub order_diffs: Vec<OrderDiff>,
    pub coupons: HashMap<CouponId, Coupon>,
    pub coupon_redemptions: Vec<CouponRedemption>,
    pub payments: HashMap<PaymentId, Payment>,
    pub refunds: Vec<Refund>,
    pub notifications: Vec<Notification>,
}

pub type SharedStorage = Arc<Mutex<MemoryStorage>>;

impl MemoryStorage {
    pub fn shared() -> SharedStorage {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn find_cart(&self, user_id: UserId, store_id: StoreId) -> Option<Cart> {
        self.carts
            .values()
            .find(|c| c.user_id == user_id && c.store_id == store_id)
            .cloned()
    }

    pub fn lines_of(&self, cart_id: CartId) -> Vec<CartLine> {
        let mut lines = self
            .cart_lines
            .values()
            .filter(|l| l.cart_id == cart_id)
            .cloned()
            .collect::<Vec<_>>();
        lines.sort_by_key(|l| l.created_at);
        lines
    }

    /// Cart lines paired with the products they reference, `missing` reported for a vanished product.
    pub fn priced_lines(&self, cart_id: CartId, missing: fn() -> Error) -> Result<Vec<(CartLine, Product)>, Error> {
        self.lines_of(cart_id)
            .into_iter()
            .map(|line| {
                let product = self.products.get(&line.product_id).cloned().ok_or_else(missing)?;
                Ok((line, product))
            })
            .collect()
    }

    pub fn cart_view(&self, cart: Cart) -> Result<CartView, Error> {
        let store = self.stores.get(&cart.store_id).ok_or(Error::NotFound("Store"))?;
        let lines = self.priced_lines(cart.id, || Error::NotFound("Product"))?;
        Ok(CartView::new(cart, store, lines))
    }

    pub fn remove_cart(&mut self, cart_id: CartId) {
        self.cart_lines.retain(|_, l| l.cart_id != cart_id);
        self.carts.remove(&cart_id);
    }

    pub fn find_order(&self, id: &OrderIdentifier) -> Option<Order> {
        let filter = OrderFilter::from(id.clone());
        self.orders.values().find(|o| filter.matches(o)).cloned()
    }

    pub fn order_history(&self, order_id: OrderId) -> Vec<OrderDiff> {
        self.order_diffs.iter().filter(|d| d.order_id == order_id).cloned().collect()
    }
}
