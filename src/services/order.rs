use std::collections::HashMap;
use std::sync::Arc;

use chrono::prelude::*;
use futures::future;
use rust_decimal::Decimal;
use validator::Validate;

use super::memory::SharedStorage;
use super::notification::{dispatch, order_payload, Notifier};
use super::types::ServiceResult;
use crate::acl::Actor;
use crate::config;
use crate::errors::*;
use crate::models::*;
use crate::repos;
use crate::types::*;

#[async_trait]
pub trait OrderService: Send + Sync {
    /// Turns the user's cart in a store into an order, all or nothing
    async fn create_from_cart(&self, user_id: UserId, payload: CreateOrder) -> ServiceResult<OrderDetails>;
    /// Order with its lines and history, if the actor may see it
    async fn get_order(&self, actor: Actor, id: OrderIdentifier) -> ServiceResult<Option<OrderDetails>>;
    /// Status history, oldest first
    async fn get_order_diff(&self, actor: Actor, id: OrderIdentifier) -> ServiceResult<Vec<OrderDiff>>;
    async fn get_orders_for_user(&self, user_id: UserId) -> ServiceResult<Vec<Order>>;
    async fn get_orders_for_store(&self, store_id: StoreId) -> ServiceResult<Vec<Order>>;
    /// Moves the order to `status`, recording the transition
    async fn set_order_status(&self, actor: Actor, id: OrderIdentifier, status: OrderStatus, notes: String) -> ServiceResult<Order>;
}

/// Everything decided about an order before anything is written
struct Checkout {
    lines: Vec<NewOrderLine>,
    pricing: OrderPricing,
    coupon: Option<Coupon>,
}

/// Prices the cart and checks the coupon. `redemptions` is how many times the user already used it.
fn plan_checkout(
    priced: &[(CartLine, Product)],
    store: &Store,
    coupon: Option<(Coupon, i64)>,
    tax_rate: Decimal,
    now: DateTime<Utc>,
) -> ServiceResult<Checkout> {
    if priced.iter().any(|(_, product)| product.store_id != store.id) {
        return Err(Error::ProductUnavailable);
    }

    let lines = snapshot_lines(priced)?;
    let subtotal = lines.iter().map(|l| l.subtotal).sum::<Decimal>();

    let (discount, coupon) = match coupon {
        Some((coupon, redemptions)) => {
            coupon.check(now, store.id)?;
            coupon.check_order(subtotal, redemptions)?;
            (coupon.discount_for(subtotal), Some(coupon))
        }
        None => (Decimal::ZERO, None),
    };
    let pricing = OrderPricing::compute(&lines, store.delivery_fee, tax_rate, discount);

    Ok(Checkout { lines, pricing, coupon })
}

async fn notify_placed(notifier: &dyn Notifier, order: &Order, store: &Store, low_stock: &[Product]) {
    let payload = order_payload(order);
    dispatch(notifier, order.customer_id, NotificationKind::OrderPlaced, payload.clone()).await;
    dispatch(notifier, store.owner_id, NotificationKind::OrderPlaced, payload).await;

    future::join_all(low_stock.iter().map(|product| {
        let payload = json!({
            "product_id": product.id,
            "product_name": product.name,
            "stock_quantity": product.stock_quantity,
            "message": format!("{} has only {} items left", product.name, product.stock_quantity),
        });
        dispatch(notifier, store.owner_id, NotificationKind::LowStock, payload)
    }))
    .await;
}

pub struct OrderServiceImpl {
    db_pool: DbPool,
    pricing: config::Pricing,
    orders: config::Orders,
    notifier: Arc<dyn Notifier>,
}

impl OrderServiceImpl {
    pub fn new(db_pool: DbPool, config: &config::Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db_pool,
            pricing: config.pricing.clone(),
            orders: config.orders.clone(),
            notifier,
        }
    }

    async fn find_visible(&self, actor: Actor, id: OrderIdentifier) -> ServiceResult<Option<Order>> {
        let conn = self.db_pool.get().await?;
        match repos::order::find_one(&*conn, id.into()).await? {
            Some(order) if !actor.can_view(&order) => Err(Error::Forbidden),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl OrderService for OrderServiceImpl {
    async fn create_from_cart(&self, user_id: UserId, payload: CreateOrder) -> ServiceResult<OrderDetails> {
        debug!("Creating order for user {} in store {}", user_id, payload.store_id);
        payload.validate()?;
        let now = Utc::now();

        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        let cart = repos::cart::lock(&tx, user_id, payload.store_id).await?.ok_or(Error::EmptyCart)?;
        let lines = repos::cart_line::list_for_carts(&tx, &[cart.id]).await?;
        if lines.is_empty() {
            return Err(Error::EmptyCart);
        }

        repos::address::get(&tx, payload.delivery_address_id)
            .await?
            .filter(|a| a.belongs_to(user_id))
            .ok_or(Error::InvalidAddress)?;

        let store = repos::store::get(&tx, payload.store_id).await?.ok_or(Error::NotFound("Store"))?;

        let mut product_ids = lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
        product_ids.sort();
        let products = repos::product::lock_many(&tx, &product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect::<HashMap<_, _>>();
        let priced = lines
            .into_iter()
            .map(|line| {
                let product = products.get(&line.product_id).cloned().ok_or(Error::ProductUnavailable)?;
                Ok((line, product))
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        let coupon = match payload.coupon_code.as_ref() {
            Some(code) => {
                let coupon = repos::coupon::lock_by_code(&tx, code).await?.ok_or(CouponError::NotFound)?;
                let redemptions = repos::coupon::count_redemptions(&tx, coupon.id, user_id).await?;
                Some((coupon, redemptions))
            }
            None => None,
        };

        let checkout = plan_checkout(&priced, &store, coupon, self.pricing.tax_rate, now)?;

        let mut created = None;
        for _ in 0..self.orders.number_attempts {
            let order = payload.clone().into_order(user_id, OrderNumber::generate(), checkout.pricing);
            if let Some(order) = repos::order::insert(&tx, &order).await? {
                created = Some(order);
                break;
            }
            debug!("Order number collision, retrying");
        }
        let order = created.ok_or(Error::IdentifierExhausted("order number"))?;

        let mut order_lines = vec![];
        let mut low_stock = vec![];
        for line in checkout.lines {
            let (product_id, quantity) = (line.product_id, line.quantity);
            order_lines.push(repos::order_line::insert(&tx, &line.into_line(order.id)).await?);

            let product = match repos::product::decrement_stock(&tx, product_id, quantity).await? {
                Some(product) => product,
                None => {
                    let available = products.get(&product_id).map_or(0, |p| p.stock_quantity);
                    return Err(Error::InsufficientStock {
                        product: product_id,
                        available,
                    });
                }
            };
            if product.is_low_stock() {
                low_stock.push(product);
            }
        }

        let coupon_redemption = match checkout.coupon {
            Some(coupon) => {
                repos::coupon::increment_usage(&tx, coupon.id)
                    .await?
                    .ok_or(CouponError::UsageExceeded)?;
                let redemption = CouponRedemption::new(coupon.id, order.id, user_id, order.discount_amount);
                Some(repos::coupon::insert_redemption(&tx, &redemption).await?)
            }
            None => None,
        };

        let diff = OrderDiff::new(order.id, OrderStatus::Pending, Some(user_id), "Order placed");
        let history = vec![repos::order_diff::insert(&tx, &diff).await?];

        repos::cart::remove(
            &tx,
            CartFilter {
                id: Some(cart.id),
                ..Default::default()
            },
        )
        .await?;

        tx.commit().await?;
        info!("Created order {} for user {}", order.order_number, user_id);

        notify_placed(&*self.notifier, &order, &store, &low_stock).await;

        Ok(OrderDetails {
            order,
            lines: order_lines,
            history,
            coupon_redemption,
        })
    }

    async fn get_order(&self, actor: Actor, id: OrderIdentifier) -> ServiceResult<Option<OrderDetails>> {
        let order = match self.find_visible(actor, id).await? {
            Some(order) => order,
            None => return Ok(None),
        };

        let conn = self.db_pool.get().await?;
        let lines = repos::order_line::list_for_order(&*conn, order.id).await?;
        let history = repos::order_diff::find(&*conn, order.id.into()).await?;
        let coupon_redemption = repos::coupon::redemption_for_order(&*conn, order.id).await?;

        Ok(Some(OrderDetails {
            order,
            lines,
            history,
            coupon_redemption,
        }))
    }

    async fn get_order_diff(&self, actor: Actor, id: OrderIdentifier) -> ServiceResult<Vec<OrderDiff>> {
        let order = self.find_visible(actor, id).await?.ok_or(Error::NotFound("Order"))?;
        let conn = self.db_pool.get().await?;

        Ok(repos::order_diff::find(&*conn, order.id.into()).await?)
    }

    async fn get_orders_for_user(&self, user_id: UserId) -> ServiceResult<Vec<Order>> {
        let conn = self.db_pool.get().await?;
        let filter = OrderFilter {
            customer_id: Some(user_id),
            ..Default::default()
        };

        Ok(repos::order::find(&*conn, filter).await?)
    }

    async fn get_orders_for_store(&self, store_id: StoreId) -> ServiceResult<Vec<Order>> {
        let conn = self.db_pool.get().await?;
        let filter = OrderFilter {
            store_id: Some(store_id),
            ..Default::default()
        };

        Ok(repos::order::find(&*conn, filter).await?)
    }

    async fn set_order_status(&self, actor: Actor, id: OrderIdentifier, status: OrderStatus, notes: String) -> ServiceResult<Order> {
        debug!("Setting order {:?} to {} by {:?}", id, status, actor);
        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        let mut order = repos::order::lock(&tx, id.into()).await?.ok_or(Error::NotFound("Order"))?;
        actor.ensure_can_set_status(&order, status)?;
        order.apply_status(status, Utc::now())?;

        let order = repos::order::update_state(&tx, &order).await?;
        repos::order_diff::insert(&tx, &OrderDiff::new(order.id, status, actor.user_id(), notes)).await?;
        tx.commit().await?;

        dispatch(&*self.notifier, order.customer_id, NotificationKind::for_status(status), order_payload(&order)).await;

        Ok(order)
    }
}

/// In-memory implementation of order service
pub struct OrderServiceMemory {
    pub inner: SharedStorage,
    pub pricing: config::Pricing,
    pub notifier: Arc<dyn Notifier>,
}

impl OrderServiceMemory {
    fn find_visible(&self, actor: Actor, id: &OrderIdentifier) -> ServiceResult<Option<Order>> {
        let inner = self.inner.lock().unwrap();
        match inner.find_order(id) {
            Some(order) if !actor.can_view(&order) => Err(Error::Forbidden),
            other => Ok(other),
        }
    }

    fn list(&self, filter: OrderFilter) -> Vec<Order> {
        let inner = self.inner.lock().unwrap();
        let mut orders = inner.orders.values().filter(|o| filter.matches(o)).cloned().collect::<Vec<_>>();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[async_trait]
impl OrderService for OrderServiceMemory {
    async fn create_from_cart(&self, user_id: UserId, payload: CreateOrder) -> ServiceResult<OrderDetails> {
        payload.validate()?;
        let now = Utc::now();

        let (details, store, low_stock) = {
            let mut inner = self.inner.lock().unwrap();

            let cart = inner.find_cart(user_id, payload.store_id).ok_or(Error::EmptyCart)?;
            let priced = inner.priced_lines(cart.id, || Error::ProductUnavailable)?;
            if priced.is_empty() {
                return Err(Error::EmptyCart);
            }

            if !inner
                .addresses
                .get(&payload.delivery_address_id)
                .map_or(false, |a| a.belongs_to(user_id))
            {
                return Err(Error::InvalidAddress);
            }

            let store = inner.stores.get(&payload.store_id).cloned().ok_or(Error::NotFound("Store"))?;

            let coupon = match payload.coupon_code.as_ref() {
                Some(code) => {
                    let coupon = inner
                        .coupons
                        .values()
                        .find(|c| c.code == *code)
                        .cloned()
                        .ok_or(CouponError::NotFound)?;
                    let redemptions = inner
                        .coupon_redemptions
                        .iter()
                        .filter(|r| r.coupon_id == coupon.id && r.user_id == user_id)
                        .count() as i64;
                    Some((coupon, redemptions))
                }
                None => None,
            };

            let checkout = plan_checkout(&priced, &store, coupon, self.pricing.tax_rate, now)?;

            let order_number = loop {
                let candidate = OrderNumber::generate();
                if !inner.orders.values().any(|o| o.order_number == candidate) {
                    break candidate;
                }
            };
            let order = payload.clone().into_order(user_id, order_number, checkout.pricing);

            let mut low_stock = vec![];
            let lines = checkout
                .lines
                .into_iter()
                .map(|line| {
                    if let Some(product) = inner.products.get_mut(&line.product_id) {
                        product.stock_quantity -= line.quantity;
                        product.total_sold += line.quantity;
                        product.updated_at = now;
                        if product.is_low_stock() {
                            low_stock.push(product.clone());
                        }
                    }
                    line.into_line(order.id)
                })
                .collect::<Vec<_>>();

            let coupon_redemption = checkout.coupon.map(|coupon| {
                if let Some(c) = inner.coupons.get_mut(&coupon.id) {
                    c.times_used += 1;
                }
                CouponRedemption::new(coupon.id, order.id, user_id, order.discount_amount)
            });

            let diff = OrderDiff::new(order.id, OrderStatus::Pending, Some(user_id), "Order placed");

            inner.orders.insert(order.id, order.clone());
            inner.order_lines.extend(lines.iter().cloned());
            inner.order_diffs.push(diff.clone());
            inner.coupon_redemptions.extend(coupon_redemption.iter().cloned());
            inner.remove_cart(cart.id);

            let details = OrderDetails {
                order,
                lines,
                history: vec![diff],
                coupon_redemption,
            };
            (details, store, low_stock)
        };

        notify_placed(&*self.notifier, &details.order, &store, &low_stock).await;

        Ok(details)
    }

    async fn get_order(&self, actor: Actor, id: OrderIdentifier) -> ServiceResult<Option<OrderDetails>> {
        let order = match self.find_visible(actor, &id)? {
            Some(order) => order,
            None => return Ok(None),
        };

        let inner = self.inner.lock().unwrap();
        let lines = inner.order_lines.iter().filter(|l| l.order_id == order.id).cloned().collect();
        let history = inner.order_history(order.id);
        let coupon_redemption = inner.coupon_redemptions.iter().find(|r| r.order_id == order.id).cloned();

        Ok(Some(OrderDetails {
            order,
            lines,
            history,
            coupon_redemption,
        }))
    }

    async fn get_order_diff(&self, actor: Actor, id: OrderIdentifier) -> ServiceResult<Vec<OrderDiff>> {
        let order = self.find_visible(actor, &id)?.ok_or(Error::NotFound("Order"))?;
        let inner = self.inner.lock().unwrap();

        Ok(inner.order_history(order.id))
    }

    async fn get_orders_for_user(&self, user_id: UserId) -> ServiceResult<Vec<Order>> {
        Ok(self.list(OrderFilter {
            customer_id: Some(user_id),
            ..Default::default()
        }))
    }

    async fn get_orders_for_store(&self, store_id: StoreId) -> ServiceResult<Vec<Order>> {
        Ok(self.list(OrderFilter {
            store_id: Some(store_id),
            ..Default::default()
        }))
    }

    async fn set_order_status(&self, actor: Actor, id: OrderIdentifier, status: OrderStatus, notes: String) -> ServiceResult<Order> {
        let order = {
            let mut inner = self.inner.lock().unwrap();
            let mut order = inner.find_order(&id).ok_or(Error::NotFound("Order"))?;
            actor.ensure_can_set_status(&order, status)?;
            order.apply_status(status, Utc::now())?;

            inner.orders.insert(order.id, order.clone());
            inner.order_diffs.push(OrderDiff::new(order.id, status, actor.user_id(), notes));
            order
        };

        dispatch(&*self.notifier, order.customer_id, NotificationKind::for_status(status), order_payload(&order)).await;

        Ok(order)
    }
}
