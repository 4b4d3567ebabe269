extern crate chrono;
extern crate futures;
extern crate marketplace_lib as lib;
extern crate rust_decimal;
extern crate tokio;

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;

use common::*;
use lib::acl::Actor;
use lib::errors::{Error, ErrorKind};
use lib::models::*;
use lib::services::*;
use lib::types::*;

#[tokio::test]
async fn order_from_cart_prices_snapshots_and_consumes_cart() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let product = fx.add_product("Margherita", money(1000), 5);
    let address = fx.add_address(user).await;
    fx.fill_cart(user, &product, 2).await;

    let details = fx
        .services
        .orders
        .create_from_cart(user, fx.checkout(&address, None))
        .await
        .unwrap();
    let order = &details.order;

    assert_eq!(order.subtotal, money(2000));
    assert_eq!(order.delivery_fee, money(300));
    assert_eq!(order.tax_amount, money(100));
    assert_eq!(order.discount_amount, money(0));
    assert_eq!(order.total_amount, money(2400));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.order_number.0.starts_with("ORD-"));

    assert_eq!(details.lines.len(), 1);
    assert_eq!(details.lines[0].product_name, "Margherita");
    assert_eq!(details.lines[0].subtotal, money(2000));
    assert_eq!(details.lines.iter().map(|l| l.subtotal).sum::<Decimal>(), order.subtotal);

    let product = fx.product(product.id);
    assert_eq!(product.stock_quantity, 3);
    assert_eq!(product.total_sold, 2);

    assert!(fx.services.carts.get_cart(user, fx.store.id).await.unwrap().is_none());

    assert_eq!(details.history.len(), 1);
    assert_eq!(details.history[0].status, OrderStatus::Pending);
    assert_eq!(details.history[0].committer, Some(user));
}

#[tokio::test]
async fn order_lines_keep_checkout_prices() {
    let fx = Fixture::new(money(0));
    let user = UserId::new();
    let details = fx.place_order(user, 1).await;
    let product_id = details.lines[0].product_id.unwrap();

    fx.storage.lock().unwrap().products.get_mut(&product_id).unwrap().price = money(5000);

    let details = fx
        .services
        .orders
        .get_order(Actor::Customer(user), OrderIdentifier::Id(details.order.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(details.lines[0].product_price, money(1000));
}

#[tokio::test]
async fn empty_cart_and_foreign_address_are_rejected() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let product = fx.add_product("Margherita", money(1000), 5);
    let address = fx.add_address(user).await;

    let result = fx.services.orders.create_from_cart(user, fx.checkout(&address, None)).await;
    assert!(matches!(result, Err(Error::EmptyCart)));

    let stranger_address = fx.add_address(UserId::new()).await;
    fx.fill_cart(user, &product, 1).await;
    let result = fx
        .services
        .orders
        .create_from_cart(user, fx.checkout(&stranger_address, None))
        .await;
    match result {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::Validation);
            assert!(matches!(e, Error::InvalidAddress));
        }
        Ok(_) => panic!("order placed with a foreign address"),
    }

    assert_eq!(fx.product(product.id).stock_quantity, 5);
    assert!(fx.storage.lock().unwrap().orders.is_empty());
}

#[tokio::test]
async fn stock_shortage_at_checkout_leaves_no_trace() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let plenty = fx.add_product("Margherita", money(1000), 5);
    let scarce = fx.add_product("Truffle", money(2500), 2);
    let address = fx.add_address(user).await;
    fx.fill_cart(user, &plenty, 2).await;
    fx.fill_cart(user, &scarce, 2).await;

    fx.storage.lock().unwrap().products.get_mut(&scarce.id).unwrap().stock_quantity = 1;

    let result = fx.services.orders.create_from_cart(user, fx.checkout(&address, None)).await;
    assert!(matches!(result, Err(Error::InsufficientStock { available: 1, .. })));

    assert_eq!(fx.product(plenty.id).stock_quantity, 5);
    assert_eq!(fx.product(scarce.id).stock_quantity, 1);
    assert!(fx.storage.lock().unwrap().orders.is_empty());
    let cart = fx.services.carts.get_cart(user, fx.store.id).await.unwrap().unwrap();
    assert_eq!(cart.lines.len(), 2);
}

#[tokio::test]
async fn product_removed_after_carting_is_unavailable_at_checkout() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let kept = fx.add_product("Margherita", money(1000), 5);
    let removed = fx.add_product("Seasonal", money(1800), 5);
    let address = fx.add_address(user).await;
    fx.fill_cart(user, &kept, 1).await;
    fx.fill_cart(user, &removed, 1).await;

    fx.storage.lock().unwrap().products.remove(&removed.id);

    let result = fx.services.orders.create_from_cart(user, fx.checkout(&address, None)).await;
    assert!(matches!(result, Err(Error::ProductUnavailable)));

    assert_eq!(fx.product(kept.id).stock_quantity, 5);
    let storage = fx.storage.lock().unwrap();
    assert!(storage.orders.is_empty());
    assert_eq!(storage.cart_lines.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_oversell() {
    let fx = Fixture::with_notifier(money(300), Some(Arc::new(LogNotifier)));
    let product = fx.add_product("Last Slice", money(1000), 1);

    let first = UserId::new();
    let second = UserId::new();
    let first_address = fx.add_address(first).await;
    let second_address = fx.add_address(second).await;
    fx.fill_cart(first, &product, 1).await;
    fx.fill_cart(second, &product, 1).await;

    let orders = fx.services.orders.clone();
    let first_checkout = fx.checkout(&first_address, None);
    let second_checkout = fx.checkout(&second_address, None);
    let a = tokio::spawn({
        let orders = orders.clone();
        async move { orders.create_from_cart(first, first_checkout).await }
    });
    let b = tokio::spawn(async move { orders.create_from_cart(second, second_checkout).await });
    let (a, b) = futures::join!(a, b);
    let results = vec![a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(Error::InsufficientStock { available: 0, .. })))
            .count(),
        1
    );
    assert_eq!(fx.product(product.id).stock_quantity, 0);
}

#[tokio::test]
async fn coupon_discount_is_applied_and_redeemed() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let product = fx.add_product("Margherita", money(1000), 10);
    let coupon = fx.add_coupon("SAVE10", DiscountType::Percentage, Decimal::new(10, 0));
    let address = fx.add_address(user).await;
    fx.fill_cart(user, &product, 2).await;

    let details = fx
        .services
        .orders
        .create_from_cart(user, fx.checkout(&address, Some("SAVE10")))
        .await
        .unwrap();

    assert_eq!(details.order.discount_amount, money(200));
    assert_eq!(details.order.tax_amount, money(100));
    assert_eq!(details.order.total_amount, money(2200));
    let redemption = details.coupon_redemption.unwrap();
    assert_eq!(redemption.coupon_id, coupon.id);
    assert_eq!(redemption.discount_amount, money(200));

    let inner = fx.storage.lock().unwrap();
    assert_eq!(inner.coupons[&coupon.id].times_used, 1);
}

#[tokio::test]
async fn coupon_per_user_cap_blocks_second_use() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let product = fx.add_product("Margherita", money(1000), 10);
    fx.add_coupon("ONCE", DiscountType::Fixed, money(500));
    let address = fx.add_address(user).await;

    fx.fill_cart(user, &product, 1).await;
    fx.services
        .orders
        .create_from_cart(user, fx.checkout(&address, Some("ONCE")))
        .await
        .unwrap();

    fx.fill_cart(user, &product, 1).await;
    let result = fx
        .services
        .orders
        .create_from_cart(user, fx.checkout(&address, Some("ONCE")))
        .await;
    assert!(matches!(result, Err(Error::Coupon(CouponError::PerUserLimitReached))));
    assert_eq!(fx.product(product.id).stock_quantity, 9);
}

#[tokio::test]
async fn coupon_checks_follow_validation_order() {
    let fx = Fixture::new(money(300));
    let coupons = &fx.services.coupons;

    let missing = coupons.validate("NOPE", fx.store.id).await;
    assert!(matches!(missing, Err(Error::Coupon(CouponError::NotFound))));

    let coupon = fx.add_coupon("LOCAL", DiscountType::Fixed, money(500));
    assert_eq!(coupons.validate("LOCAL", fx.store.id).await.unwrap().id, coupon.id);

    let elsewhere = coupons.validate("LOCAL", StoreId::new()).await;
    assert!(matches!(elsewhere, Err(Error::Coupon(CouponError::StoreMismatch))));

    fx.storage.lock().unwrap().coupons.get_mut(&coupon.id).unwrap().is_active = false;
    let inactive = coupons.validate("LOCAL", fx.store.id).await;
    assert!(matches!(inactive, Err(Error::Coupon(CouponError::Inactive))));

    let quote_coupon = fx.add_coupon("BIG", DiscountType::Fixed, money(5000));
    let quote = coupons.quote("BIG", fx.store.id, money(2000)).await.unwrap();
    assert_eq!(quote.coupon.id, quote_coupon.id);
    assert_eq!(quote.discount_amount, money(2000));
}

#[tokio::test]
async fn duplicate_coupon_code_is_a_conflict() {
    let fx = Fixture::new(money(300));
    let coupon = fx.add_coupon("WELCOME", DiscountType::Fixed, money(500));
    let mut payload = NewCoupon {
        code: coupon.code.clone(),
        description: String::new(),
        discount_type: DiscountType::Fixed,
        discount_value: money(500),
        min_order_amount: Decimal::ZERO,
        max_discount_amount: None,
        valid_from: coupon.valid_from,
        valid_until: coupon.valid_until,
        usage_limit: Some(100),
        usage_per_user: 1,
        store_id: None,
        is_active: true,
    };

    let result = fx.services.coupons.create_coupon(payload.clone()).await;
    assert!(matches!(result, Err(Error::DuplicateCoupon(_))));

    payload.code = "WELCOME2".to_string();
    let created = fx.services.coupons.create_coupon(payload).await.unwrap();
    assert_eq!(created.times_used, 0);
}

#[tokio::test]
async fn status_moves_forward_one_step_and_records_history() {
    let fx = Fixture::new(money(300));
    let customer = UserId::new();
    let details = fx.place_order(customer, 1).await;
    let manager = Actor::StoreManager {
        user_id: fx.owner,
        store_id: fx.store.id,
    };
    let id = OrderIdentifier::Number(details.order.order_number.clone());

    let skipped = fx
        .services
        .orders
        .set_order_status(manager, id.clone(), OrderStatus::Ready, String::new())
        .await;
    assert!(matches!(
        skipped,
        Err(Error::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Ready,
        })
    ));

    for status in &[OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready] {
        fx.services
            .orders
            .set_order_status(manager, id.clone(), *status, "kitchen".to_string())
            .await
            .unwrap();
    }

    let order = fx
        .services
        .orders
        .set_order_status(manager, id.clone(), OrderStatus::OutForDelivery, String::new())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::OutForDelivery);
    assert!(order.confirmed_at.is_some());
    assert!(order.delivered_at.is_none());

    let history = fx.services.orders.get_order_diff(Actor::Customer(customer), id).await.unwrap();
    let statuses = history.iter().map(|d| d.status).collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::OutForDelivery,
        ]
    );
    assert_eq!(history[1].committer, Some(fx.owner));

    let kinds = fx.notifications(customer).iter().map(|n| n.kind).collect::<Vec<_>>();
    assert!(kinds.contains(&NotificationKind::OrderPlaced));
    assert!(kinds.contains(&NotificationKind::OrderOutForDelivery));
}

#[tokio::test]
async fn terminal_orders_cannot_move() {
    let fx = Fixture::new(money(300));
    let customer = UserId::new();
    let details = fx.place_order(customer, 1).await;
    let id = OrderIdentifier::Id(details.order.id);

    let cancelled = fx
        .services
        .orders
        .set_order_status(Actor::Customer(customer), id.clone(), OrderStatus::Cancelled, "changed my mind".to_string())
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let result = fx
        .services
        .orders
        .set_order_status(Actor::System, id, OrderStatus::Confirmed, String::new())
        .await;
    assert!(matches!(result, Err(Error::InvalidTransition { .. })));
}

#[tokio::test]
async fn actors_only_touch_their_orders() {
    let fx = Fixture::new(money(300));
    let customer = UserId::new();
    let details = fx.place_order(customer, 1).await;
    let id = OrderIdentifier::Id(details.order.id);

    let stranger = Actor::Customer(UserId::new());
    let seen = fx.services.orders.get_order(stranger, id.clone()).await;
    assert!(matches!(seen, Err(Error::Forbidden)));

    let customer_confirms = fx
        .services
        .orders
        .set_order_status(Actor::Customer(customer), id.clone(), OrderStatus::Confirmed, String::new())
        .await;
    assert!(matches!(customer_confirms, Err(Error::Forbidden)));

    let other_manager = Actor::StoreManager {
        user_id: UserId::new(),
        store_id: StoreId::new(),
    };
    let result = fx
        .services
        .orders
        .set_order_status(other_manager, id.clone(), OrderStatus::Confirmed, String::new())
        .await;
    assert!(matches!(result, Err(Error::Forbidden)));

    let admin = fx.services.orders.get_order(Actor::Admin(UserId::new()), id).await.unwrap();
    assert!(admin.is_some());
}

#[tokio::test]
async fn orders_are_listed_per_customer_and_store() {
    let fx = Fixture::new(money(300));
    let alice = UserId::new();
    let bob = UserId::new();
    fx.place_order(alice, 1).await;
    fx.place_order(alice, 2).await;
    fx.place_order(bob, 1).await;

    assert_eq!(fx.services.orders.get_orders_for_user(alice).await.unwrap().len(), 2);
    assert_eq!(fx.services.orders.get_orders_for_user(bob).await.unwrap().len(), 1);
    assert_eq!(fx.services.orders.get_orders_for_store(fx.store.id).await.unwrap().len(), 3);
    assert!(fx
        .services
        .orders
        .get_orders_for_store(StoreId::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn store_owner_hears_about_orders_and_low_stock() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let product = fx.add_product("Last Two", money(1000), 2);
    let address = fx.add_address(user).await;
    fx.fill_cart(user, &product, 2).await;
    fx.services
        .orders
        .create_from_cart(user, fx.checkout(&address, None))
        .await
        .unwrap();

    let kinds = fx.notifications(fx.owner).iter().map(|n| n.kind).collect::<Vec<_>>();
    assert!(kinds.contains(&NotificationKind::OrderPlaced));
    assert!(kinds.contains(&NotificationKind::LowStock));
}

#[tokio::test]
async fn default_address_is_unique() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let first = fx.add_address(user).await;
    let second = fx.add_address(user).await;
    assert!(first.is_default);
    assert!(!second.is_default);

    fx.services.addresses.set_default(user, second.id).await.unwrap();
    let addresses = fx.services.addresses.list_addresses(user).await.unwrap();
    assert_eq!(addresses[0].id, second.id);
    assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);

    let foreign = fx.services.addresses.set_default(UserId::new(), first.id).await;
    assert!(foreign.is_err());
}
