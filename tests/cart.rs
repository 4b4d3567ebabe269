extern crate chrono;
#[macro_use]
extern crate maplit;
extern crate marketplace_lib as lib;
extern crate rust_decimal;
extern crate tokio;

mod common;

use std::collections::HashMap;

use common::*;
use lib::errors::Error;
use lib::models::*;
use lib::types::*;

#[tokio::test]
async fn add_item_creates_cart_and_merges_lines() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let margherita = fx.add_product("Margherita", money(1000), 10);
    let diavola = fx.add_product("Diavola", money(1250), 10);

    fx.fill_cart(user, &margherita, 1).await;
    fx.fill_cart(user, &diavola, 2).await;
    let cart = fx
        .services
        .carts
        .add_item(
            user,
            NewCartItem {
                product_id: margherita.id,
                quantity: 2,
                special_instructions: "extra basil".to_string(),
            },
        )
        .await
        .unwrap();

    let quantities = cart
        .lines
        .iter()
        .map(|l| (l.line.product_id, l.line.quantity))
        .collect::<HashMap<_, _>>();
    assert_eq!(quantities, hashmap! { margherita.id => 3, diavola.id => 2 });
    assert_eq!(cart.total_items, 5);
    assert_eq!(cart.subtotal, money(5500));
    assert_eq!(cart.total, money(5800));

    let line = cart.lines.iter().find(|l| l.line.product_id == margherita.id).unwrap();
    assert_eq!(line.line.special_instructions, "extra basil");
}

#[tokio::test]
async fn add_item_checks_combined_quantity_against_stock() {
    let fx = Fixture::new(money(0));
    let user = UserId::new();
    let product = fx.add_product("Calzone", money(900), 3);

    fx.fill_cart(user, &product, 2).await;
    let result = fx
        .services
        .carts
        .add_item(
            user,
            NewCartItem {
                product_id: product.id,
                quantity: 2,
                special_instructions: String::new(),
            },
        )
        .await;

    match result {
        Err(Error::InsufficientStock { available, .. }) => assert_eq!(available, 3),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn unavailable_product_cannot_be_added() {
    let fx = Fixture::new(money(0));
    let user = UserId::new();
    let product = fx.add_product("Seasonal", money(900), 0);

    let result = fx
        .services
        .carts
        .add_item(
            user,
            NewCartItem {
                product_id: product.id,
                quantity: 1,
                special_instructions: String::new(),
            },
        )
        .await;
    assert!(matches!(result, Err(Error::ProductUnavailable)));
    assert!(fx.services.carts.get_cart(user, fx.store.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_to_zero_removes_line() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let product = fx.add_product("Margherita", money(1000), 10);

    let cart = fx.fill_cart(user, &product, 2).await;
    let line_id = cart.lines[0].line.id;

    let cart = fx.services.carts.update_item(user, line_id, 4).await.unwrap();
    assert_eq!(cart.total_items, 4);
    assert!(fx.services.carts.update_item(user, line_id, 11).await.is_err());

    let cart = fx.services.carts.update_item(user, line_id, 0).await.unwrap();
    assert!(cart.lines.is_empty());
    assert_eq!(cart.subtotal, money(0));
}

#[tokio::test]
async fn foreign_line_is_not_found() {
    let fx = Fixture::new(money(300));
    let owner = UserId::new();
    let product = fx.add_product("Margherita", money(1000), 10);
    let cart = fx.fill_cart(owner, &product, 1).await;

    let result = fx.services.carts.remove_item(UserId::new(), cart.lines[0].line.id).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn clear_removes_every_cart_of_user() {
    let fx = Fixture::new(money(300));
    let user = UserId::new();
    let product = fx.add_product("Margherita", money(1000), 10);
    fx.fill_cart(user, &product, 1).await;
    assert_eq!(fx.services.carts.list_carts(user).await.unwrap().len(), 1);

    fx.services.carts.clear(user).await.unwrap();
    assert!(fx.services.carts.list_carts(user).await.unwrap().is_empty());
    assert!(fx.storage.lock().unwrap().cart_lines.is_empty());
}
