use std::collections::HashMap;

use tokio_postgres::GenericClient;
use validator::Validate;

use super::memory::SharedStorage;
use super::types::ServiceResult;
use crate::errors::*;
use crate::models::*;
use crate::repos;
use crate::types::*;

/// Service that provides operations for interacting with user carts
#[async_trait]
pub trait CartService: Send + Sync {
    /// Cart of the user in one store, if there is one
    async fn get_cart(&self, user_id: UserId, store_id: StoreId) -> ServiceResult<Option<CartView>>;
    /// Every open cart of the user
    async fn list_carts(&self, user_id: UserId) -> ServiceResult<Vec<CartView>>;
    /// Puts a product into the cart of its store, creating the cart if needed
    async fn add_item(&self, user_id: UserId, item: NewCartItem) -> ServiceResult<CartView>;
    /// Sets the quantity of a line, removing it when quantity is not positive
    async fn update_item(&self, user_id: UserId, line_id: CartLineId, quantity: Quantity) -> ServiceResult<CartView>;
    async fn remove_item(&self, user_id: UserId, line_id: CartLineId) -> ServiceResult<CartView>;
    /// Deletes every cart of the user
    async fn clear(&self, user_id: UserId) -> ServiceResult<()>;
}

/// Default implementation of user cart service
pub struct CartServiceImpl {
    db_pool: DbPool,
}

impl CartServiceImpl {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

async fn load_views<C: GenericClient + Sync>(client: &C, carts: Vec<Cart>) -> ServiceResult<Vec<CartView>> {
    if carts.is_empty() {
        return Ok(vec![]);
    }

    let cart_ids = carts.iter().map(|c| c.id).collect::<Vec<_>>();
    let lines = repos::cart_line::list_for_carts(client, &cart_ids).await?;
    let product_ids = lines.iter().map(|l| l.product_id).collect::<Vec<_>>();
    let products = repos::product::get_many(client, &product_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect::<HashMap<_, _>>();

    let mut views = vec![];
    for cart in carts {
        let store = repos::store::get(client, cart.store_id).await?.ok_or(Error::NotFound("Store"))?;
        let priced = lines
            .iter()
            .filter(|l| l.cart_id == cart.id)
            .map(|l| {
                let product = products.get(&l.product_id).cloned().ok_or(Error::NotFound("Product"))?;
                Ok((l.clone(), product))
            })
            .collect::<ServiceResult<Vec<_>>>()?;
        views.push(CartView::new(cart, &store, priced));
    }

    Ok(views)
}

async fn load_view<C: GenericClient + Sync>(client: &C, cart: Cart) -> ServiceResult<CartView> {
    load_views(client, vec![cart]).await?.pop().ok_or(Error::NotFound("Cart"))
}

async fn owned_cart<C: GenericClient + Sync>(client: &C, cart_id: CartId) -> ServiceResult<Cart> {
    let filter = CartFilter {
        id: Some(cart_id),
        ..Default::default()
    };
    repos::cart::find(client, filter).await?.pop().ok_or(Error::NotFound("Cart"))
}

#[async_trait]
impl CartService for CartServiceImpl {
    async fn get_cart(&self, user_id: UserId, store_id: StoreId) -> ServiceResult<Option<CartView>> {
        debug!("Getting cart for user {} in store {}", user_id, store_id);
        let conn = self.db_pool.get().await?;
        let filter = CartFilter {
            user_id: Some(user_id),
            store_id: Some(store_id),
            ..Default::default()
        };
        let carts = repos::cart::find(&*conn, filter).await?;

        Ok(load_views(&*conn, carts).await?.pop())
    }

    async fn list_carts(&self, user_id: UserId) -> ServiceResult<Vec<CartView>> {
        debug!("Listing carts for user {}", user_id);
        let conn = self.db_pool.get().await?;
        let filter = CartFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        let carts = repos::cart::find(&*conn, filter).await?;

        load_views(&*conn, carts).await
    }

    async fn add_item(&self, user_id: UserId, item: NewCartItem) -> ServiceResult<CartView> {
        debug!("Adding {} of product {} into cart for user {}", item.quantity, item.product_id, user_id);
        item.validate()?;

        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        let product = repos::product::get(&tx, item.product_id).await?.ok_or(Error::NotFound("Product"))?;
        product.ensure_orderable(item.quantity)?;

        let cart = repos::cart::get_or_create(&tx, user_id, product.store_id).await?;
        let existing = repos::cart_line::lock(
            &tx,
            CartLineFilter {
                cart_id: Some(cart.id),
                product_id: Some(product.id),
                ..Default::default()
            },
        )
        .await?;

        match existing {
            Some(mut line) => {
                line.quantity += item.quantity;
                product.ensure_orderable(line.quantity)?;
                line.special_instructions = item.special_instructions;
                repos::cart_line::update(&tx, &line).await?;
            }
            None => {
                let line = CartLine::new(cart.id, product.id, item.quantity, item.special_instructions);
                repos::cart_line::insert(&tx, &line).await?;
            }
        }

        let view = load_view(&tx, cart).await?;
        tx.commit().await?;

        Ok(view)
    }

    async fn update_item(&self, user_id: UserId, line_id: CartLineId, quantity: Quantity) -> ServiceResult<CartView> {
        debug!("Setting quantity of cart line {} to {} for user {}", line_id, quantity, user_id);
        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        let mut line = repos::cart_line::get_owned(&tx, line_id, user_id)
            .await?
            .ok_or(Error::NotFound("Cart item"))?;

        if quantity <= 0 {
            repos::cart_line::remove(
                &tx,
                CartLineFilter {
                    id: Some(line.id),
                    ..Default::default()
                },
            )
            .await?;
        } else {
            let product = repos::product::get(&tx, line.product_id).await?.ok_or(Error::NotFound("Product"))?;
            product.ensure_orderable(quantity)?;
            line.quantity = quantity;
            repos::cart_line::update(&tx, &line).await?;
        }
        repos::cart::touch(&tx, line.cart_id).await?;

        let cart = owned_cart(&tx, line.cart_id).await?;
        let view = load_view(&tx, cart).await?;
        tx.commit().await?;

        Ok(view)
    }

    async fn remove_item(&self, user_id: UserId, line_id: CartLineId) -> ServiceResult<CartView> {
        self.update_item(user_id, line_id, 0).await
    }

    async fn clear(&self, user_id: UserId) -> ServiceResult<()> {
        debug!("Clearing carts of user {}", user_id);
        let conn = self.db_pool.get().await?;
        let removed = repos::cart::remove(
            &*conn,
            CartFilter {
                user_id: Some(user_id),
                ..Default::default()
            },
        )
        .await?;
        debug!("Removed {} carts of user {}", removed.len(), user_id);

        Ok(())
    }
}

/// In-memory implementation of cart service
pub struct CartServiceMemory {
    pub inner: SharedStorage,
}

#[async_trait]
impl CartService for CartServiceMemory {
    async fn get_cart(&self, user_id: UserId, store_id: StoreId) -> ServiceResult<Option<CartView>> {
        let inner = self.inner.lock().unwrap();
        inner.find_cart(user_id, store_id).map(|cart| inner.cart_view(cart)).transpose()
    }

    async fn list_carts(&self, user_id: UserId) -> ServiceResult<Vec<CartView>> {
        let inner = self.inner.lock().unwrap();
        let mut carts = inner.carts.values().filter(|c| c.user_id == user_id).cloned().collect::<Vec<_>>();
        carts.sort_by_key(|c| c.created_at);

        carts.into_iter().map(|cart| inner.cart_view(cart)).collect()
    }

    async fn add_item(&self, user_id: UserId, item: NewCartItem) -> ServiceResult<CartView> {
        item.validate()?;
        let mut inner = self.inner.lock().unwrap();

        let product = inner.products.get(&item.product_id).cloned().ok_or(Error::NotFound("Product"))?;
        product.ensure_orderable(item.quantity)?;

        let cart = match inner.find_cart(user_id, product.store_id) {
            Some(cart) => cart,
            None => Cart::new(user_id, product.store_id),
        };
        let existing = inner
            .cart_lines
            .values()
            .find(|l| l.cart_id == cart.id && l.product_id == product.id)
            .cloned();

        let line = match existing {
            Some(mut line) => {
                line.quantity += item.quantity;
                product.ensure_orderable(line.quantity)?;
                line.special_instructions = item.special_instructions;
                line
            }
            None => CartLine::new(cart.id, product.id, item.quantity, item.special_instructions),
        };

        inner.carts.insert(cart.id, cart.clone());
        inner.cart_lines.insert(line.id, line);

        inner.cart_view(cart)
    }

    async fn update_item(&self, user_id: UserId, line_id: CartLineId, quantity: Quantity) -> ServiceResult<CartView> {
        let mut inner = self.inner.lock().unwrap();

        let mut line = inner.cart_lines.get(&line_id).cloned().ok_or(Error::NotFound("Cart item"))?;
        let cart = inner
            .carts
            .get(&line.cart_id)
            .filter(|c| c.user_id == user_id)
            .cloned()
            .ok_or(Error::NotFound("Cart item"))?;

        if quantity <= 0 {
            inner.cart_lines.remove(&line_id);
        } else {
            let product = inner.products.get(&line.product_id).ok_or(Error::NotFound("Product"))?;
            product.ensure_orderable(quantity)?;
            line.quantity = quantity;
            inner.cart_lines.insert(line.id, line);
        }

        inner.cart_view(cart)
    }

    async fn remove_item(&self, user_id: UserId, line_id: CartLineId) -> ServiceResult<CartView> {
        self.update_item(user_id, line_id, 0).await
    }

    async fn clear(&self, user_id: UserId) -> ServiceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let carts = inner.carts.values().filter(|c| c.user_id == user_id).map(|c| c.id).collect::<Vec<_>>();
        for cart_id in carts {
            inner.remove_cart(cart_id);
        }

        Ok(())
    }
}
