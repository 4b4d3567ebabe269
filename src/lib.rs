#[macro_use]
extern crate async_trait;
extern crate bb8;
extern crate bb8_postgres;
extern crate chrono;
extern crate config_crate;
#[macro_use]
extern crate derive_more;
#[macro_use]
extern crate failure;
extern crate futures;
extern crate hyper;
extern crate hyper_tls;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate rand;
extern crate regex;
extern crate rust_decimal;
extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;
extern crate tokio;
extern crate tokio_postgres;
extern crate uuid;
extern crate validator;

#[macro_use]
pub mod models;
pub mod acl;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod migrations;
pub mod repos;
pub mod response;
pub mod services;
pub mod types;
pub mod util;

use std::sync::Arc;

use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::NoTls;

use gateway::PaymentGateway;
use services::*;
use types::DbPool;

/// Opens the Postgres connection pool.
pub async fn create_pool(config: &config::Database) -> Result<DbPool, tokio_postgres::Error> {
    let manager = PostgresConnectionManager::new_from_stringlike(config.dsn.as_str(), NoTls)?;
    bb8::Pool::builder().max_size(config.pool_size).build(manager).await
}

/// Every service of the application, behind its trait
#[derive(Clone)]
pub struct Services {
    pub addresses: Arc<dyn AddressService>,
    pub carts: Arc<dyn CartService>,
    pub coupons: Arc<dyn CouponService>,
    pub orders: Arc<dyn OrderService>,
    pub payments: Arc<dyn PaymentService>,
}

impl Services {
    /// Services backed by Postgres. Notifications are stored as in-app notifications.
    pub fn postgres(db_pool: DbPool, config: &config::Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        let notifier: Arc<dyn Notifier> = Arc::new(NotifierImpl::new(db_pool.clone()));

        Self {
            addresses: Arc::new(AddressServiceImpl::new(db_pool.clone())),
            carts: Arc::new(CartServiceImpl::new(db_pool.clone())),
            coupons: Arc::new(CouponServiceImpl::new(db_pool.clone())),
            orders: Arc::new(OrderServiceImpl::new(db_pool.clone(), config, notifier.clone())),
            payments: Arc::new(PaymentServiceImpl::new(db_pool, config, gateway, notifier)),
        }
    }

    /// Services sharing one in-memory store.
    pub fn memory(storage: SharedStorage, config: &config::Config, gateway: Arc<dyn PaymentGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            addresses: Arc::new(AddressServiceMemory { inner: storage.clone() }),
            carts: Arc::new(CartServiceMemory { inner: storage.clone() }),
            coupons: Arc::new(CouponServiceMemory { inner: storage.clone() }),
            orders: Arc::new(OrderServiceMemory {
                inner: storage.clone(),
                pricing: config.pricing.clone(),
                notifier: notifier.clone(),
            }),
            payments: Arc::new(PaymentServiceMemory {
                inner: storage,
                gateway,
                currency: config.gateway.currency.clone(),
                notifier,
            }),
        }
    }
}
