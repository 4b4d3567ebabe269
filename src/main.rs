extern crate env_logger;
#[macro_use]
extern crate log;
extern crate marketplace_lib;
extern crate tokio;

use std::sync::Arc;

use marketplace_lib::config::Config;
use marketplace_lib::gateway::GatewayClient;
use marketplace_lib::{create_pool, migrations, Services};

#[tokio::main]
async fn main() {
    let config = Config::new().expect("Failed to load service configuration. Please check your 'config' folder");
    env_logger::init();

    let db_pool = create_pool(&config.db).await.expect("Failed to create connection pool");
    migrations::run(&db_pool).await.expect("Failed to apply database schema");

    let gateway = Arc::new(GatewayClient::new(&config.gateway));
    let _services = Services::postgres(db_pool, &config, gateway);
    info!("Marketplace core is ready, payment gateway at {}", config.gateway.url);

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
