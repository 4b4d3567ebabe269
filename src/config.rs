use std::env;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};
use rust_decimal::Decimal;

enum Env {
    Development,
    Test,
    Production,
}

impl Env {
    fn new() -> Self {
        match env::var("RUN_MODE") {
            Ok(ref s) if s == "test" => Env::Test,
            Ok(ref s) if s == "production" => Env::Production,
            _ => Env::Development,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Env::Development => "development",
            Env::Production => "production",
            Env::Test => "test",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Database {
    pub dsn: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Payment gateway endpoint and credentials
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gateway {
    pub url: String,
    pub secret_key: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pricing {
    /// Tax charged on the order subtotal, as a fraction
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Orders {
    /// How many random order numbers / transaction ids to try before giving up
    #[serde(default = "default_number_attempts")]
    pub number_attempts: u32,
}

impl Default for Orders {
    fn default() -> Self {
        Self {
            number_attempts: default_number_attempts(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Database settings
    pub db: Database,
    /// Payment gateway settings
    pub gateway: Gateway,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub orders: Orders,
}

fn default_pool_size() -> u32 {
    10
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_tax_rate() -> Decimal {
    Decimal::new(5, 2)
}

fn default_number_attempts() -> u32 {
    10
}

impl Config {
    /// Creates config from base.toml, which are overwritten by <env>.toml, where
    /// env is one of development, test, production. After that it could be overwritten
    /// by env variables like MARKETPLACE__DB__DSN (this will override `db.dsn` field in config)
    pub fn new() -> Result<Self, ConfigError> {
        let env = Env::new();

        RawConfig::builder()
            .add_source(File::with_name("config/base"))
            // Optional file specific for environment
            .add_source(File::with_name(&format!("config/{}", env.as_str())).required(false))
            .add_source(Environment::with_prefix("MARKETPLACE").separator("__"))
            .build()?
            .try_deserialize()
    }
}
