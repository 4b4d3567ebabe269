//! Payment gateway collaborator.
//!
//! Amounts cross this boundary in minor units (cents).

use serde_json::Value;

pub mod http;
pub mod memory;

pub use self::http::GatewayClient;
pub use self::memory::GatewayMemory;

#[derive(Debug, Fail)]
pub enum GatewayError {
    #[fail(display = "Gateway request timed out")]
    Timeout,
    #[fail(display = "Gateway transport error: {}", _0)]
    Transport(String),
    #[fail(display = "{}", message)]
    Rejected { status: u16, message: String },
    #[fail(display = "Malformed gateway response: {}", _0)]
    Decode(String),
}

impl From<hyper::Error> for GatewayError {
    fn from(e: hyper::Error) -> Self {
        GatewayError::Transport(format!("{}", e))
    }
}

impl From<hyper::http::Error> for GatewayError {
    fn from(e: hyper::http::Error) -> Self {
        GatewayError::Transport(format!("{}", e))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Decode(format!("{}", e))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Intent state as last reported by the gateway
#[derive(Clone, Debug, PartialEq)]
pub struct IntentState {
    pub id: String,
    pub status: String,
    /// Charge references, oldest first
    pub charges: Vec<String>,
    pub raw: Value,
}

impl IntentState {
    /// Reads an intent object, accepting both the expanded `charges` list and `latest_charge`.
    pub fn from_value(raw: Value) -> Result<Self, GatewayError> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Decode("intent without id".to_string()))?
            .to_string();
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Decode("intent without status".to_string()))?
            .to_string();

        let mut charges = raw
            .pointer("/charges/data")
            .and_then(Value::as_array)
            .map(|data| {
                data.iter()
                    .filter_map(|c| c.get("id").and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if charges.is_empty() {
            if let Some(latest) = raw.get("latest_charge").and_then(Value::as_str) {
                charges.push(latest.to_string());
            }
        }

        Ok(Self { id, status, charges, raw })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(&self, amount: i64, currency: &str, metadata: &[(String, String)]) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_intent(&self, id: &str) -> Result<IntentState, GatewayError>;

    async fn create_refund(&self, charge_id: &str, amount: i64) -> Result<GatewayRefund, GatewayError>;
}
