use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::*;

#[derive(Debug, Default)]
pub struct GatewayMemoryState {
    pub intents: HashMap<String, IntentState>,
    pub intent_amounts: HashMap<String, i64>,
    pub refunds: Vec<(String, i64)>,
    /// Status reported for created refunds
    pub refund_status: Option<String>,
    /// Error returned by the next call, whatever it is
    pub fail_next: Option<String>,
    counter: u32,
}

/// Scripted gateway keeping everything in memory
#[derive(Clone, Debug, Default)]
pub struct GatewayMemory {
    pub inner: Arc<Mutex<GatewayMemoryState>>,
}

impl GatewayMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the gateway report `status` for the intent, charged with `charge` if given.
    pub fn set_intent(&self, id: &str, status: &str, charge: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        let charges = charge.map(|c| vec![c.to_string()]).unwrap_or_default();
        let raw = json!({
            "id": id,
            "status": status,
            "charges": { "data": charges.iter().map(|c| json!({ "id": c })).collect::<Vec<_>>() },
        });
        inner.intents.insert(
            id.to_string(),
            IntentState {
                id: id.to_string(),
                status: status.to_string(),
                charges,
                raw,
            },
        );
    }

    pub fn fail_next<S: Into<String>>(&self, message: S) {
        self.inner.lock().unwrap().fail_next = Some(message.into());
    }

    fn take_failure(state: &mut GatewayMemoryState) -> Result<(), GatewayError> {
        match state.fail_next.take() {
            Some(message) => Err(GatewayError::Rejected { status: 402, message }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for GatewayMemory {
    async fn create_payment_intent(&self, amount: i64, _currency: &str, _metadata: &[(String, String)]) -> Result<PaymentIntent, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        Self::take_failure(&mut inner)?;

        inner.counter += 1;
        let id = format!("pi_{}", inner.counter);
        let intent = PaymentIntent {
            client_secret: format!("{}_secret", id),
            id: id.clone(),
        };
        inner.intents.insert(
            id.clone(),
            IntentState {
                id: id.clone(),
                status: "requires_payment_method".to_string(),
                charges: vec![],
                raw: Value::Null,
            },
        );
        inner.intent_amounts.insert(id, amount);

        Ok(intent)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<IntentState, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        Self::take_failure(&mut inner)?;

        inner.intents.get(id).cloned().ok_or_else(|| GatewayError::Rejected {
            status: 404,
            message: format!("No such payment_intent: {}", id),
        })
    }

    async fn create_refund(&self, charge_id: &str, amount: i64) -> Result<GatewayRefund, GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        Self::take_failure(&mut inner)?;

        inner.refunds.push((charge_id.to_string(), amount));
        Ok(GatewayRefund {
            id: format!("re_{}", inner.refunds.len()),
            status: inner.refund_status.clone().unwrap_or_else(|| "succeeded".to_string()),
        })
    }
}
