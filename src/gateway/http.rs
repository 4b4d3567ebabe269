use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Client, Method, Request};
use hyper_tls::HttpsConnector;
use serde_json::{Map, Value};

use super::*;
use crate::config;

/// JSON-over-HTTPS gateway client authenticated with a bearer secret key
#[derive(Clone)]
pub struct GatewayClient {
    client: Client<HttpsConnector<HttpConnector>>,
    url: String,
    secret_key: String,
    timeout: Duration,
}

impl GatewayClient {
    pub fn new(config: &config::Gateway) -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());
        Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn request_url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path)
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, GatewayError> {
        let url = self.request_url(path);
        debug!("Gateway request {} {}", method, url);

        let body = match body {
            Some(v) => Body::from(serde_json::to_vec(&v)?),
            None => Body::empty(),
        };
        let request = Request::builder()
            .method(method)
            .uri(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body)?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let bytes = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, GatewayError>((status, bytes))
        };
        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| GatewayError::Timeout)??;

        let payload: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("Gateway responded with {}", status));
            warn!("Gateway rejected request to {}: {}", path, message);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(payload)
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn create_payment_intent(&self, amount: i64, currency: &str, metadata: &[(String, String)]) -> Result<PaymentIntent, GatewayError> {
        let metadata = metadata
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>();
        let body = json!({
            "amount": amount,
            "currency": currency,
            "metadata": metadata,
        });

        let payload = self.request(Method::POST, "payment_intents", Some(body)).await?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn retrieve_intent(&self, id: &str) -> Result<IntentState, GatewayError> {
        let payload = self.request(Method::GET, &format!("payment_intents/{}", id), None).await?;
        IntentState::from_value(payload)
    }

    async fn create_refund(&self, charge_id: &str, amount: i64) -> Result<GatewayRefund, GatewayError> {
        let body = json!({
            "charge": charge_id,
            "amount": amount,
        });

        let payload = self.request(Method::POST, "refunds", Some(body)).await?;
        Ok(serde_json::from_value(payload)?)
    }
}
