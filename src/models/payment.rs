use std::fmt;

use chrono::prelude::*;
use chrono::Duration;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::Row;
use uuid::Uuid;
use validator::Validate;

use super::order::{Order, PaymentMethod};
use crate::errors::{Error, RepoError};
use crate::types::*;
use crate::util::{column, parsed_column, FromRow};

pub const ID_COLUMN: &str = "id";
pub const ORDER_ID_COLUMN: &str = "order_id";
pub const USER_ID_COLUMN: &str = "user_id";
pub const TRANSACTION_ID_COLUMN: &str = "transaction_id";
pub const PAYMENT_METHOD_COLUMN: &str = "payment_method";
pub const AMOUNT_COLUMN: &str = "amount";
pub const CURRENCY_COLUMN: &str = "currency";
pub const STATUS_COLUMN: &str = "status";
pub const GATEWAY_INTENT_ID_COLUMN: &str = "gateway_intent_id";
pub const GATEWAY_CHARGE_ID_COLUMN: &str = "gateway_charge_id";
pub const GATEWAY_RESPONSE_COLUMN: &str = "gateway_response";
pub const FAILURE_REASON_COLUMN: &str = "failure_reason";
pub const FAILURE_CODE_COLUMN: &str = "failure_code";
pub const REFUNDED_AMOUNT_COLUMN: &str = "refunded_amount";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";
pub const COMPLETED_AT_COLUMN: &str = "completed_at";

pub const PAYMENT_ID_COLUMN: &str = "payment_id";
pub const REASON_COLUMN: &str = "reason";
pub const DESCRIPTION_COLUMN: &str = "description";
pub const GATEWAY_REFUND_ID_COLUMN: &str = "gateway_refund_id";
pub const PROCESSED_AT_COLUMN: &str = "processed_at";

/// Gateway status of an intent that has been charged
pub const INTENT_SUCCEEDED: &str = "succeeded";

/// A claim on a payment whose intent request never came back expires after this many seconds
pub const INTENT_CLAIM_TIMEOUT_SECS: i64 = 120;

string_enum! {
    /// Status of a payment, mirrored onto the order's `payment_status`.
    pub enum PaymentStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        PartiallyRefunded => "partially_refunded",
        Refunded => "refunded",
        Cancelled => "cancelled",
    }
}

/// Locally generated payment reference, e.g. `TXN-123456789`
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn generate() -> Self {
        TransactionId(format!("TXN-{}", rand::thread_rng().gen_range(100_000_000..=999_999_999)))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub transaction_id: TransactionId,
    pub payment_method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub gateway_intent_id: Option<String>,
    pub gateway_charge_id: Option<String>,
    pub gateway_response: Value,
    pub failure_reason: String,
    pub failure_code: String,
    pub refunded_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(order: &Order, amount: Decimal, currency: &str, transaction_id: TransactionId) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id: order.id,
            user_id: order.customer_id,
            transaction_id,
            payment_method: order.payment_method,
            amount,
            currency: currency.to_string(),
            status: PaymentStatus::Pending,
            gateway_intent_id: None,
            gateway_charge_id: None,
            gateway_response: Value::Null,
            failure_reason: String::new(),
            failure_code: String::new(),
            refunded_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// A payment without an intent can be retried in place, unless another request
    /// holds a fresh claim on it.
    pub fn is_retryable(&self, now: DateTime<Utc>) -> bool {
        if self.gateway_intent_id.is_some() {
            return false;
        }
        match self.status {
            PaymentStatus::Pending => true,
            PaymentStatus::Processing => now - self.updated_at > Duration::seconds(INTENT_CLAIM_TIMEOUT_SECS),
            _ => false,
        }
    }

    /// Marks the payment as having an intent request in flight.
    pub fn claim_intent(&mut self, amount: Decimal, now: DateTime<Utc>) {
        self.amount = amount;
        self.status = PaymentStatus::Processing;
        self.updated_at = now;
    }

    pub fn attach_intent(&mut self, intent_id: String, now: DateTime<Utc>) {
        self.status = PaymentStatus::Pending;
        self.gateway_intent_id = Some(intent_id);
        self.failure_reason = String::new();
        self.failure_code = String::new();
        self.updated_at = now;
    }

    pub fn refundable_amount(&self) -> Decimal {
        match self.status {
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded => (self.amount - self.refunded_amount).max(Decimal::ZERO),
            _ => Decimal::ZERO,
        }
    }

    /// Checks a refund request and returns the amount to refund.
    /// `reserved` is the sum of refunds still waiting on the gateway.
    pub fn check_refund(&self, amount: Option<Decimal>, reserved: Decimal) -> Result<Decimal, Error> {
        let charge_missing = self.gateway_charge_id.as_ref().map_or(true, |id| id.is_empty());
        if charge_missing {
            return Err(Error::NoChargeReference);
        }
        let refundable = (self.refundable_amount() - reserved).max(Decimal::ZERO);
        let amount = amount.unwrap_or(refundable);
        if amount <= Decimal::ZERO {
            return Err(Error::Validation("refund amount must be positive".to_string()));
        }
        if amount > refundable {
            return Err(Error::RefundExceedsPayment { refundable });
        }

        Ok(amount)
    }

    pub fn complete(&mut self, charge_id: Option<String>, response: Value, now: DateTime<Utc>) {
        self.status = PaymentStatus::Completed;
        self.gateway_charge_id = charge_id;
        self.gateway_response = response;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn fail(&mut self, intent_status: &str, response: Value, now: DateTime<Utc>) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = format!("Payment intent status: {}", intent_status);
        self.failure_code = intent_status.to_string();
        self.gateway_response = response;
        self.updated_at = now;
    }

    /// Records a gateway error, releasing an intent claim if one is held.
    pub fn record_failure(&mut self, reason: &str, now: DateTime<Utc>) {
        if self.status == PaymentStatus::Processing {
            self.status = PaymentStatus::Pending;
        }
        self.failure_reason = reason.to_string();
        self.failure_code = "gateway_error".to_string();
        self.updated_at = now;
    }

    pub fn register_refund(&mut self, amount: Decimal, now: DateTime<Utc>) {
        self.refunded_amount += amount;
        self.status = if self.refunded_amount >= self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.updated_at = now;
    }
}

impl FromRow for Payment {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: PaymentId(column(row, ID_COLUMN)?),
            order_id: OrderId(column(row, ORDER_ID_COLUMN)?),
            user_id: UserId(column(row, USER_ID_COLUMN)?),
            transaction_id: TransactionId(column(row, TRANSACTION_ID_COLUMN)?),
            payment_method: parsed_column(row, PAYMENT_METHOD_COLUMN)?,
            amount: column(row, AMOUNT_COLUMN)?,
            currency: column(row, CURRENCY_COLUMN)?,
            status: parsed_column(row, STATUS_COLUMN)?,
            gateway_intent_id: column(row, GATEWAY_INTENT_ID_COLUMN)?,
            gateway_charge_id: column(row, GATEWAY_CHARGE_ID_COLUMN)?,
            gateway_response: column(row, GATEWAY_RESPONSE_COLUMN)?,
            failure_reason: column(row, FAILURE_REASON_COLUMN)?,
            failure_code: column(row, FAILURE_CODE_COLUMN)?,
            refunded_amount: column(row, REFUNDED_AMOUNT_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
            updated_at: column(row, UPDATED_AT_COLUMN)?,
            completed_at: column(row, COMPLETED_AT_COLUMN)?,
        })
    }
}

/// Returned to the client so it can complete the charge against the gateway
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentCreated {
    pub payment: Payment,
    pub client_secret: String,
}

string_enum! {
    pub enum RefundReason {
        CustomerRequest => "customer_request",
        OrderCancelled => "order_cancelled",
        ProductUnavailable => "product_unavailable",
        QualityIssue => "quality_issue",
        DeliveryFailed => "delivery_failed",
        DuplicateCharge => "duplicate_charge",
        Other => "other",
    }
}

impl Default for RefundReason {
    fn default() -> Self {
        RefundReason::CustomerRequest
    }
}

string_enum! {
    pub enum RefundStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub reason: RefundReason,
    pub description: String,
    pub status: RefundStatus,
    pub gateway_refund_id: Option<String>,
    pub failure_reason: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Refund {
    pub fn new(payment: &Payment, amount: Decimal, request: &NewRefund) -> Self {
        Self {
            id: RefundId::new(),
            payment_id: payment.id,
            order_id: payment.order_id,
            amount,
            reason: request.reason,
            description: request.description.clone(),
            status: RefundStatus::Pending,
            gateway_refund_id: None,
            failure_reason: String::new(),
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Mirrors the status reported by the gateway for a created refund.
    pub fn accept(&mut self, gateway_refund_id: String, gateway_status: &str, now: DateTime<Utc>) {
        self.gateway_refund_id = Some(gateway_refund_id);
        if gateway_status == INTENT_SUCCEEDED {
            self.status = RefundStatus::Completed;
            self.processed_at = Some(now);
        } else {
            self.status = RefundStatus::Processing;
        }
    }

    pub fn reject(&mut self, reason: &str) {
        self.status = RefundStatus::Failed;
        self.failure_reason = reason.to_string();
    }
}

impl FromRow for Refund {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: RefundId(column(row, ID_COLUMN)?),
            payment_id: PaymentId(column(row, PAYMENT_ID_COLUMN)?),
            order_id: OrderId(column(row, ORDER_ID_COLUMN)?),
            amount: column(row, AMOUNT_COLUMN)?,
            reason: parsed_column(row, REASON_COLUMN)?,
            description: column(row, DESCRIPTION_COLUMN)?,
            status: parsed_column(row, STATUS_COLUMN)?,
            gateway_refund_id: column(row, GATEWAY_REFUND_ID_COLUMN)?,
            failure_reason: column(row, FAILURE_REASON_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
            processed_at: column::<Option<DateTime<Utc>>>(row, PROCESSED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewRefund {
    /// Full remaining amount when omitted
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub reason: RefundReason,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
}

/// Order id carried to the gateway, handy when reconciling
pub fn intent_metadata(order: &Order, transaction_id: &TransactionId) -> Vec<(String, String)> {
    vec![
        ("order_id".to_string(), order.id.to_string()),
        ("order_number".to_string(), order.order_number.to_string()),
        ("transaction_id".to_string(), transaction_id.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_payment(amount: Decimal) -> Payment {
        let now = Utc::now();
        Payment {
            id: PaymentId::new(),
            order_id: OrderId::new(),
            user_id: UserId::new(),
            transaction_id: TransactionId::generate(),
            payment_method: PaymentMethod::Card,
            amount,
            currency: "usd".to_string(),
            status: PaymentStatus::Pending,
            gateway_intent_id: Some("pi_1".to_string()),
            gateway_charge_id: None,
            gateway_response: Value::Null,
            failure_reason: String::new(),
            failure_code: String::new(),
            refunded_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[test]
    fn transaction_id_shape() {
        let id = TransactionId::generate();
        assert!(id.0.starts_with("TXN-"));
        assert_eq!(id.0.len(), 13);
        assert!(id.0[4..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn refund_requires_charge() {
        let payment = make_payment(Decimal::new(2400, 2));
        match payment.check_refund(None, Decimal::ZERO) {
            Err(Error::NoChargeReference) => {}
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[test]
    fn partial_refunds_track_remaining_amount() {
        let now = Utc::now();
        let mut payment = make_payment(Decimal::new(2400, 2));
        payment.complete(Some("ch_1".to_string()), Value::Null, now);

        let first = payment.check_refund(Some(Decimal::new(1000, 2)), Decimal::ZERO).unwrap();
        payment.register_refund(first, now);
        assert_eq!(payment.status, PaymentStatus::PartiallyRefunded);
        assert_eq!(payment.refundable_amount(), Decimal::new(1400, 2));

        match payment.check_refund(Some(Decimal::new(1500, 2)), Decimal::ZERO) {
            Err(Error::RefundExceedsPayment { refundable }) => assert_eq!(refundable, Decimal::new(1400, 2)),
            other => panic!("Unexpected result {:?}", other),
        }

        let rest = payment.check_refund(None, Decimal::ZERO).unwrap();
        assert_eq!(rest, Decimal::new(1400, 2));
        payment.register_refund(rest, now);
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert_eq!(payment.refundable_amount(), Decimal::ZERO);
    }

    #[test]
    fn refunds_in_flight_are_not_refundable_again() {
        let mut payment = make_payment(Decimal::new(2400, 2));
        payment.complete(Some("ch_1".to_string()), Value::Null, Utc::now());

        match payment.check_refund(Some(Decimal::new(1500, 2)), Decimal::new(1500, 2)) {
            Err(Error::RefundExceedsPayment { refundable }) => assert_eq!(refundable, Decimal::new(900, 2)),
            other => panic!("Unexpected result {:?}", other),
        }
        assert_eq!(payment.check_refund(None, Decimal::new(1500, 2)).unwrap(), Decimal::new(900, 2));
    }

    #[test]
    fn claimed_payment_is_not_retryable_until_claim_expires() {
        let now = Utc::now();
        let mut payment = make_payment(Decimal::new(1000, 2));
        payment.gateway_intent_id = None;
        assert!(payment.is_retryable(now));

        payment.claim_intent(Decimal::new(1200, 2), now);
        assert_eq!(payment.status, PaymentStatus::Processing);
        assert!(!payment.is_retryable(now));
        assert!(payment.is_retryable(now + Duration::seconds(INTENT_CLAIM_TIMEOUT_SECS + 1)));

        payment.record_failure("gateway timeout", now);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.is_retryable(now));

        payment.claim_intent(Decimal::new(1200, 2), now);
        payment.attach_intent("pi_9".to_string(), now);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(!payment.is_retryable(now));
    }

    #[test]
    fn failed_intent_keeps_gateway_status() {
        let mut payment = make_payment(Decimal::new(1000, 2));
        payment.fail("requires_payment_method", Value::Null, Utc::now());

        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_reason, "Payment intent status: requires_payment_method");
    }

    #[test]
    fn refund_mirrors_gateway_status() {
        let mut payment = make_payment(Decimal::new(1000, 2));
        payment.complete(Some("ch_1".to_string()), Value::Null, Utc::now());
        let request = NewRefund::default();

        let mut refund = Refund::new(&payment, Decimal::new(1000, 2), &request);
        refund.accept("re_1".to_string(), "pending", Utc::now());
        assert_eq!(refund.status, RefundStatus::Processing);
        assert!(refund.processed_at.is_none());

        refund.accept("re_1".to_string(), INTENT_SUCCEEDED, Utc::now());
        assert_eq!(refund.status, RefundStatus::Completed);
    }
}
