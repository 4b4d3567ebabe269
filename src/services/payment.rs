use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use validator::Validate;

use super::memory::SharedStorage;
use super::notification::{dispatch, order_payload, Notifier};
use super::types::ServiceResult;
use crate::config;
use crate::errors::*;
use crate::gateway::{GatewayError, IntentState, PaymentGateway};
use crate::models::*;
use crate::repos;
use crate::types::*;

/// Coordinates payment records with the external gateway
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Opens a payment for the order, `amount` defaulting to the order total
    async fn create_intent(&self, order_id: OrderId, amount: Option<Decimal>) -> ServiceResult<PaymentIntentCreated>;
    /// Settles the payment from the intent status reported by the gateway
    async fn confirm(&self, intent_id: &str) -> ServiceResult<Payment>;
    async fn refund(&self, payment_id: PaymentId, request: NewRefund) -> ServiceResult<Refund>;
    async fn get_payment_for_order(&self, order_id: OrderId) -> ServiceResult<Option<Payment>>;
    async fn list_refunds(&self, payment_id: PaymentId) -> ServiceResult<Vec<Refund>>;
}

fn gateway_error(e: GatewayError) -> Error {
    Error::Gateway(format!("{}", e))
}

fn minor_units(amount: Decimal) -> ServiceResult<i64> {
    if amount <= Decimal::ZERO {
        return Err(Error::Validation("payment amount must be positive".to_string()));
    }
    to_minor_units(amount).ok_or_else(|| Error::Validation(format!("amount {} is out of range", amount)))
}

/// Applies a gateway-reported intent to the payment and its order.
/// Returns whether the payment was charged.
fn settle(payment: &mut Payment, order: &mut Order, intent: &IntentState) -> ServiceResult<bool> {
    let now = Utc::now();
    if intent.status != INTENT_SUCCEEDED {
        payment.fail(&intent.status, intent.raw.clone(), now);
        return Ok(false);
    }

    payment.complete(intent.charges.first().cloned(), intent.raw.clone(), now);
    order.payment_status = PaymentStatus::Completed;
    order.updated_at = now;
    if order.status == OrderStatus::Pending {
        order.apply_status(OrderStatus::Confirmed, now)?;
    }

    Ok(true)
}

async fn notify_settled(notifier: &dyn Notifier, payment: &Payment, order: &Order, confirmed: bool) {
    let payload = json!({
        "payment_id": payment.id,
        "transaction_id": payment.transaction_id,
        "order_number": order.order_number,
        "amount": payment.amount,
        "status": payment.status,
    });
    if payment.status == PaymentStatus::Completed {
        dispatch(notifier, payment.user_id, NotificationKind::PaymentReceived, payload).await;
        if confirmed {
            dispatch(notifier, order.customer_id, NotificationKind::OrderConfirmed, order_payload(order)).await;
        }
    } else {
        dispatch(notifier, payment.user_id, NotificationKind::PaymentFailed, payload).await;
    }
}

async fn notify_refunded(notifier: &dyn Notifier, payment: &Payment, refund: &Refund) {
    let payload = json!({
        "payment_id": payment.id,
        "refund_id": refund.id,
        "amount": refund.amount,
        "status": refund.status,
    });
    dispatch(notifier, payment.user_id, NotificationKind::PaymentRefunded, payload).await;
}

pub struct PaymentServiceImpl {
    db_pool: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    number_attempts: u32,
    notifier: Arc<dyn Notifier>,
}

impl PaymentServiceImpl {
    pub fn new(db_pool: DbPool, config: &config::Config, gateway: Arc<dyn PaymentGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db_pool,
            gateway,
            currency: config.gateway.currency.clone(),
            number_attempts: config.orders.number_attempts,
            notifier,
        }
    }

    /// Claims the order's payment for an intent request, creating it on first use.
    async fn open_payment(&self, order: &Order, amount: Decimal) -> ServiceResult<Payment> {
        let now = Utc::now();
        let conn = self.db_pool.get().await?;
        if let Some(mut existing) = repos::payment::get_for_order(&*conn, order.id).await? {
            if !existing.is_retryable(now) {
                return Err(Error::PaymentExists);
            }
            existing.claim_intent(amount, now);
            let stale_before = now - Duration::seconds(INTENT_CLAIM_TIMEOUT_SECS);
            return repos::payment::claim_for_intent(&*conn, &existing, stale_before)
                .await?
                .ok_or(Error::PaymentExists);
        }

        for _ in 0..self.number_attempts {
            let mut payment = Payment::new(order, amount, &self.currency, TransactionId::generate());
            payment.claim_intent(amount, now);
            if let Some(payment) = repos::payment::insert(&*conn, &payment).await? {
                return Ok(payment);
            }
            if repos::payment::get_for_order(&*conn, order.id).await?.is_some() {
                return Err(Error::PaymentExists);
            }
            debug!("Transaction id collision, retrying");
        }

        Err(Error::IdentifierExhausted("transaction id"))
    }

    /// Locks the payment and records a pending refund against it.
    async fn reserve_refund(&self, payment_id: PaymentId, request: &NewRefund) -> ServiceResult<(Payment, Refund)> {
        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        let payment = repos::payment::lock(&tx, payment_id).await?.ok_or(Error::NotFound("Payment"))?;
        let reserved = repos::refund::list_pending(&tx, payment_id)
            .await?
            .iter()
            .map(|r| r.amount)
            .sum::<Decimal>();
        let amount = payment.check_refund(request.amount, reserved)?;
        minor_units(amount)?;
        let refund = repos::refund::insert(&tx, &Refund::new(&payment, amount, request)).await?;
        tx.commit().await?;

        Ok((payment, refund))
    }
}

#[async_trait]
impl PaymentService for PaymentServiceImpl {
    async fn create_intent(&self, order_id: OrderId, amount: Option<Decimal>) -> ServiceResult<PaymentIntentCreated> {
        let order = {
            let conn = self.db_pool.get().await?;
            repos::order::find_one(&*conn, OrderIdentifier::Id(order_id).into())
                .await?
                .ok_or(Error::NotFound("Order"))?
        };
        let amount = amount.unwrap_or(order.total_amount);
        let minor = minor_units(amount)?;

        let mut payment = self.open_payment(&order, amount).await?;
        let metadata = intent_metadata(&order, &payment.transaction_id);
        let result = self.gateway.create_payment_intent(minor, &self.currency, &metadata).await;

        let conn = self.db_pool.get().await?;
        match result {
            Ok(intent) => {
                payment.attach_intent(intent.id, Utc::now());
                let payment = repos::payment::update(&*conn, &payment).await?;
                info!("Created payment intent for order {}", order.order_number);

                Ok(PaymentIntentCreated {
                    payment,
                    client_secret: intent.client_secret,
                })
            }
            Err(e) => {
                error!("Failed to create payment intent for order {}: {}", order.order_number, e);
                payment.record_failure(&format!("{}", e), Utc::now());
                repos::payment::update(&*conn, &payment).await?;

                Err(gateway_error(e))
            }
        }
    }

    async fn confirm(&self, intent_id: &str) -> ServiceResult<Payment> {
        debug!("Confirming payment intent {}", intent_id);
        let intent = match self.gateway.retrieve_intent(intent_id).await {
            Ok(intent) => intent,
            Err(e) => {
                let conn = self.db_pool.get().await?;
                if let Some(mut payment) = repos::payment::get_by_intent(&*conn, intent_id).await? {
                    payment.record_failure(&format!("{}", e), Utc::now());
                    repos::payment::update(&*conn, &payment).await?;
                }
                return Err(gateway_error(e));
            }
        };

        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        let mut payment = repos::payment::lock_by_intent(&tx, intent_id).await?.ok_or(Error::NotFound("Payment"))?;
        if payment.status != PaymentStatus::Pending && payment.status != PaymentStatus::Failed {
            return Ok(payment);
        }
        let mut order = repos::order::lock(&tx, OrderIdentifier::Id(payment.order_id).into())
            .await?
            .ok_or(Error::NotFound("Order"))?;
        let was_pending = order.status == OrderStatus::Pending;

        let charged = settle(&mut payment, &mut order, &intent)?;
        let payment = repos::payment::update(&tx, &payment).await?;
        let confirmed = charged && was_pending;
        if charged {
            order = repos::order::update_state(&tx, &order).await?;
            if confirmed {
                let diff = OrderDiff::new(order.id, OrderStatus::Confirmed, None, "Payment confirmed");
                repos::order_diff::insert(&tx, &diff).await?;
            }
        }
        tx.commit().await?;

        notify_settled(&*self.notifier, &payment, &order, confirmed).await;

        if charged {
            info!("Payment {} completed", payment.transaction_id);
            Ok(payment)
        } else {
            warn!("Payment {} failed with intent status {}", payment.transaction_id, intent.status);
            Err(Error::PaymentDeclined { status: intent.status })
        }
    }

    async fn refund(&self, payment_id: PaymentId, request: NewRefund) -> ServiceResult<Refund> {
        request.validate()?;
        let (payment, mut refund) = self.reserve_refund(payment_id, &request).await?;
        let charge_id = payment.gateway_charge_id.clone().unwrap_or_default();

        let result = self.gateway.create_refund(&charge_id, minor_units(refund.amount)?).await;

        let mut conn = self.db_pool.get().await?;
        match result {
            Ok(gateway_refund) => {
                refund.accept(gateway_refund.id, &gateway_refund.status, Utc::now());

                let tx = conn.transaction().await?;
                let mut payment = repos::payment::lock(&tx, payment_id).await?.ok_or(Error::NotFound("Payment"))?;
                payment.register_refund(refund.amount, Utc::now());
                let payment = repos::payment::update(&tx, &payment).await?;
                let refund = repos::refund::update(&tx, &refund).await?;

                if let Some(mut order) = repos::order::lock(&tx, OrderIdentifier::Id(payment.order_id).into()).await? {
                    order.payment_status = payment.status;
                    order.updated_at = Utc::now();
                    repos::order::update_state(&tx, &order).await?;
                }
                tx.commit().await?;
                info!("Refunded {} of payment {}", refund.amount, payment.transaction_id);

                notify_refunded(&*self.notifier, &payment, &refund).await;
                Ok(refund)
            }
            Err(e) => {
                error!("Refund of payment {} failed: {}", payment.transaction_id, e);
                refund.reject(&format!("{}", e));
                repos::refund::update(&*conn, &refund).await?;

                Err(gateway_error(e))
            }
        }
    }

    async fn get_payment_for_order(&self, order_id: OrderId) -> ServiceResult<Option<Payment>> {
        let conn = self.db_pool.get().await?;
        Ok(repos::payment::get_for_order(&*conn, order_id).await?)
    }

    async fn list_refunds(&self, payment_id: PaymentId) -> ServiceResult<Vec<Refund>> {
        let conn = self.db_pool.get().await?;
        Ok(repos::refund::list_for_payment(&*conn, payment_id).await?)
    }
}

/// In-memory implementation of payment service
pub struct PaymentServiceMemory {
    pub inner: SharedStorage,
    pub gateway: Arc<dyn PaymentGateway>,
    pub currency: String,
    pub notifier: Arc<dyn Notifier>,
}

#[async_trait]
impl PaymentService for PaymentServiceMemory {
    async fn create_intent(&self, order_id: OrderId, amount: Option<Decimal>) -> ServiceResult<PaymentIntentCreated> {
        let (order, mut payment) = {
            let mut inner = self.inner.lock().unwrap();
            let order = inner.orders.get(&order_id).cloned().ok_or(Error::NotFound("Order"))?;
            let amount = amount.unwrap_or(order.total_amount);
            minor_units(amount)?;

            let now = Utc::now();
            let existing = inner.payments.values().find(|p| p.order_id == order_id).cloned();
            let mut payment = match existing {
                Some(p) if !p.is_retryable(now) => return Err(Error::PaymentExists),
                Some(p) => p,
                None => {
                    let transaction_id = loop {
                        let candidate = TransactionId::generate();
                        if !inner.payments.values().any(|p| p.transaction_id == candidate) {
                            break candidate;
                        }
                    };
                    Payment::new(&order, amount, &self.currency, transaction_id)
                }
            };
            payment.claim_intent(amount, now);
            inner.payments.insert(payment.id, payment.clone());
            (order, payment)
        };

        let metadata = intent_metadata(&order, &payment.transaction_id);
        let result = self
            .gateway
            .create_payment_intent(minor_units(payment.amount)?, &self.currency, &metadata)
            .await;

        let mut inner = self.inner.lock().unwrap();
        match result {
            Ok(intent) => {
                payment.attach_intent(intent.id, Utc::now());
                inner.payments.insert(payment.id, payment.clone());

                Ok(PaymentIntentCreated {
                    payment,
                    client_secret: intent.client_secret,
                })
            }
            Err(e) => {
                payment.record_failure(&format!("{}", e), Utc::now());
                inner.payments.insert(payment.id, payment);

                Err(gateway_error(e))
            }
        }
    }

    async fn confirm(&self, intent_id: &str) -> ServiceResult<Payment> {
        let intent = self.gateway.retrieve_intent(intent_id).await;

        let (payment, order, confirmed, status) = {
            let mut inner = self.inner.lock().unwrap();
            let payment = inner
                .payments
                .values()
                .find(|p| p.gateway_intent_id.as_ref().map(String::as_str) == Some(intent_id))
                .cloned();

            let intent = match intent {
                Ok(intent) => intent,
                Err(e) => {
                    if let Some(mut payment) = payment {
                        payment.record_failure(&format!("{}", e), Utc::now());
                        inner.payments.insert(payment.id, payment);
                    }
                    return Err(gateway_error(e));
                }
            };
            let mut payment = payment.ok_or(Error::NotFound("Payment"))?;
            if payment.status != PaymentStatus::Pending && payment.status != PaymentStatus::Failed {
                return Ok(payment);
            }

            let mut order = inner.orders.get(&payment.order_id).cloned().ok_or(Error::NotFound("Order"))?;
            let was_pending = order.status == OrderStatus::Pending;
            let charged = settle(&mut payment, &mut order, &intent)?;
            let confirmed = charged && was_pending;

            inner.payments.insert(payment.id, payment.clone());
            if charged {
                inner.orders.insert(order.id, order.clone());
                if confirmed {
                    inner
                        .order_diffs
                        .push(OrderDiff::new(order.id, OrderStatus::Confirmed, None, "Payment confirmed"));
                }
            }
            (payment, order, confirmed, intent.status)
        };

        notify_settled(&*self.notifier, &payment, &order, confirmed).await;

        if payment.status == PaymentStatus::Completed {
            Ok(payment)
        } else {
            Err(Error::PaymentDeclined { status })
        }
    }

    async fn refund(&self, payment_id: PaymentId, request: NewRefund) -> ServiceResult<Refund> {
        request.validate()?;
        let (payment, mut refund) = {
            let mut inner = self.inner.lock().unwrap();
            let payment = inner.payments.get(&payment_id).cloned().ok_or(Error::NotFound("Payment"))?;
            let reserved = inner
                .refunds
                .iter()
                .filter(|r| r.payment_id == payment_id && r.status == RefundStatus::Pending)
                .map(|r| r.amount)
                .sum::<Decimal>();
            let amount = payment.check_refund(request.amount, reserved)?;
            minor_units(amount)?;
            let refund = Refund::new(&payment, amount, &request);
            inner.refunds.push(refund.clone());
            (payment, refund)
        };
        let charge_id = payment.gateway_charge_id.clone().unwrap_or_default();

        let result = self.gateway.create_refund(&charge_id, minor_units(refund.amount)?).await;

        let payment = {
            let mut inner = self.inner.lock().unwrap();
            let payment = match result {
                Ok(gateway_refund) => {
                    refund.accept(gateway_refund.id, &gateway_refund.status, Utc::now());
                    let mut payment = inner.payments.get(&payment_id).cloned().ok_or(Error::NotFound("Payment"))?;
                    payment.register_refund(refund.amount, Utc::now());
                    inner.payments.insert(payment.id, payment.clone());
                    if let Some(order) = inner.orders.get_mut(&payment.order_id) {
                        order.payment_status = payment.status;
                        order.updated_at = Utc::now();
                    }
                    Ok(payment)
                }
                Err(e) => {
                    refund.reject(&format!("{}", e));
                    Err(gateway_error(e))
                }
            };
            if let Some(stored) = inner.refunds.iter_mut().find(|r| r.id == refund.id) {
                *stored = refund.clone();
            }
            payment?
        };

        notify_refunded(&*self.notifier, &payment, &refund).await;

        Ok(refund)
    }

    async fn get_payment_for_order(&self, order_id: OrderId) -> ServiceResult<Option<Payment>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.payments.values().find(|p| p.order_id == order_id).cloned())
    }

    async fn list_refunds(&self, payment_id: PaymentId) -> ServiceResult<Vec<Refund>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.refunds.iter().filter(|r| r.payment_id == payment_id).cloned().collect())
    }
}
