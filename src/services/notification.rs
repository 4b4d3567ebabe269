use serde_json::Value;

use super::memory::SharedStorage;
use super::types::ServiceResult;
use crate::models::*;
use crate::repos;
use crate::types::*;

/// Receives order and payment events addressed to a user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: UserId, kind: NotificationKind, payload: Value) -> ServiceResult<()>;
}

/// Sends an event, logging instead of failing when delivery does not work out.
pub async fn dispatch(notifier: &dyn Notifier, user_id: UserId, kind: NotificationKind, payload: Value) {
    if let Err(e) = notifier.notify(user_id, kind, payload).await {
        warn!("Failed to deliver {} notification to user {}: {}", kind, user_id, e);
    }
}

/// Event payload describing an order
pub fn order_payload(order: &Order) -> Value {
    json!({
        "order_id": order.id,
        "order_number": order.order_number,
        "status": order.status,
        "payment_status": order.payment_status,
        "total_amount": order.total_amount,
    })
}

/// Stores in-app notifications in the database
pub struct NotifierImpl {
    db_pool: DbPool,
}

impl NotifierImpl {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl Notifier for NotifierImpl {
    async fn notify(&self, user_id: UserId, kind: NotificationKind, payload: Value) -> ServiceResult<()> {
        let conn = self.db_pool.get().await?;
        let notification = Notification::new(user_id, kind, payload);
        repos::notification::insert(&*conn, &notification).await?;

        Ok(())
    }
}

/// Only writes events to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: UserId, kind: NotificationKind, payload: Value) -> ServiceResult<()> {
        info!("Notification {} for user {}: {}", kind, user_id, payload);
        Ok(())
    }
}

pub struct NotifierMemory {
    pub inner: SharedStorage,
}

#[async_trait]
impl Notifier for NotifierMemory {
    async fn notify(&self, user_id: UserId, kind: NotificationKind, payload: Value) -> ServiceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.notifications.push(Notification::new(user_id, kind, payload));

        Ok(())
    }
}
