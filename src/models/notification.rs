use chrono::prelude::*;
use serde_json::Value;
use tokio_postgres::Row;

use super::order::OrderStatus;
use crate::errors::RepoError;
use crate::types::*;
use crate::util::{column, parsed_column, FromRow};

pub const ID_COLUMN: &str = "id";
pub const USER_ID_COLUMN: &str = "user_id";
pub const KIND_COLUMN: &str = "kind";
pub const TITLE_COLUMN: &str = "title";
pub const MESSAGE_COLUMN: &str = "message";
pub const PAYLOAD_COLUMN: &str = "payload";
pub const IS_READ_COLUMN: &str = "is_read";
pub const CREATED_AT_COLUMN: &str = "created_at";

string_enum! {
    pub enum NotificationKind {
        OrderPlaced => "order_placed",
        OrderConfirmed => "order_confirmed",
        OrderPreparing => "order_preparing",
        OrderReady => "order_ready",
        OrderOutForDelivery => "order_out_for_delivery",
        OrderDelivered => "order_delivered",
        OrderCancelled => "order_cancelled",
        PaymentReceived => "payment_received",
        PaymentFailed => "payment_failed",
        PaymentRefunded => "payment_refunded",
        LowStock => "low_stock",
    }
}

impl NotificationKind {
    /// Event raised when an order enters `status`.
    pub fn for_status(status: OrderStatus) -> NotificationKind {
        use self::NotificationKind::*;

        match status {
            OrderStatus::Pending => OrderPlaced,
            OrderStatus::Confirmed => OrderConfirmed,
            OrderStatus::Preparing => OrderPreparing,
            OrderStatus::Ready => OrderReady,
            OrderStatus::OutForDelivery => OrderOutForDelivery,
            OrderStatus::Delivered => OrderDelivered,
            OrderStatus::Cancelled => OrderCancelled,
        }
    }

    pub fn title(&self) -> &'static str {
        use self::NotificationKind::*;

        match self {
            OrderPlaced => "Order placed",
            OrderConfirmed => "Order confirmed",
            OrderPreparing => "Order is being prepared",
            OrderReady => "Order is ready",
            OrderOutForDelivery => "Order is out for delivery",
            OrderDelivered => "Order delivered",
            OrderCancelled => "Order cancelled",
            PaymentReceived => "Payment received",
            PaymentFailed => "Payment failed",
            PaymentRefunded => "Payment refunded",
            LowStock => "Low stock alert",
        }
    }
}

/// In-app notification stored for a user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub payload: Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: UserId, kind: NotificationKind, payload: Value) -> Self {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(|| kind.title().to_string());

        Self {
            id: NotificationId::new(),
            user_id,
            kind,
            title: kind.title().to_string(),
            message,
            payload,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

impl FromRow for Notification {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            id: NotificationId(column(row, ID_COLUMN)?),
            user_id: UserId(column(row, USER_ID_COLUMN)?),
            kind: parsed_column(row, KIND_COLUMN)?,
            title: column(row, TITLE_COLUMN)?,
            message: column(row, MESSAGE_COLUMN)?,
            payload: column(row, PAYLOAD_COLUMN)?,
            is_read: column(row, IS_READ_COLUMN)?,
            created_at: column(row, CREATED_AT_COLUMN)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_defaults_to_title() {
        let n = Notification::new(UserId::new(), NotificationKind::OrderReady, json!({ "order_number": "ORD-100000" }));
        assert_eq!(n.message, "Order is ready");

        let n = Notification::new(UserId::new(), NotificationKind::LowStock, json!({ "message": "Only 2 left" }));
        assert_eq!(n.message, "Only 2 left");
        assert_eq!(n.title, "Low stock alert");
    }

    #[test]
    fn every_status_has_an_event() {
        assert_eq!(NotificationKind::for_status(OrderStatus::Cancelled), NotificationKind::OrderCancelled);
        assert_eq!(
            NotificationKind::for_status(OrderStatus::OutForDelivery).as_str(),
            "order_out_for_delivery"
        );
    }
}
