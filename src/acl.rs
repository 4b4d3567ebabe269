//! Who may see an order and move it to another status.

use crate::errors::Error;
use crate::models::{Order, OrderStatus};
use crate::types::*;

/// Caller of an order operation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Actor {
    Customer(UserId),
    StoreManager { user_id: UserId, store_id: StoreId },
    Admin(UserId),
    /// Internal transitions, e.g. a confirmed payment
    System,
}

impl Actor {
    /// User recorded as committer of a status change.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Actor::Customer(id) | Actor::Admin(id) => Some(*id),
            Actor::StoreManager { user_id, .. } => Some(*user_id),
            Actor::System => None,
        }
    }

    pub fn can_view(&self, order: &Order) -> bool {
        match self {
            Actor::Customer(id) => order.customer_id == *id,
            Actor::StoreManager { store_id, .. } => order.store_id == *store_id,
            Actor::Admin(_) | Actor::System => true,
        }
    }

    /// Customers may only cancel their own pending orders; store managers drive their store's orders.
    pub fn can_set_status(&self, order: &Order, to: OrderStatus) -> bool {
        match self {
            Actor::Customer(id) => order.customer_id == *id && order.status == OrderStatus::Pending && to == OrderStatus::Cancelled,
            Actor::StoreManager { store_id, .. } => order.store_id == *store_id,
            Actor::Admin(_) | Actor::System => true,
        }
    }

    pub fn ensure_can_set_status(&self, order: &Order, to: OrderStatus) -> Result<(), Error> {
        if self.can_set_status(order, to) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn make_order(customer_id: UserId, store_id: StoreId) -> Order {
        let payload = CreateOrder {
            store_id,
            delivery_address_id: AddressId::new(),
            payment_method: PaymentMethod::Cash,
            delivery_instructions: String::new(),
            coupon_code: None,
        };
        let pricing = OrderPricing::compute(&[], Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        payload.into_order(customer_id, OrderNumber::generate(), pricing)
    }

    #[test]
    fn customer_only_cancels_own_pending_order() {
        let customer = UserId::new();
        let mut order = make_order(customer, StoreId::new());
        let actor = Actor::Customer(customer);

        assert!(actor.can_set_status(&order, OrderStatus::Cancelled));
        assert!(!actor.can_set_status(&order, OrderStatus::Confirmed));
        assert!(!Actor::Customer(UserId::new()).can_set_status(&order, OrderStatus::Cancelled));

        order.apply_status(OrderStatus::Confirmed, Utc::now()).unwrap();
        assert!(!actor.can_set_status(&order, OrderStatus::Cancelled));
    }

    #[test]
    fn managers_are_scoped_to_their_store() {
        let store_id = StoreId::new();
        let order = make_order(UserId::new(), store_id);

        let manager = Actor::StoreManager {
            user_id: UserId::new(),
            store_id,
        };
        let stranger = Actor::StoreManager {
            user_id: UserId::new(),
            store_id: StoreId::new(),
        };

        assert!(manager.can_set_status(&order, OrderStatus::Confirmed));
        assert!(manager.can_view(&order));
        assert!(!stranger.can_set_status(&order, OrderStatus::Confirmed));
        assert!(!stranger.can_view(&order));
        assert!(Actor::System.can_set_status(&order, OrderStatus::Cancelled));
        assert_eq!(Actor::System.user_id(), None);
    }
}
