use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::NoTls;
use uuid::Uuid;

pub type DbPool = bb8::Pool<PostgresConnectionManager<NoTls>>;

macro_rules! uuid_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)*) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, Display, Eq, FromStr, PartialEq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            pub struct $name(pub Uuid);

            impl $name {
                pub fn new() -> Self {
                    $name(Uuid::new_v4())
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }
        )*
    };
}

uuid_id! {
    UserId,
    StoreId,
    ProductId,
    AddressId,
    CartId,
    CartLineId,
    OrderId,
    OrderLineId,
    /// Identifier of an entry in an order's status history
    OrderDiffId,
    CouponId,
    CouponRedemptionId,
    PaymentId,
    RefundId,
    NotificationId,
}

pub type Quantity = i32;
