pub mod types;
pub use self::types::*;

pub mod memory;
pub use self::memory::*;

pub mod notification;
pub use self::notification::*;

pub mod address;
pub use self::address::*;

pub mod cart;
pub use self::cart::*;

pub mod coupon;
pub use self::coupon::*;

pub mod order;
pub use self::order::*;

pub mod payment;
pub use self::payment::*;
