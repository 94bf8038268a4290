//! Shared types used across the store, domain and API crates.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseOrderStatusError};
pub use types::{AlbumId, CustomerId, OrderId, OrderItemId};
