//! Storage collaborators for order placement.
//!
//! Three interfaces are consumed by the order workflow: the catalog (album
//! price and stock), the customer directory and the order ledger. Each has an
//! in-memory implementation for tests and local runs, and a PostgreSQL one.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{AlbumId, CustomerId, Money, OrderId, OrderItemId, OrderStatus};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{Album, Customer, Order, OrderItem};
pub use postgres::PostgresStore;
pub use store::{CatalogStore, CustomerDirectory, OrderLedger};
