use async_trait::async_trait;

use crate::{Album, AlbumId, Customer, CustomerId, Order, OrderId, Result};

/// Album price and stock lookup with a conditional stock write.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Retrieves an album by id.
    ///
    /// Returns None if the album doesn't exist.
    async fn get_album(&self, id: AlbumId) -> Result<Option<Album>>;

    /// Sets an album's stock to `new_quantity` if it currently equals `expected`.
    ///
    /// Fails with `StockConflict` when the stored quantity differs from
    /// `expected`, and with `AlbumNotFound` when the album doesn't exist.
    async fn update_stock(&self, id: AlbumId, expected: u32, new_quantity: u32) -> Result<()>;

    /// Adds `quantity` units to an album's stock whatever its current level.
    ///
    /// Returns the stock after the increment. Fails with `AlbumNotFound` when
    /// the album doesn't exist.
    async fn increment_stock(&self, id: AlbumId, quantity: u32) -> Result<u32>;
}

/// Customer identity lookup.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Retrieves a customer by id.
    ///
    /// Returns None if the customer doesn't exist.
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;
}

/// Durable storage for orders and their items.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persists a new order together with all of its items.
    ///
    /// The order and its items are written atomically - either all are
    /// stored or none are. Returns the order as stored.
    async fn create_order(&self, order: Order) -> Result<Order>;

    /// Retrieves an order with its items.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves all orders placed by a customer, oldest first.
    async fn list_orders_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Writes the mutable fields of an order (status and `updated_at`).
    ///
    /// Fails with `OrderConflict` if the stored version is not
    /// `expected_version`. On success the stored version is incremented and
    /// the updated order is returned.
    async fn update_order(&self, order: Order, expected_version: i64) -> Result<Order>;
}
