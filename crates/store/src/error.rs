use thiserror::Error;

use crate::{AlbumId, OrderId};

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional stock update lost a race.
    /// The expected quantity did not match the stored quantity.
    #[error("Stock conflict for album {album_id}: expected {expected}, found {actual}")]
    StockConflict {
        album_id: AlbumId,
        expected: u32,
        actual: u32,
    },

    /// A conditional order update lost a race.
    #[error("Version conflict for order {order_id}: expected version {expected}, found {actual}")]
    OrderConflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    /// An increment would push the stock past the counter's range.
    #[error("Stock overflow for album {album_id}: {stock} + {quantity}")]
    StockOverflow {
        album_id: AlbumId,
        stock: u32,
        quantity: u32,
    },

    /// The album was not found in the catalog.
    #[error("Album not found: {0}")]
    AlbumNotFound(AlbumId),

    /// The order was not found in the ledger.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with the same id already exists.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// A stored row could not be mapped back into a record.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// The store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the error is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::StockConflict { .. } | StoreError::OrderConflict { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
