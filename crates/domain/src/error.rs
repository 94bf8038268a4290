//! Domain error types.

use common::{AlbumId, OrderStatus};
use store::StoreError;
use thiserror::Error;

/// The kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Customer,
    Album,
    Order,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customer => "Customer",
            EntityKind::Album => "Album",
            EntityKind::Order => "Order",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during order operations.
///
/// Store errors never cross this boundary as-is: conflicts are retried and
/// missing records become `NotFound`, everything else becomes `Storage`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// A customer, album or order does not exist.
    #[error("{entity} not found with id: {id}")]
    NotFound { entity: EntityKind, id: String },

    /// A line item asks for more units than the album has in stock.
    #[error("Insufficient stock for album {album_id}. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        album_id: AlbumId,
        available: u32,
        requested: u32,
    },

    /// The order's current status does not allow the requested change.
    #[error("Invalid status transition: cannot {action} order in {current} status")]
    InvalidTransition {
        current: OrderStatus,
        action: &'static str,
    },

    /// Concurrent writers kept winning the conditional update.
    #[error("{entity} {id} was modified concurrently; gave up after {attempts} attempts")]
    ConcurrencyExhausted {
        entity: EntityKind,
        id: String,
        attempts: u32,
    },

    /// The request itself is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl OrderError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        OrderError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::NotFound { .. } => "not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::ConcurrencyExhausted { .. } => "concurrency_exhausted",
            OrderError::Validation(_) => "validation",
            OrderError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlbumNotFound(id) => OrderError::not_found(EntityKind::Album, id),
            StoreError::OrderNotFound(id) => OrderError::not_found(EntityKind::Order, id),
            other => OrderError::Storage(other.to_string()),
        }
    }
}

/// Result type for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;
