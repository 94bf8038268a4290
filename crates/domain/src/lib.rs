//! Domain layer for order placement.
//!
//! This crate provides the order workflow over the storage collaborators:
//! - Line resolution: pricing a requested line and reserving its stock
//! - Order assembly: creating an order atomically, with compensation
//! - Status machine: status updates and cancellation with stock restoration
//! - OrderService: the operations a transport layer wraps

pub mod error;
pub mod order;

pub use error::{EntityKind, OrderError, Result};
pub use order::{
    CancelDecision, CreateOrder, Inventory, LineItem, LineResolver, OrderAssembler, OrderService,
    OrderServiceConfig, ResolvedLine, StatusMachine,
};
pub use store::{Album, Customer, Order, OrderItem};
pub use common::{AlbumId, CustomerId, Money, OrderId, OrderItemId, OrderStatus};
