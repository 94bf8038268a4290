//! Order placement and order status workflow.

mod assembler;
mod commands;
mod inventory;
mod resolver;
mod service;
mod status;

pub use assembler::OrderAssembler;
pub use commands::{CreateOrder, LineItem};
pub use inventory::Inventory;
pub use resolver::{LineResolver, ResolvedLine};
pub use service::{OrderService, OrderServiceConfig};
pub use status::{CancelDecision, StatusMachine};
