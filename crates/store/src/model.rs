//! Records held by the stores.
//!
//! Orders and their items are stored side by side and reference each other
//! and albums by id only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AlbumId, CustomerId, Money, OrderId, OrderItemId, OrderStatus};

/// An album as seen by order placement: its price and stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub title: String,
    pub price: Money,
    pub stock_quantity: u32,
}

impl Album {
    pub fn new(title: impl Into<String>, price: Money, stock_quantity: u32) -> Self {
        Self {
            id: AlbumId::new(),
            title: title.into(),
            price,
            stock_quantity,
        }
    }
}

/// A customer identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
}

impl Customer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A persisted line of an order.
///
/// `unit_price` and `subtotal` are snapshots taken when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub album_id: AlbumId,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// A persisted order together with the items it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by the ledger on every update.
    pub version: i64,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Sum of the stored item subtotals, or `None` on overflow.
    pub fn items_total(&self) -> Option<Money> {
        Money::checked_sum(self.items.iter().map(|item| item.subtotal))
    }
}
