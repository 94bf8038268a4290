//! Order status changes and cancellation.

use chrono::Utc;
use common::{OrderId, OrderStatus};
use store::{CatalogStore, Order, OrderItem, OrderLedger, StoreError};

use super::inventory::Inventory;
use crate::error::{EntityKind, OrderError, Result};

/// What a cancel request should do given the order's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelDecision {
    /// Mark the order cancelled and return its stock.
    Proceed,
    /// The order is already cancelled; nothing to do.
    AlreadyCancelled,
}

impl CancelDecision {
    /// Shipped and delivered orders cannot be cancelled. Refunded orders
    /// still can, which returns their stock.
    pub fn for_status(current: OrderStatus) -> Result<Self> {
        match current {
            OrderStatus::Cancelled => Ok(CancelDecision::AlreadyCancelled),
            OrderStatus::Shipped | OrderStatus::Delivered => Err(OrderError::InvalidTransition {
                current,
                action: "cancel",
            }),
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Refunded => {
                Ok(CancelDecision::Proceed)
            }
        }
    }
}

/// Orders in a terminal status accept no further status writes.
fn ensure_updatable(current: OrderStatus) -> Result<()> {
    if current.is_terminal() {
        return Err(OrderError::InvalidTransition {
            current,
            action: "update",
        });
    }
    Ok(())
}

/// Applies status changes to stored orders.
///
/// Every write is conditional on the version that was read. A lost race
/// re-reads the order and re-evaluates the transition against its new state.
pub struct StatusMachine<'a, C: CatalogStore, L: OrderLedger> {
    inventory: Inventory<'a, C>,
    ledger: &'a L,
    max_attempts: u32,
}

impl<'a, C: CatalogStore, L: OrderLedger> StatusMachine<'a, C, L> {
    pub fn new(catalog: &'a C, ledger: &'a L, max_attempts: u32) -> Self {
        Self {
            inventory: Inventory::new(catalog, max_attempts),
            ledger,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Sets the order's status to `new_status`.
    ///
    /// Any non-terminal order may move to any status; stock is never touched.
    pub async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        for attempt in 1..=self.max_attempts {
            let order = self.load(order_id).await?;
            ensure_updatable(order.status)?;

            let expected = order.version;
            let changed = Order {
                status: new_status,
                updated_at: Utc::now(),
                ..order
            };

            match self.ledger.update_order(changed, expected).await {
                Ok(updated) => return Ok(updated),
                Err(e) if e.is_conflict() => record_conflict(order_id, attempt, &e),
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.exhausted(order_id))
    }

    /// Cancels the order and returns every item's quantity to stock.
    ///
    /// The order is claimed first with a versioned write, so of two racing
    /// cancels only one restores stock; the other re-reads a cancelled order
    /// and does nothing. If restoring stock fails part way, the units already
    /// returned are reserved again and the previous status is put back. When
    /// those units can no longer be reserved the order stays cancelled, so its
    /// stock is never returned twice.
    ///
    /// Returns `false` when the order was already cancelled.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<bool> {
        for attempt in 1..=self.max_attempts {
            let order = self.load(order_id).await?;

            if CancelDecision::for_status(order.status)? == CancelDecision::AlreadyCancelled {
                return Ok(false);
            }

            let previous = order.status;
            let expected = order.version;
            let claim = Order {
                status: OrderStatus::Cancelled,
                updated_at: Utc::now(),
                ..order
            };

            let claimed = match self.ledger.update_order(claim, expected).await {
                Ok(claimed) => claimed,
                Err(e) if e.is_conflict() => {
                    record_conflict(order_id, attempt, &e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            self.restore_items(claimed, previous).await?;
            return Ok(true);
        }

        Err(self.exhausted(order_id))
    }

    async fn restore_items(&self, claimed: Order, previous: OrderStatus) -> Result<()> {
        let mut failure = None;
        for (index, item) in claimed.items.iter().enumerate() {
            if let Err(e) = self.inventory.restore(item.album_id, item.quantity).await {
                tracing::error!(
                    order_id = %claimed.id,
                    album_id = %item.album_id,
                    error = %e,
                    "stock restore failed, rolling back cancellation"
                );
                failure = Some((index, e));
                break;
            }
        }

        let Some((restored, error)) = failure else {
            return Ok(());
        };
        if self.undo_restores(&claimed.items[..restored]).await {
            self.revert_status(claimed, previous).await;
        } else {
            // Reopening would let a later cancel restore the same units twice.
            tracing::error!(
                order_id = %claimed.id,
                "restored stock could not be taken back, order stays cancelled"
            );
        }
        Err(error)
    }

    /// Takes back units already restored, newest first, and returns whether
    /// every item was taken back.
    ///
    /// On the first failure the order is going to stay cancelled, so the items
    /// taken back before it are restored again.
    async fn undo_restores(&self, items: &[OrderItem]) -> bool {
        for (undone, item) in items.iter().rev().enumerate() {
            let Err(e) = self.inventory.reserve(item.album_id, item.quantity).await else {
                continue;
            };
            metrics::counter!("stock_compensation_failures_total").increment(1);
            tracing::error!(
                album_id = %item.album_id,
                quantity = item.quantity,
                error = %e,
                "failed to take back restored stock"
            );

            for item in items.iter().rev().take(undone) {
                if let Err(e) = self.inventory.restore(item.album_id, item.quantity).await {
                    metrics::counter!("stock_compensation_failures_total").increment(1);
                    tracing::error!(
                        album_id = %item.album_id,
                        quantity = item.quantity,
                        error = %e,
                        "failed to return stock of cancelled order"
                    );
                }
            }
            return false;
        }
        true
    }

    async fn revert_status(&self, claimed: Order, previous: OrderStatus) {
        let order_id = claimed.id;
        let expected = claimed.version;
        let reverted = Order {
            status: previous,
            updated_at: Utc::now(),
            ..claimed
        };

        if let Err(e) = self.ledger.update_order(reverted, expected).await {
            metrics::counter!("stock_compensation_failures_total").increment(1);
            tracing::error!(%order_id, %previous, error = %e, "failed to revert cancelled status");
        }
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.ledger
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found(EntityKind::Order, order_id))
    }

    fn exhausted(&self, order_id: OrderId) -> OrderError {
        OrderError::ConcurrencyExhausted {
            entity: EntityKind::Order,
            id: order_id.to_string(),
            attempts: self.max_attempts,
        }
    }
}

fn record_conflict(order_id: OrderId, attempt: u32, error: &StoreError) {
    tracing::debug!(%order_id, attempt, %error, "order update lost a race, retrying");
}
