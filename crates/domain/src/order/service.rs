//! Order service providing the order operations a transport layer exposes.

use std::time::Instant;

use common::{CustomerId, OrderId, OrderStatus};
use store::{CatalogStore, CustomerDirectory, Order, OrderLedger};

use super::assembler::OrderAssembler;
use super::commands::CreateOrder;
use super::status::StatusMachine;
use crate::error::{EntityKind, OrderError, Result};

/// Tuning for the order workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderServiceConfig {
    /// Attempts per conditional write before giving up with
    /// `ConcurrencyExhausted`. Values below 1 are treated as 1.
    pub stock_retry_attempts: u32,
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            stock_retry_attempts: 3,
        }
    }
}

/// Service for placing and managing orders.
///
/// Owns its three collaborators; nothing is looked up globally.
pub struct OrderService<C, D, L>
where
    C: CatalogStore,
    D: CustomerDirectory,
    L: OrderLedger,
{
    catalog: C,
    customers: D,
    ledger: L,
    config: OrderServiceConfig,
}

impl<C, D, L> OrderService<C, D, L>
where
    C: CatalogStore,
    D: CustomerDirectory,
    L: OrderLedger,
{
    /// Creates a new order service with the default configuration.
    pub fn new(catalog: C, customers: D, ledger: L) -> Self {
        Self::with_config(catalog, customers, ledger, OrderServiceConfig::default())
    }

    pub fn with_config(catalog: C, customers: D, ledger: L, config: OrderServiceConfig) -> Self {
        Self {
            catalog,
            customers,
            ledger,
            config,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn customers(&self) -> &D {
        &self.customers
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &OrderServiceConfig {
        &self.config
    }

    fn status_machine(&self) -> StatusMachine<'_, C, L> {
        StatusMachine::new(&self.catalog, &self.ledger, self.config.stock_retry_attempts)
    }

    /// Places an order, reserving stock for every line.
    ///
    /// Either the order is stored and every line's stock is taken, or the
    /// call fails and stock is left as it was.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, lines = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order> {
        let started = Instant::now();
        let assembler = OrderAssembler::new(
            &self.catalog,
            &self.customers,
            &self.ledger,
            self.config.stock_retry_attempts,
        );

        let result = assembler.assemble(cmd).await;
        metrics::histogram!("order_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total_amount,
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("order_create_failures_total", "reason" => e.kind())
                    .increment(1);
                tracing::info!(error = %e, "order rejected");
            }
        }

        result
    }

    /// Loads an order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.ledger
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found(EntityKind::Order, order_id))
    }

    /// Lists a customer's orders, oldest first. Unknown customers have none.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        Ok(self.ledger.list_orders_by_customer(customer_id).await?)
    }

    /// Sets an order's status. Delivered and cancelled orders are locked.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order> {
        let order = self
            .status_machine()
            .update_status(order_id, new_status)
            .await?;

        metrics::counter!("order_status_updates_total").increment(1);
        tracing::info!(%order_id, status = %order.status, "order status updated");
        Ok(order)
    }

    /// Cancels an order and returns its stock. Cancelling twice is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        if self.status_machine().cancel_order(order_id).await? {
            metrics::counter!("orders_cancelled_total").increment(1);
            tracing::info!(%order_id, "order cancelled");
        } else {
            tracing::warn!(%order_id, "order already cancelled, nothing to do");
        }
        Ok(())
    }
}
