//! Order assembly with compensation on partial failure.

use chrono::Utc;
use common::{Money, OrderId, OrderItemId, OrderStatus};
use store::{CatalogStore, CustomerDirectory, Order, OrderItem, OrderLedger};

use super::commands::CreateOrder;
use super::resolver::{LineResolver, ResolvedLine};
use crate::error::{EntityKind, OrderError, Result};

/// Builds and persists an order from a validated request.
///
/// Lines are resolved in request order, each reserving its stock immediately.
/// If a later line or the final write fails, every reservation made so far is
/// returned before the error surfaces, so a failed request leaves stock as it
/// found it.
pub struct OrderAssembler<'a, C, D, L>
where
    C: CatalogStore,
    D: CustomerDirectory,
    L: OrderLedger,
{
    resolver: LineResolver<'a, C>,
    customers: &'a D,
    ledger: &'a L,
}

impl<'a, C, D, L> OrderAssembler<'a, C, D, L>
where
    C: CatalogStore,
    D: CustomerDirectory,
    L: OrderLedger,
{
    pub fn new(catalog: &'a C, customers: &'a D, ledger: &'a L, max_attempts: u32) -> Self {
        Self {
            resolver: LineResolver::new(catalog, max_attempts),
            customers,
            ledger,
        }
    }

    pub async fn assemble(&self, cmd: CreateOrder) -> Result<Order> {
        cmd.validate()?;

        self.customers
            .get_customer(cmd.customer_id)
            .await?
            .ok_or_else(|| OrderError::not_found(EntityKind::Customer, cmd.customer_id))?;

        let mut resolved: Vec<ResolvedLine> = Vec::with_capacity(cmd.items.len());
        for line in &cmd.items {
            match self.resolver.resolve_line(line.album_id, line.quantity).await {
                Ok(r) => resolved.push(r),
                Err(e) => {
                    tracing::warn!(
                        album_id = %line.album_id,
                        error = %e,
                        reserved_lines = resolved.len(),
                        "line rejected, releasing earlier reservations"
                    );
                    self.compensate(&resolved).await;
                    return Err(e);
                }
            }
        }

        let Some(total_amount) = Money::checked_sum(resolved.iter().map(|l| l.subtotal)) else {
            tracing::warn!(lines = resolved.len(), "order total out of range, releasing stock");
            self.compensate(&resolved).await;
            return Err(OrderError::Validation("Order total is out of range".to_string()));
        };

        let order = build_order(cmd, &resolved, total_amount);
        let order_id = order.id;

        match self.ledger.create_order(order).await {
            Ok(order) => Ok(order),
            Err(e) => {
                tracing::error!(%order_id, error = %e, "order write failed, releasing stock");
                self.compensate(&resolved).await;
                Err(e.into())
            }
        }
    }

    /// Releases reservations newest first. Failures are logged and counted but
    /// do not replace the error that triggered compensation.
    async fn compensate(&self, lines: &[ResolvedLine]) {
        for line in lines.iter().rev() {
            if let Err(e) = self.resolver.release(line).await {
                metrics::counter!("stock_compensation_failures_total").increment(1);
                tracing::error!(
                    album_id = %line.album_id,
                    quantity = line.reserved,
                    error = %e,
                    "failed to release reserved stock"
                );
            }
        }
    }
}

fn build_order(cmd: CreateOrder, lines: &[ResolvedLine], total_amount: Money) -> Order {
    let order_id = OrderId::new();
    let now = Utc::now();

    let items: Vec<OrderItem> = lines
        .iter()
        .map(|line| OrderItem {
            id: OrderItemId::new(),
            order_id,
            album_id: line.album_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal,
        })
        .collect();

    Order {
        id: order_id,
        customer_id: cmd.customer_id,
        status: OrderStatus::Pending,
        total_amount,
        order_date: now,
        updated_at: now,
        version: 1,
        items,
    }
}
