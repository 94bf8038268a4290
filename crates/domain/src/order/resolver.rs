//! Pricing and stock reservation for a single requested line.

use common::{AlbumId, Money};
use store::CatalogStore;

use super::inventory::Inventory;
use crate::error::{OrderError, Result};

/// A requested line after it has been priced and its stock reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub album_id: AlbumId,
    pub quantity: u32,
    /// Album price at the moment the stock was reserved.
    pub unit_price: Money,
    pub subtotal: Money,
    /// Units removed from the album's stock by this line.
    pub reserved: u32,
}

/// Turns one `(album, quantity)` pair into a priced, stock-checked line.
///
/// The stock decrement is applied as soon as the line passes validation; the
/// caller owns undoing it if the enclosing order fails.
pub struct LineResolver<'a, C: CatalogStore> {
    inventory: Inventory<'a, C>,
}

impl<'a, C: CatalogStore> LineResolver<'a, C> {
    pub fn new(catalog: &'a C, max_attempts: u32) -> Self {
        Self {
            inventory: Inventory::new(catalog, max_attempts),
        }
    }

    /// Prices the line and reserves its stock.
    ///
    /// Fails with `NotFound` if the album is absent and `InsufficientStock`
    /// if it has fewer than `quantity` units. Neither failure writes anything.
    /// A subtotal too large to represent fails with `Validation` after the
    /// reserved units have been returned.
    pub async fn resolve_line(&self, album_id: AlbumId, quantity: u32) -> Result<ResolvedLine> {
        let album = self.inventory.reserve(album_id, quantity).await?;
        let Some(subtotal) = album.price.checked_multiply(quantity) else {
            if let Err(e) = self.inventory.restore(album_id, quantity).await {
                metrics::counter!("stock_compensation_failures_total").increment(1);
                tracing::error!(
                    %album_id,
                    quantity,
                    error = %e,
                    "failed to release reserved stock"
                );
            }
            return Err(OrderError::Validation(format!(
                "Subtotal for album {album_id} is out of range"
            )));
        };

        tracing::debug!(
            %album_id,
            title = %album.title,
            quantity,
            %subtotal,
            "line resolved"
        );

        Ok(ResolvedLine {
            album_id,
            quantity,
            unit_price: album.price,
            subtotal,
            reserved: quantity,
        })
    }

    /// Returns a resolved line's reserved units to the catalog.
    pub async fn release(&self, line: &ResolvedLine) -> Result<()> {
        self.inventory.restore(line.album_id, line.reserved).await
    }
}
