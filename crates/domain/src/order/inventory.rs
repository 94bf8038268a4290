//! Stock reservation and restoration against the catalog.

use common::AlbumId;
use store::{Album, CatalogStore, StoreError};

use crate::error::{EntityKind, OrderError, Result};

/// Applies stock changes to the catalog.
///
/// A reservation is a read followed by a compare-and-set keyed on the quantity
/// just read. A lost race re-reads and tries again, up to `max_attempts`.
/// Restores are plain increments.
pub struct Inventory<'a, C: CatalogStore> {
    catalog: &'a C,
    max_attempts: u32,
}

impl<'a, C: CatalogStore> Inventory<'a, C> {
    pub fn new(catalog: &'a C, max_attempts: u32) -> Self {
        Self {
            catalog,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Removes `quantity` units from the album's stock.
    ///
    /// Returns the album as read by the winning attempt, so callers price the
    /// line with the same snapshot the stock check used.
    pub async fn reserve(&self, album_id: AlbumId, quantity: u32) -> Result<Album> {
        for attempt in 1..=self.max_attempts {
            let album = self.load(album_id).await?;

            if album.stock_quantity < quantity {
                return Err(OrderError::InsufficientStock {
                    album_id,
                    available: album.stock_quantity,
                    requested: quantity,
                });
            }

            let remaining = album.stock_quantity - quantity;
            match self
                .catalog
                .update_stock(album_id, album.stock_quantity, remaining)
                .await
            {
                Ok(()) => return Ok(album),
                Err(e) if e.is_conflict() => self.record_conflict(album_id, attempt, &e),
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.exhausted(album_id))
    }

    /// Returns `quantity` units to the album's stock.
    ///
    /// Goes through the catalog's unconditional increment, since no stock
    /// level can refuse a restore. Conflicts do not count against
    /// `max_attempts`; the restore repeats until the units are back.
    pub async fn restore(&self, album_id: AlbumId, quantity: u32) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match self.catalog.increment_stock(album_id, quantity).await {
                Ok(stock) => {
                    tracing::debug!(%album_id, quantity, stock, "stock restored");
                    return Ok(());
                }
                Err(e) if e.is_conflict() => self.record_conflict(album_id, attempt, &e),
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn load(&self, album_id: AlbumId) -> Result<Album> {
        self.catalog
            .get_album(album_id)
            .await?
            .ok_or_else(|| OrderError::not_found(EntityKind::Album, album_id))
    }

    fn record_conflict(&self, album_id: AlbumId, attempt: u32, error: &StoreError) {
        metrics::counter!("stock_update_conflicts_total").increment(1);
        tracing::debug!(%album_id, attempt, %error, "stock update lost a race, retrying");
    }

    fn exhausted(&self, album_id: AlbumId) -> OrderError {
        OrderError::ConcurrencyExhausted {
            entity: EntityKind::Album,
            id: album_id.to_string(),
            attempts: self.max_attempts,
        }
    }
}
