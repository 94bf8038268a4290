//! Order commands.

use common::{AlbumId, CustomerId};

use crate::error::{OrderError, Result};

/// A requested `(album, quantity)` pair, before it is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineItem {
    pub album_id: AlbumId,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(album_id: AlbumId, quantity: u32) -> Self {
        Self { album_id, quantity }
    }
}

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The customer placing the order.
    pub customer_id: CustomerId,

    /// Requested lines, resolved in this order.
    pub items: Vec<LineItem>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(customer_id: CustomerId, items: Vec<LineItem>) -> Self {
        Self { customer_id, items }
    }

    /// Creates a command with no lines yet.
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            items: Vec::new(),
        }
    }

    /// Appends a line.
    pub fn with_item(mut self, album_id: AlbumId, quantity: u32) -> Self {
        self.items.push(LineItem::new(album_id, quantity));
        self
    }

    /// Checks the command's shape before anything is read or written.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(OrderError::Validation(
                "Order must contain at least one item".to_string(),
            ));
        }
        if let Some(line) = self.items.iter().find(|line| line.quantity == 0) {
            return Err(OrderError::Validation(format!(
                "Quantity must be at least 1 (album {})",
                line.album_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_line_order() {
        let a = AlbumId::new();
        let b = AlbumId::new();
        let cmd = CreateOrder::for_customer(CustomerId::new())
            .with_item(a, 2)
            .with_item(b, 5);

        assert_eq!(cmd.items, vec![LineItem::new(a, 2), LineItem::new(b, 5)]);
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_empty_order_is_rejected() {
        let cmd = CreateOrder::for_customer(CustomerId::new());
        assert_eq!(
            cmd.validate(),
            Err(OrderError::Validation(
                "Order must contain at least one item".to_string()
            ))
        );
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let cmd = CreateOrder::for_customer(CustomerId::new())
            .with_item(AlbumId::new(), 1)
            .with_item(AlbumId::new(), 0);
        assert!(matches!(cmd.validate(), Err(OrderError::Validation(msg)) if msg.starts_with("Quantity must be at least 1")));
    }
}
