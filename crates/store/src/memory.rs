use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    Album, AlbumId, Customer, CustomerId, Money, Order, OrderId, OrderItem, OrderItemId,
    OrderStatus, Result, StoreError,
    store::{CatalogStore, CustomerDirectory, OrderLedger},
};

/// Order header row; items live in their own table.
#[derive(Debug, Clone)]
struct OrderRow {
    id: OrderId,
    customer_id: CustomerId,
    status: OrderStatus,
    total_amount: Money,
    order_date: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
    item_ids: Vec<OrderItemId>,
    seq: u64,
}

/// Failures to inject into the next store calls.
#[derive(Debug, Default)]
struct Faults {
    stock_conflicts: u32,
    unavailable_albums: HashSet<AlbumId>,
    fail_order_create: bool,
    fail_order_update: bool,
}

#[derive(Debug, Default)]
struct State {
    albums: HashMap<AlbumId, Album>,
    customers: HashMap<CustomerId, Customer>,
    orders: HashMap<OrderId, OrderRow>,
    items: HashMap<OrderItemId, OrderItem>,
    next_seq: u64,
    faults: Faults,
}

impl State {
    fn assemble(&self, row: &OrderRow) -> Order {
        Order {
            id: row.id,
            customer_id: row.customer_id,
            status: row.status,
            total_amount: row.total_amount,
            order_date: row.order_date,
            updated_at: row.updated_at,
            version: row.version,
            items: row
                .item_ids
                .iter()
                .filter_map(|id| self.items.get(id).cloned())
                .collect(),
        }
    }
}

/// In-memory catalog, customer directory and order ledger.
///
/// Clones share the same underlying tables. Besides the store interfaces it
/// offers seeding helpers and fault injection for exercising failure paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an album.
    pub async fn insert_album(&self, album: Album) {
        self.state.write().await.albums.insert(album.id, album);
    }

    /// Inserts or replaces a customer.
    pub async fn insert_customer(&self, customer: Customer) {
        self.state
            .write()
            .await
            .customers
            .insert(customer.id, customer);
    }

    /// Changes an album's price, as the catalog would.
    pub async fn set_album_price(&self, id: AlbumId, price: Money) -> Result<()> {
        let mut state = self.state.write().await;
        let album = state
            .albums
            .get_mut(&id)
            .ok_or(StoreError::AlbumNotFound(id))?;
        album.price = price;
        Ok(())
    }

    /// Returns the current stock of an album.
    pub async fn stock_of(&self, id: AlbumId) -> Option<u32> {
        self.state
            .read()
            .await
            .albums
            .get(&id)
            .map(|album| album.stock_quantity)
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of order items stored.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// Makes the next `count` stock updates fail with a conflict without
    /// writing, as if another writer had raced them.
    pub async fn inject_stock_conflicts(&self, count: u32) {
        self.state.write().await.faults.stock_conflicts = count;
    }

    /// Makes every stock update of the album fail until cleared.
    pub async fn set_album_unavailable(&self, id: AlbumId, unavailable: bool) {
        let mut state = self.state.write().await;
        if unavailable {
            state.faults.unavailable_albums.insert(id);
        } else {
            state.faults.unavailable_albums.remove(&id);
        }
    }

    /// Configures order creation to fail.
    pub async fn set_fail_on_create_order(&self, fail: bool) {
        self.state.write().await.faults.fail_order_create = fail;
    }

    /// Configures order updates to fail.
    pub async fn set_fail_on_update_order(&self, fail: bool) {
        self.state.write().await.faults.fail_order_update = fail;
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_album(&self, id: AlbumId) -> Result<Option<Album>> {
        Ok(self.state.read().await.albums.get(&id).cloned())
    }

    async fn update_stock(&self, id: AlbumId, expected: u32, new_quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;

        if state.faults.unavailable_albums.contains(&id) {
            return Err(StoreError::Unavailable(format!(
                "stock updates for album {id} are disabled"
            )));
        }

        let actual = state
            .albums
            .get(&id)
            .map(|album| album.stock_quantity)
            .ok_or(StoreError::AlbumNotFound(id))?;

        if state.faults.stock_conflicts > 0 {
            state.faults.stock_conflicts -= 1;
            return Err(StoreError::StockConflict {
                album_id: id,
                expected,
                actual,
            });
        }

        if actual != expected {
            return Err(StoreError::StockConflict {
                album_id: id,
                expected,
                actual,
            });
        }

        if let Some(album) = state.albums.get_mut(&id) {
            album.stock_quantity = new_quantity;
        }
        Ok(())
    }

    async fn increment_stock(&self, id: AlbumId, quantity: u32) -> Result<u32> {
        let mut state = self.state.write().await;

        if state.faults.unavailable_albums.contains(&id) {
            return Err(StoreError::Unavailable(format!(
                "stock updates for album {id} are disabled"
            )));
        }

        let album = state
            .albums
            .get_mut(&id)
            .ok_or(StoreError::AlbumNotFound(id))?;
        let stock = album.stock_quantity;
        album.stock_quantity = stock.checked_add(quantity).ok_or(StoreError::StockOverflow {
            album_id: id,
            stock,
            quantity,
        })?;
        Ok(album.stock_quantity)
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }
}

#[async_trait]
impl OrderLedger for InMemoryStore {
    async fn create_order(&self, order: Order) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.faults.fail_order_create {
            return Err(StoreError::Unavailable("order ledger rejected write".to_string()));
        }
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }

        state.next_seq += 1;
        let row = OrderRow {
            id: order.id,
            customer_id: order.customer_id,
            status: order.status,
            total_amount: order.total_amount,
            order_date: order.order_date,
            updated_at: order.updated_at,
            version: order.version,
            item_ids: order.items.iter().map(|item| item.id).collect(),
            seq: state.next_seq,
        };
        for item in &order.items {
            state.items.insert(item.id, item.clone());
        }
        state.orders.insert(order.id, row);

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).map(|row| state.assemble(row)))
    }

    async fn list_orders_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state
            .orders
            .values()
            .filter(|row| row.customer_id == customer_id)
            .collect();
        rows.sort_by_key(|row| row.seq);
        Ok(rows.into_iter().map(|row| state.assemble(row)).collect())
    }

    async fn update_order(&self, order: Order, expected_version: i64) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.faults.fail_order_update {
            return Err(StoreError::Unavailable("order ledger rejected update".to_string()));
        }

        let row = state
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::OrderNotFound(order.id))?;

        if row.version != expected_version {
            return Err(StoreError::OrderConflict {
                order_id: order.id,
                expected: expected_version,
                actual: row.version,
            });
        }

        row.status = order.status;
        row.updated_at = order.updated_at;
        row.version += 1;

        let row = row.clone();
        Ok(state.assemble(&row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order(customer_id: CustomerId, album_id: AlbumId) -> Order {
        let order_id = OrderId::new();
        let now = Utc::now();
        let item = OrderItem {
            id: OrderItemId::new(),
            order_id,
            album_id,
            quantity: 2,
            unit_price: Money::from_cents(1999),
            subtotal: Money::from_cents(3998),
        };
        Order {
            id: order_id,
            customer_id,
            status: OrderStatus::Pending,
            total_amount: Money::from_cents(3998),
            order_date: now,
            updated_at: now,
            version: 1,
            items: vec![item],
        }
    }

    #[tokio::test]
    async fn get_missing_album_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get_album(AlbumId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_stock_with_matching_expectation() {
        let store = InMemoryStore::new();
        let album = Album::new("Kind of Blue", Money::from_cents(1999), 10);
        let album_id = album.id;
        store.insert_album(album).await;

        store.update_stock(album_id, 10, 8).await.unwrap();
        assert_eq!(store.stock_of(album_id).await, Some(8));
    }

    #[tokio::test]
    async fn update_stock_conflict_on_stale_expectation() {
        let store = InMemoryStore::new();
        let album = Album::new("Kind of Blue", Money::from_cents(1999), 10);
        let album_id = album.id;
        store.insert_album(album).await;

        let result = store.update_stock(album_id, 9, 7).await;
        assert!(matches!(
            result,
            Err(StoreError::StockConflict {
                expected: 9,
                actual: 10,
                ..
            })
        ));
        assert_eq!(store.stock_of(album_id).await, Some(10));
    }

    #[tokio::test]
    async fn update_stock_on_missing_album() {
        let store = InMemoryStore::new();
        let result = store.update_stock(AlbumId::new(), 1, 0).await;
        assert!(matches!(result, Err(StoreError::AlbumNotFound(_))));
    }

    #[tokio::test]
    async fn injected_conflicts_are_consumed() {
        let store = InMemoryStore::new();
        let album = Album::new("Blue Train", Money::from_cents(1500), 5);
        let album_id = album.id;
        store.insert_album(album).await;
        store.inject_stock_conflicts(1).await;

        let first = store.update_stock(album_id, 5, 4).await;
        assert!(first.as_ref().is_err_and(StoreError::is_conflict));
        assert_eq!(store.stock_of(album_id).await, Some(5));

        store.update_stock(album_id, 5, 4).await.unwrap();
        assert_eq!(store.stock_of(album_id).await, Some(4));
    }

    #[tokio::test]
    async fn increment_stock_ignores_injected_conflicts() {
        let store = InMemoryStore::new();
        let album = Album::new("Giant Steps", Money::from_cents(1700), 2);
        let album_id = album.id;
        store.insert_album(album).await;
        store.inject_stock_conflicts(5).await;

        assert_eq!(store.increment_stock(album_id, 3).await.unwrap(), 5);
        assert_eq!(store.stock_of(album_id).await, Some(5));
    }

    #[tokio::test]
    async fn increment_stock_overflow_writes_nothing() {
        let store = InMemoryStore::new();
        let album = Album::new("Ascension", Money::from_cents(1700), u32::MAX - 1);
        let album_id = album.id;
        store.insert_album(album).await;

        let result = store.increment_stock(album_id, 2).await;
        assert!(matches!(result, Err(StoreError::StockOverflow { quantity: 2, .. })));
        assert_eq!(store.stock_of(album_id).await, Some(u32::MAX - 1));

        let missing = store.increment_stock(AlbumId::new(), 1).await;
        assert!(matches!(missing, Err(StoreError::AlbumNotFound(_))));
    }

    #[tokio::test]
    async fn create_and_get_order_with_items() {
        let store = InMemoryStore::new();
        let order = test_order(CustomerId::new(), AlbumId::new());
        let order_id = order.id;

        store.create_order(order.clone()).await.unwrap();

        let loaded = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
        assert_eq!(store.item_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_order_is_rejected() {
        let store = InMemoryStore::new();
        let order = test_order(CustomerId::new(), AlbumId::new());

        store.create_order(order.clone()).await.unwrap();
        let result = store.create_order(order).await;
        assert!(matches!(result, Err(StoreError::DuplicateOrder(_))));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn failed_create_stores_nothing() {
        let store = InMemoryStore::new();
        store.set_fail_on_create_order(true).await;

        let result = store
            .create_order(test_order(CustomerId::new(), AlbumId::new()))
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.item_count().await, 0);
    }

    #[tokio::test]
    async fn list_orders_by_customer_in_creation_order() {
        let store = InMemoryStore::new();
        let customer_id = CustomerId::new();
        let first = test_order(customer_id, AlbumId::new());
        let second = test_order(customer_id, AlbumId::new());
        let other = test_order(CustomerId::new(), AlbumId::new());

        store.create_order(first.clone()).await.unwrap();
        store.create_order(other).await.unwrap();
        store.create_order(second.clone()).await.unwrap();

        let orders = store.list_orders_by_customer(customer_id).await.unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn update_order_bumps_version() {
        let store = InMemoryStore::new();
        let order = store
            .create_order(test_order(CustomerId::new(), AlbumId::new()))
            .await
            .unwrap();

        let mut changed = order.clone();
        changed.status = OrderStatus::Shipped;
        let updated = store.update_order(changed, order.version).await.unwrap();

        assert_eq!(updated.status, OrderStatus::Shipped);
        assert_eq!(updated.version, order.version + 1);
        assert_eq!(updated.items, order.items);
    }

    #[tokio::test]
    async fn update_order_conflict_on_stale_version() {
        let store = InMemoryStore::new();
        let order = store
            .create_order(test_order(CustomerId::new(), AlbumId::new()))
            .await
            .unwrap();

        let mut changed = order.clone();
        changed.status = OrderStatus::Processing;
        store.update_order(changed.clone(), order.version).await.unwrap();

        let result = store.update_order(changed, order.version).await;
        assert!(matches!(result, Err(StoreError::OrderConflict { .. })));
    }

    #[tokio::test]
    async fn update_missing_order() {
        let store = InMemoryStore::new();
        let order = test_order(CustomerId::new(), AlbumId::new());
        let result = store.update_order(order, 1).await;
        assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
    }
}
