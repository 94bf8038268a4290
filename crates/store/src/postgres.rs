use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Album, AlbumId, Customer, CustomerId, Money, Order, OrderId, OrderItem, OrderItemId,
    OrderStatus, Result, StoreError,
    store::{CatalogStore, CustomerDirectory, OrderLedger},
};

/// PostgreSQL-backed catalog, customer directory and order ledger.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn quantity_from_db(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::CorruptRecord(format!("negative {column}: {value}")))
}

fn quantity_to_db(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::CorruptRecord(format!("quantity out of range: {value}")))
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or replaces an album.
    pub async fn insert_album(&self, album: &Album) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO albums (id, title, price_cents, stock_quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                price_cents = EXCLUDED.price_cents,
                stock_quantity = EXCLUDED.stock_quantity
            "#,
        )
        .bind(album.id.as_uuid())
        .bind(&album.title)
        .bind(album.price.cents())
        .bind(quantity_to_db(album.stock_quantity)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or replaces a customer.
    pub async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.email)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_album(row: PgRow) -> Result<Album> {
        Ok(Album {
            id: AlbumId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_quantity: quantity_from_db(row.try_get("stock_quantity")?, "stock_quantity")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            album_id: AlbumId::from_uuid(row.try_get::<Uuid, _>("album_id")?),
            quantity: quantity_from_db(row.try_get("quantity")?, "quantity")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        })
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            status: status
                .parse::<OrderStatus>()
                .map_err(|e| StoreError::CorruptRecord(e.to_string()))?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            order_date: row.try_get("order_date")?,
            updated_at: row.try_get("updated_at")?,
            version: row.try_get("version")?,
            items,
        })
    }

    /// Loads the items of the given orders, grouped by order and in line order.
    async fn load_items(&self, order_ids: &[Uuid]) -> Result<HashMap<OrderId, Vec<OrderItem>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, album_id, quantity, unit_price_cents, subtotal_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_number ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in &rows {
            let item = Self::row_to_item(row)?;
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn get_album(&self, id: AlbumId) -> Result<Option<Album>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, title, price_cents, stock_quantity
            FROM albums
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_album).transpose()
    }

    async fn update_stock(&self, id: AlbumId, expected: u32, new_quantity: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE albums SET stock_quantity = $3
            WHERE id = $1 AND stock_quantity = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(quantity_to_db(expected)?)
        .bind(quantity_to_db(new_quantity)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let actual: Option<i32> =
            sqlx::query_scalar("SELECT stock_quantity FROM albums WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match actual {
            Some(actual) => Err(StoreError::StockConflict {
                album_id: id,
                expected,
                actual: quantity_from_db(actual, "stock_quantity")?,
            }),
            None => Err(StoreError::AlbumNotFound(id)),
        }
    }

    async fn increment_stock(&self, id: AlbumId, quantity: u32) -> Result<u32> {
        let stock: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE albums SET stock_quantity = stock_quantity + $2
            WHERE id = $1
            RETURNING stock_quantity
            "#,
        )
        .bind(id.as_uuid())
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        match stock {
            Some(stock) => quantity_from_db(stock, "stock_quantity"),
            None => Err(StoreError::AlbumNotFound(id)),
        }
    }
}

#[async_trait]
impl CustomerDirectory for PostgresStore {
    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, email
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Customer {
                id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
                email: row.try_get("email")?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderLedger for PostgresStore {
    async fn create_order(&self, order: Order) -> Result<Order> {
        let order_id = order.id;

        // Start a transaction
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, status, total_amount_cents, order_date, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total_amount.cents())
        .bind(order.order_date)
        .bind(order.updated_at)
        .bind(order.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::DuplicateOrder(order_id);
            }
            StoreError::Database(e)
        })?;

        for (line_number, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, album_id, line_number, quantity, unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order_id.as_uuid())
            .bind(item.album_id.as_uuid())
            .bind(line_number as i32)
            .bind(quantity_to_db(item.quantity)?)
            .bind(item.unit_price.cents())
            .bind(item.subtotal.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(%order_id, items = order.items.len(), "order persisted");
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, customer_id, status, total_amount_cents, order_date, updated_at, version
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut items = self.load_items(&[id.as_uuid()]).await?;
        let order = Self::row_to_order(&row, items.remove(&id).unwrap_or_default())?;
        Ok(Some(order))
    }

    async fn list_orders_by_customer(&self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, customer_id, status, total_amount_cents, order_date, updated_at, version
            FROM orders
            WHERE customer_id = $1
            ORDER BY order_date ASC, id ASC
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let order_ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut items = self.load_items(&order_ids).await?;

        rows.iter()
            .zip(order_ids)
            .map(|(row, id)| {
                let order_items = items.remove(&OrderId::from_uuid(id)).unwrap_or_default();
                Self::row_to_order(row, order_items)
            })
            .collect()
    }

    async fn update_order(&self, order: Order, expected_version: i64) -> Result<Order> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = $2, updated_at = $3, version = version + 1
            WHERE id = $1 AND version = $4
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Order {
                version: expected_version + 1,
                ..order
            });
        }

        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(order.id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match actual {
            Some(actual) => Err(StoreError::OrderConflict {
                order_id: order.id,
                expected: expected_version,
                actual,
            }),
            None => Err(StoreError::OrderNotFound(order.id)),
        }
    }
}
