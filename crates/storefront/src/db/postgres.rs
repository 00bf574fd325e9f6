//! `PostgreSQL` implementation of [`Store`].
//!
//! Queries are checked at runtime (`query_as::<_, Row>`) so the crate builds
//! without a live database.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use secrecy::ExposeSecret;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use mbuli_core::{CheckoutSessionId, OrderId, OrderStatus, ProductId, StockStatus, Tzs};

use super::{RepositoryError, Store};
use crate::models::{CartItem, CartLine, NewOrder, NewProduct, Order, OrderLine, Product};

/// Embedded storefront migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, image_url, stock_units, stock_status, created_at";

const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, delivery_address, lines, \
     subtotal, delivery_fee, distance_km, total, status, created_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Tzs,
    image_url: Option<String>,
    stock_units: i32,
    stock_status: StockStatus,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
            stock_units: to_units(row.stock_units)?,
            stock_status: row.stock_status,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: ProductId,
    quantity: i32,
    unit_price: Tzs,
    added_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    product_id: ProductId,
    product_name: String,
    image_url: Option<String>,
    quantity: i32,
    unit_price: Tzs,
    stock_units: i32,
    stock_status: StockStatus,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    customer_name: String,
    customer_phone: String,
    delivery_address: String,
    lines: Json<Vec<OrderLine>>,
    subtotal: Tzs,
    delivery_fee: Tzs,
    distance_km: f64,
    total: Tzs,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            delivery_address: row.delivery_address,
            lines: row.lines.0,
            subtotal: row.subtotal,
            delivery_fee: row.delivery_fee,
            distance_km: row.distance_km,
            total: row.total,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

fn to_units(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative unit count: {value}")))
}

fn to_db_units(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("quantity too large: {value}")))
}

/// `sqlx`-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn decrement_stock(
        tx: &mut Transaction<'_, Postgres>,
        line: &OrderLine,
    ) -> Result<(), RepositoryError> {
        let quantity = to_db_units(line.quantity)?;
        let threshold = to_db_units(StockStatus::LOW_STOCK_THRESHOLD)?;

        // Every expression in SET sees the pre-update row.
        let result = sqlx::query(
            r"
            UPDATE products
            SET stock_units = stock_units - $2,
                stock_status = CASE
                    WHEN stock_units - $2 = 0 THEN 'out-of-stock'::stock_status
                    WHEN stock_units - $2 <= $3 THEN 'low-stock'::stock_status
                    ELSE 'in-stock'::stock_status
                END
            WHERE id = $1 AND stock_units >= $2
            ",
        )
        .bind(line.product_id)
        .bind(quantity)
        .bind(threshold)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "insufficient stock for {}",
                line.product_name
            )));
        }
        Ok(())
    }
}

impl Store for PgStore {
    fn health_check(&self) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(async move {
            sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
            Ok(())
        })
    }

    fn list_products(
        &self,
        status: Option<StockStatus>,
    ) -> BoxFuture<'_, Result<Vec<Product>, RepositoryError>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, ProductRow>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products \
                 WHERE $1::stock_status IS NULL OR stock_status = $1 \
                 ORDER BY created_at, id"
            ))
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter().map(Product::try_from).collect()
        })
    }

    fn get_product(&self, id: ProductId) -> BoxFuture<'_, Result<Option<Product>, RepositoryError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, ProductRow>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            row.map(Product::try_from).transpose()
        })
    }

    fn insert_product(&self, product: NewProduct) -> BoxFuture<'_, Result<Product, RepositoryError>> {
        Box::pin(async move {
            let stock_status = product.stock_status();
            let row = sqlx::query_as::<_, ProductRow>(&format!(
                "INSERT INTO products (name, description, price, image_url, stock_units, stock_status) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 RETURNING {PRODUCT_COLUMNS}"
            ))
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price)
            .bind(&product.image_url)
            .bind(to_db_units(product.stock_units)?)
            .bind(stock_status)
            .fetch_one(&self.pool)
            .await?;

            Product::try_from(row)
        })
    }

    fn get_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<Option<CartItem>, RepositoryError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, CartItemRow>(
                "SELECT product_id, quantity, unit_price, added_at FROM cart_items \
                 WHERE session_id = $1 AND product_id = $2",
            )
            .bind(cart.as_uuid())
            .bind(product)
            .fetch_optional(&self.pool)
            .await?;

            row.map(|r| {
                Ok(CartItem {
                    product_id: r.product_id,
                    quantity: to_units(r.quantity)?,
                    unit_price: r.unit_price,
                    added_at: r.added_at,
                })
            })
            .transpose()
        })
    }

    fn put_cart_item(
        &self,
        cart: CheckoutSessionId,
        item: CartItem,
    ) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO cart_items (session_id, product_id, quantity, unit_price, added_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (session_id, product_id)
                DO UPDATE SET quantity = EXCLUDED.quantity, unit_price = EXCLUDED.unit_price
                ",
            )
            .bind(cart.as_uuid())
            .bind(item.product_id)
            .bind(to_db_units(item.quantity)?)
            .bind(item.unit_price)
            .bind(item.added_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::NotFound;
                }
                RepositoryError::Database(e)
            })?;
            Ok(())
        })
    }

    fn remove_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<bool, RepositoryError>> {
        Box::pin(async move {
            let result =
                sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2")
                    .bind(cart.as_uuid())
                    .bind(product)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn cart_lines(
        &self,
        cart: CheckoutSessionId,
    ) -> BoxFuture<'_, Result<Vec<CartLine>, RepositoryError>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, CartLineRow>(
                r"
                SELECT c.product_id, p.name AS product_name, p.image_url, c.quantity,
                       c.unit_price, p.stock_units, p.stock_status
                FROM cart_items c
                JOIN products p ON p.id = c.product_id
                WHERE c.session_id = $1
                ORDER BY c.added_at, c.product_id
                ",
            )
            .bind(cart.as_uuid())
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter()
                .map(|r| {
                    Ok(CartLine {
                        product_id: r.product_id,
                        product_name: r.product_name,
                        image_url: r.image_url,
                        quantity: to_units(r.quantity)?,
                        unit_price: r.unit_price,
                        stock_units: to_units(r.stock_units)?,
                        stock_status: r.stock_status,
                    })
                })
                .collect()
        })
    }

    fn commit_checkout(
        &self,
        cart: CheckoutSessionId,
        order: NewOrder,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>> {
        Box::pin(async move {
            // Dropping the transaction on an early return rolls it back.
            let mut tx = self.pool.begin().await?;

            for line in &order.lines {
                Self::decrement_stock(&mut tx, line).await?;
            }

            let row = sqlx::query_as::<_, OrderRow>(&format!(
                "INSERT INTO orders (customer_name, customer_phone, delivery_address, lines, \
                 subtotal, delivery_fee, distance_km, total) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING {ORDER_COLUMNS}"
            ))
            .bind(&order.customer.name)
            .bind(&order.customer.phone)
            .bind(&order.customer.address)
            .bind(Json(&order.lines))
            .bind(order.subtotal)
            .bind(order.delivery_fee)
            .bind(order.distance_km)
            .bind(order.total)
            .fetch_one(&mut *tx)
            .await?;

            let ordered: Vec<i64> = order.lines.iter().map(|l| l.product_id.as_i64()).collect();
            sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = ANY($2)")
                .bind(cart.as_uuid())
                .bind(&ordered)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(Order::from(row))
        })
    }

    fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> BoxFuture<'_, Result<Vec<Order>, RepositoryError>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders \
                 WHERE $1::order_status IS NULL OR status = $1 \
                 ORDER BY created_at DESC, id DESC"
            ))
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

            Ok(rows.into_iter().map(Order::from).collect())
        })
    }

    fn get_order(&self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(Order::from))
        })
    }

    fn latest_order(&self) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT 1"
            ))
            .fetch_optional(&self.pool)
            .await?;

            Ok(row.map(Order::from))
        })
    }

    fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await?;

            let current: Option<OrderStatus> =
                sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let current = current.ok_or(RepositoryError::NotFound)?;

            if !current.can_transition_to(status) {
                return Err(RepositoryError::Conflict(format!(
                    "cannot move order from {current} to {status}"
                )));
            }

            let row = sqlx::query_as::<_, OrderRow>(&format!(
                "UPDATE orders SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
            ))
            .bind(id)
            .bind(status)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(Order::from(row))
        })
    }
}
