//! Persistent store for the storefront.
//!
//! # Collections
//!
//! - `products` - Catalogue, filterable by stock status
//! - `cart_items` - Items keyed by (checkout session, product)
//! - `orders` - Append-only; only the status column is ever updated
//!
//! # Backends
//!
//! - [`MemoryStore`] - Embedded store used when no database URL is configured
//!   and in tests
//! - [`PgStore`] - `PostgreSQL` via `sqlx`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p mbuli-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;
pub mod seed;

use futures::future::BoxFuture;
use thiserror::Error;

use mbuli_core::{CheckoutSessionId, OrderId, OrderStatus, ProductId, StockStatus};

use crate::models::{CartItem, CartLine, NewOrder, NewProduct, Order, Product};

pub use memory::MemoryStore;
pub use postgres::{MIGRATOR, PgStore, create_pool};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., not enough stock, illegal status change).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// The storage operations the storefront needs.
///
/// [`Store::commit_checkout`] is the only multi-collection write: it inserts
/// the order, decrements stock and clears the ordered lines as one unit. If
/// it fails, nothing has changed.
pub trait Store: Send + Sync {
    /// Check that the backend is reachable.
    fn health_check(&self) -> BoxFuture<'_, Result<(), RepositoryError>>;

    /// List products, optionally filtered by stock status, oldest first.
    fn list_products(
        &self,
        status: Option<StockStatus>,
    ) -> BoxFuture<'_, Result<Vec<Product>, RepositoryError>>;

    /// Get a product by ID.
    fn get_product(&self, id: ProductId) -> BoxFuture<'_, Result<Option<Product>, RepositoryError>>;

    /// Add a product to the catalogue.
    fn insert_product(&self, product: NewProduct) -> BoxFuture<'_, Result<Product, RepositoryError>>;

    /// Get one cart item.
    fn get_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<Option<CartItem>, RepositoryError>>;

    /// Insert or replace a cart item.
    fn put_cart_item(
        &self,
        cart: CheckoutSessionId,
        item: CartItem,
    ) -> BoxFuture<'_, Result<(), RepositoryError>>;

    /// Remove a cart item. Returns whether a row was removed.
    fn remove_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<bool, RepositoryError>>;

    /// Cart items joined with product details, in the order they were added.
    fn cart_lines(
        &self,
        cart: CheckoutSessionId,
    ) -> BoxFuture<'_, Result<Vec<CartLine>, RepositoryError>>;

    /// Persist an order, decrement stock for its lines, and remove those
    /// lines from the cart. Lines not in the order stay.
    ///
    /// Returns `RepositoryError::Conflict` if a product no longer has enough
    /// stock. On any error the cart and catalogue are unchanged.
    fn commit_checkout(
        &self,
        cart: CheckoutSessionId,
        order: NewOrder,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>>;

    /// List orders, newest first, optionally filtered by status.
    fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> BoxFuture<'_, Result<Vec<Order>, RepositoryError>>;

    /// Get an order by ID.
    fn get_order(&self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>>;

    /// Most recently created order.
    fn latest_order(&self) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>>;

    /// Move an order to a new status.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown order and
    /// `RepositoryError::Conflict` for a transition the current status does
    /// not allow.
    fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>>;
}
