//! Cart operations for a checkout session.
//!
//! Adding a product already in the cart increases its quantity. Setting a
//! quantity of zero or less removes the line. Quantities never exceed the
//! units on hand.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use mbuli_core::{CheckoutSessionId, MoneyError, ProductId};

use crate::db::{RepositoryError, Store};
use crate::models::{CartItem, CartSummary, Product};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("{0} is out of stock")]
    OutOfStock(String),

    #[error("only {available} of {product} available")]
    InsufficientStock { product: String, available: u32 },

    #[error("product {0} is not in the cart")]
    ItemNotFound(ProductId),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("cart total overflow: {0}")]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Cart operations over the store.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn product(&self, id: ProductId) -> Result<Product, CartError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(CartError::ProductNotFound(id))
    }

    fn check_stock(product: &Product, quantity: u32) -> Result<(), CartError> {
        if !product.is_available() {
            return Err(CartError::OutOfStock(product.name.clone()));
        }
        if quantity > product.stock_units {
            return Err(CartError::InsufficientStock {
                product: product.name.clone(),
                available: product.stock_units,
            });
        }
        Ok(())
    }

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity is zero, the product is unknown or
    /// out of stock, or the new quantity exceeds the units on hand.
    #[instrument(skip(self), fields(cart = %cart, product_id = %product_id))]
    pub async fn add_item(
        &self,
        cart: CheckoutSessionId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSummary, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let product = self.product(product_id).await?;
        let item = match self.store.get_cart_item(cart, product_id).await? {
            Some(mut existing) => {
                existing.quantity = existing.quantity.saturating_add(quantity);
                existing
            }
            None => CartItem {
                product_id,
                quantity,
                unit_price: product.price,
                added_at: Utc::now(),
            },
        };
        Self::check_stock(&product, item.quantity)?;

        self.store.put_cart_item(cart, item).await?;
        self.summary(cart).await
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not in the cart or the quantity
    /// exceeds the units on hand.
    #[instrument(skip(self), fields(cart = %cart, product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        cart: CheckoutSessionId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartSummary, CartError> {
        if quantity <= 0 {
            return self.remove_item(cart, product_id).await;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let mut item = self
            .store
            .get_cart_item(cart, product_id)
            .await?
            .ok_or(CartError::ItemNotFound(product_id))?;
        let product = self.product(product_id).await?;
        Self::check_stock(&product, quantity)?;

        item.quantity = quantity;
        self.store.put_cart_item(cart, item).await?;
        self.summary(cart).await
    }

    /// Remove a line. Removing a line that is not there is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn remove_item(
        &self,
        cart: CheckoutSessionId,
        product_id: ProductId,
    ) -> Result<CartSummary, CartError> {
        self.store.remove_cart_item(cart, product_id).await?;
        self.summary(cart).await
    }

    /// Cart lines with item count and subtotal.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the subtotal overflows.
    pub async fn summary(&self, cart: CheckoutSessionId) -> Result<CartSummary, CartError> {
        let lines = self.store.cart_lines(cart).await?;
        Ok(CartSummary::from_lines(lines)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mbuli_core::Tzs;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewProduct;

    fn service() -> CartService {
        let store = MemoryStore::with_products(vec![
            NewProduct {
                name: "Whole Chicken".to_string(),
                description: String::new(),
                price: Tzs::from_shillings(15_000),
                image_url: None,
                stock_units: 5,
            },
            NewProduct {
                name: "Chicken Wings (1kg)".to_string(),
                description: String::new(),
                price: Tzs::from_shillings(12_000),
                image_url: None,
                stock_units: 0,
            },
        ]);
        CartService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_add_existing_increments() {
        let cart = CheckoutSessionId::generate();
        let service = service();

        service.add_item(cart, ProductId::new(1), 1).await.unwrap();
        let summary = service.add_item(cart, ProductId::new(1), 2).await.unwrap();

        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal.as_i64(), 45_000);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes() {
        let cart = CheckoutSessionId::generate();
        let service = service();

        service.add_item(cart, ProductId::new(1), 2).await.unwrap();
        let summary = service.set_quantity(cart, ProductId::new(1), 0).await.unwrap();
        assert!(summary.is_empty());

        service.add_item(cart, ProductId::new(1), 2).await.unwrap();
        let summary = service.set_quantity(cart, ProductId::new(1), -3).await.unwrap();
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn test_cannot_exceed_stock() {
        let cart = CheckoutSessionId::generate();
        let service = service();

        service.add_item(cart, ProductId::new(1), 4).await.unwrap();
        let err = service.add_item(cart, ProductId::new(1), 2).await.unwrap_err();
        assert!(matches!(err, CartError::InsufficientStock { available: 5, .. }));

        let summary = service.summary(cart).await.unwrap();
        assert_eq!(summary.item_count, 4);
    }

    #[tokio::test]
    async fn test_out_of_stock_rejected() {
        let cart = CheckoutSessionId::generate();
        let err = service()
            .add_item(cart, ProductId::new(2), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::OutOfStock(_)));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let cart = CheckoutSessionId::generate();
        let err = service()
            .add_item(cart, ProductId::new(99), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_set_quantity_requires_line() {
        let cart = CheckoutSessionId::generate();
        let err = service()
            .set_quantity(cart, ProductId::new(1), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ItemNotFound(_)));
    }
}
