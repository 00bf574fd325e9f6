//! Embedded in-process store.
//!
//! Holds every collection behind one async mutex, so each trait method is a
//! single critical section. `commit_checkout` checks stock for every line
//! before it writes anything.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use mbuli_core::{CheckoutSessionId, OrderId, OrderStatus, ProductId, StockStatus};

use super::{RepositoryError, Store};
use crate::models::{CartItem, CartLine, NewOrder, NewProduct, Order, Product};

/// In-memory implementation of [`Store`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    products: Vec<Product>,
    carts: HashMap<CheckoutSessionId, Vec<CartItem>>,
    orders: Vec<Order>,
    next_product_id: i64,
    next_order_id: i64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with products.
    #[must_use]
    pub fn with_products(products: Vec<NewProduct>) -> Self {
        let mut inner = MemoryInner::default();
        for product in products {
            inner.insert_product(product);
        }
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }
}

impl MemoryInner {
    fn insert_product(&mut self, product: NewProduct) -> Product {
        self.next_product_id += 1;
        let stock_status = product.stock_status();
        let product = Product {
            id: ProductId::new(self.next_product_id),
            name: product.name,
            description: product.description,
            price: product.price,
            image_url: product.image_url,
            stock_units: product.stock_units,
            stock_status,
            created_at: Utc::now(),
        };
        self.products.push(product.clone());
        product
    }

    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

impl Store for MemoryStore {
    fn health_check(&self) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(async { Ok(()) })
    }

    fn list_products(
        &self,
        status: Option<StockStatus>,
    ) -> BoxFuture<'_, Result<Vec<Product>, RepositoryError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner
                .products
                .iter()
                .filter(|p| status.is_none_or(|s| p.stock_status == s))
                .cloned()
                .collect())
        })
    }

    fn get_product(&self, id: ProductId) -> BoxFuture<'_, Result<Option<Product>, RepositoryError>> {
        Box::pin(async move { Ok(self.inner.lock().await.product(id).cloned()) })
    }

    fn insert_product(&self, product: NewProduct) -> BoxFuture<'_, Result<Product, RepositoryError>> {
        Box::pin(async move { Ok(self.inner.lock().await.insert_product(product)) })
    }

    fn get_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<Option<CartItem>, RepositoryError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner
                .carts
                .get(&cart)
                .and_then(|items| items.iter().find(|i| i.product_id == product))
                .cloned())
        })
    }

    fn put_cart_item(
        &self,
        cart: CheckoutSessionId,
        item: CartItem,
    ) -> BoxFuture<'_, Result<(), RepositoryError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            if inner.product(item.product_id).is_none() {
                return Err(RepositoryError::NotFound);
            }
            let items = inner.carts.entry(cart).or_default();
            match items.iter_mut().find(|i| i.product_id == item.product_id) {
                Some(existing) => *existing = item,
                None => items.push(item),
            }
            Ok(())
        })
    }

    fn remove_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<bool, RepositoryError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            let Some(items) = inner.carts.get_mut(&cart) else {
                return Ok(false);
            };
            let before = items.len();
            items.retain(|i| i.product_id != product);
            Ok(items.len() != before)
        })
    }

    fn cart_lines(
        &self,
        cart: CheckoutSessionId,
    ) -> BoxFuture<'_, Result<Vec<CartLine>, RepositoryError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            let Some(items) = inner.carts.get(&cart) else {
                return Ok(Vec::new());
            };
            Ok(items
                .iter()
                .filter_map(|item| {
                    inner.product(item.product_id).map(|product| CartLine {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        image_url: product.image_url.clone(),
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                        stock_units: product.stock_units,
                        stock_status: product.stock_status,
                    })
                })
                .collect())
        })
    }

    fn commit_checkout(
        &self,
        cart: CheckoutSessionId,
        order: NewOrder,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;

            // Validate every line before touching anything.
            for line in &order.lines {
                let product = inner
                    .product(line.product_id)
                    .ok_or(RepositoryError::NotFound)?;
                if product.stock_units < line.quantity {
                    return Err(RepositoryError::Conflict(format!(
                        "insufficient stock for {}",
                        product.name
                    )));
                }
            }

            for line in &order.lines {
                if let Some(product) = inner.products.iter_mut().find(|p| p.id == line.product_id)
                {
                    product.stock_units = product.stock_units.saturating_sub(line.quantity);
                    product.stock_status = StockStatus::from_units(product.stock_units);
                }
            }

            inner.next_order_id += 1;
            let order = Order::from_new(OrderId::new(inner.next_order_id), order, Utc::now());
            inner.orders.push(order.clone());
            if let Some(items) = inner.carts.get_mut(&cart) {
                items.retain(|item| {
                    !order.lines.iter().any(|l| l.product_id == item.product_id)
                });
                if items.is_empty() {
                    inner.carts.remove(&cart);
                }
            }

            Ok(order)
        })
    }

    fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> BoxFuture<'_, Result<Vec<Order>, RepositoryError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner
                .orders
                .iter()
                .rev()
                .filter(|o| status.is_none_or(|s| o.status == s))
                .cloned()
                .collect())
        })
    }

    fn get_order(&self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(inner.orders.iter().find(|o| o.id == id).cloned())
        })
    }

    fn latest_order(&self) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>> {
        Box::pin(async move { Ok(self.inner.lock().await.orders.last().cloned()) })
    }

    fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            let order = inner
                .orders
                .iter_mut()
                .find(|o| o.id == id)
                .ok_or(RepositoryError::NotFound)?;
            if !order.status.can_transition_to(status) {
                return Err(RepositoryError::Conflict(format!(
                    "cannot move order from {} to {status}",
                    order.status
                )));
            }
            order.status = status;
            Ok(order.clone())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use mbuli_core::Tzs;

    use super::*;
    use crate::models::{CustomerDetails, OrderLine};

    fn product(name: &str, price: i64, units: u32) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price: Tzs::new(price).unwrap(),
            image_url: None,
            stock_units: units,
        }
    }

    fn order_for(product_id: ProductId, quantity: u32) -> NewOrder {
        let subtotal = Tzs::new(15_000 * i64::from(quantity)).unwrap();
        let fee = Tzs::new(2_500).unwrap();
        NewOrder {
            customer: CustomerDetails {
                name: "Asha".to_string(),
                phone: "+255 712 345 678".to_string(),
                address: "123 Mbezi Beach, Dar es Salaam".to_string(),
            },
            lines: vec![OrderLine {
                product_id,
                product_name: "Whole Chicken".to_string(),
                quantity,
                unit_price: Tzs::new(15_000).unwrap(),
            }],
            subtotal,
            delivery_fee: fee,
            distance_km: 10.0,
            total: subtotal.checked_add(fee).unwrap(),
        }
    }

    async fn cart_with(store: &MemoryStore, product_id: ProductId, quantity: u32) -> CheckoutSessionId {
        let cart = CheckoutSessionId::generate();
        store
            .put_cart_item(
                cart,
                CartItem {
                    product_id,
                    quantity,
                    unit_price: Tzs::new(15_000).unwrap(),
                    added_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        cart
    }

    #[tokio::test]
    async fn test_list_products_filters_by_status() {
        let store = MemoryStore::with_products(vec![
            product("Whole Chicken", 15_000, 50),
            product("Chicken Wings", 12_000, 0),
            product("Drumsticks", 16_000, 5),
        ]);

        assert_eq!(store.list_products(None).await.unwrap().len(), 3);
        let out = store
            .list_products(Some(StockStatus::OutOfStock))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Chicken Wings");
        let low = store.list_products(Some(StockStatus::LowStock)).await.unwrap();
        assert_eq!(low[0].name, "Drumsticks");
    }

    #[tokio::test]
    async fn test_put_cart_item_requires_product() {
        let store = MemoryStore::new();
        let err = store
            .put_cart_item(
                CheckoutSessionId::generate(),
                CartItem {
                    product_id: ProductId::new(99),
                    quantity: 1,
                    unit_price: Tzs::ZERO,
                    added_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_commit_checkout_persists_order_and_clears_cart() {
        let store = MemoryStore::with_products(vec![product("Whole Chicken", 15_000, 12)]);
        let id = ProductId::new(1);
        let cart = cart_with(&store, id, 3).await;

        let order = store.commit_checkout(cart, order_for(id, 3)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(store.cart_lines(cart).await.unwrap().is_empty());
        let product = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(product.stock_units, 9);
        assert_eq!(product.stock_status, StockStatus::LowStock);
        assert_eq!(store.latest_order().await.unwrap(), Some(order));
    }

    #[tokio::test]
    async fn test_commit_checkout_insufficient_stock_changes_nothing() {
        let store = MemoryStore::with_products(vec![product("Whole Chicken", 15_000, 2)]);
        let id = ProductId::new(1);
        let cart = cart_with(&store, id, 3).await;

        let err = store.commit_checkout(cart, order_for(id, 3)).await.unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.cart_lines(cart).await.unwrap().len(), 1);
        assert!(store.list_orders(None).await.unwrap().is_empty());
        assert_eq!(store.get_product(id).await.unwrap().unwrap().stock_units, 2);
    }

    #[tokio::test]
    async fn test_commit_checkout_keeps_lines_added_after_read() {
        let store = MemoryStore::with_products(vec![
            product("Whole Chicken", 15_000, 12),
            product("Ground Chicken", 9_000, 40),
        ]);
        let chicken = ProductId::new(1);
        let ground = ProductId::new(2);
        let cart = cart_with(&store, chicken, 2).await;
        store
            .put_cart_item(
                cart,
                CartItem {
                    product_id: ground,
                    quantity: 1,
                    unit_price: Tzs::new(9_000).unwrap(),
                    added_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        store.commit_checkout(cart, order_for(chicken, 2)).await.unwrap();

        let remaining = store.cart_lines(cart).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].product_id, ground);
        assert_eq!(store.get_product(ground).await.unwrap().unwrap().stock_units, 40);
    }

    #[tokio::test]
    async fn test_update_order_status_enforces_transitions() {
        let store = MemoryStore::with_products(vec![product("Whole Chicken", 15_000, 20)]);
        let id = ProductId::new(1);
        let cart = cart_with(&store, id, 1).await;
        let order = store.commit_checkout(cart, order_for(id, 1)).await.unwrap();

        let err = store
            .update_order_status(order.id, OrderStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let updated = store
            .update_order_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);

        let open = store.list_orders(Some(OrderStatus::Processing)).await.unwrap();
        assert_eq!(open.len(), 1);

        let missing = store
            .update_order_status(OrderId::new(404), OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(missing, RepositoryError::NotFound));
    }
}
