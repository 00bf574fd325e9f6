//! Integration tests for Mbuli's Feast storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mbuli-integration-tests
//! ```
//!
//! The tests run against the embedded [`MemoryStore`] and a [`FakeResolver`]
//! standing in for the Claude distance lookup, so they need neither a
//! database nor network access.
//!
//! # Test Categories
//!
//! - `checkout_flow` - Session, fee and order placement over the library API
//! - `http_api` - The same flow through the axum router

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use mbuli_core::{CheckoutSessionId, OrderId, OrderStatus, ProductId, StockStatus};
use mbuli_storefront::checkout::CheckoutSession;
use mbuli_storefront::config::DeliveryConfig;
use mbuli_storefront::db::{MemoryStore, RepositoryError, Store, seed};
use mbuli_storefront::delivery::{DistanceResolver, FeeState, ResolveError, RouteQuery};
use mbuli_storefront::models::{CartItem, CartLine, NewOrder, NewProduct, Order, Product};
use mbuli_storefront::state::AppState;

/// Address with a known 10 km route (fee 2 500 TZS).
pub const KARIAKOO: &str = "Kariakoo Market, Dar es Salaam";

/// Address with a known 30 km route (fee capped at 6 000 TZS).
pub const BAGAMOYO_ROAD: &str = "Bagamoyo Road, Bunju, Dar es Salaam";

/// Address no route can be found for.
pub const NOWHERE: &str = "Nowhere Street, Atlantis";

const IDLE_TIMEOUT: Duration = Duration::from_secs(1800);
const FEE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Km(f64),
    Unresolvable,
    /// Fail transiently `failures` times, then return `km`.
    Flaky { failures: u32, km: f64 },
}

/// Distance resolver with a fixed route table.
///
/// Unknown destinations are unresolvable. Every lookup is recorded.
#[derive(Debug, Default)]
pub struct FakeResolver {
    routes: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<String>>,
    latency: Duration,
}

impl FakeResolver {
    /// Resolver that knows [`KARIAKOO`] and [`BAGAMOYO_ROAD`].
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
            .with_route(KARIAKOO, 10.0)
            .with_route(BAGAMOYO_ROAD, 30.0)
            .with_unresolvable(NOWHERE)
    }

    #[must_use]
    pub fn with_route(self, destination: &str, km: f64) -> Self {
        self.set(destination, Outcome::Km(km))
    }

    #[must_use]
    pub fn with_unresolvable(self, destination: &str) -> Self {
        self.set(destination, Outcome::Unresolvable)
    }

    /// The first `failures` lookups for `destination` fail transiently.
    #[must_use]
    pub fn with_flaky_route(self, destination: &str, failures: u32, km: f64) -> Self {
        self.set(destination, Outcome::Flaky { failures, km })
    }

    /// Delay every lookup by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn set(self, destination: &str, outcome: Outcome) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(destination.to_string(), outcome);
        self
    }

    /// Destinations looked up so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_outcome(&self, destination: &str) -> Result<f64, ResolveError> {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(destination) {
            Some(Outcome::Km(km)) => Ok(*km),
            Some(Outcome::Flaky { failures, km }) => {
                if *failures == 0 {
                    Ok(*km)
                } else {
                    *failures -= 1;
                    Err(ResolveError::Transient("upstream timeout".to_string()))
                }
            }
            Some(Outcome::Unresolvable) | None => Err(ResolveError::Unresolvable(format!(
                "no route to {destination}"
            ))),
        }
    }
}

impl DistanceResolver for FakeResolver {
    fn resolve<'a>(&'a self, route: &'a RouteQuery) -> BoxFuture<'a, Result<f64, ResolveError>> {
        self.calls.lock().unwrap().push(route.destination.clone());
        let outcome = self.next_outcome(&route.destination);
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            outcome
        })
    }
}

/// A [`MemoryStore`] whose checkout commit always fails.
///
/// Every other operation goes to the wrapped store, so carts and the
/// catalogue behave normally.
#[derive(Clone)]
pub struct FailingCommitStore {
    inner: MemoryStore,
    error: fn() -> RepositoryError,
}

impl FailingCommitStore {
    #[must_use]
    pub fn new(inner: MemoryStore, error: fn() -> RepositoryError) -> Self {
        Self { inner, error }
    }
}

impl Store for FailingCommitStore {
    fn health_check(&self) -> BoxFuture<'_, Result<(), RepositoryError>> {
        self.inner.health_check()
    }

    fn list_products(
        &self,
        status: Option<StockStatus>,
    ) -> BoxFuture<'_, Result<Vec<Product>, RepositoryError>> {
        self.inner.list_products(status)
    }

    fn get_product(&self, id: ProductId) -> BoxFuture<'_, Result<Option<Product>, RepositoryError>> {
        self.inner.get_product(id)
    }

    fn insert_product(&self, product: NewProduct) -> BoxFuture<'_, Result<Product, RepositoryError>> {
        self.inner.insert_product(product)
    }

    fn get_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<Option<CartItem>, RepositoryError>> {
        self.inner.get_cart_item(cart, product)
    }

    fn put_cart_item(
        &self,
        cart: CheckoutSessionId,
        item: CartItem,
    ) -> BoxFuture<'_, Result<(), RepositoryError>> {
        self.inner.put_cart_item(cart, item)
    }

    fn remove_cart_item(
        &self,
        cart: CheckoutSessionId,
        product: ProductId,
    ) -> BoxFuture<'_, Result<bool, RepositoryError>> {
        self.inner.remove_cart_item(cart, product)
    }

    fn cart_lines(
        &self,
        cart: CheckoutSessionId,
    ) -> BoxFuture<'_, Result<Vec<CartLine>, RepositoryError>> {
        self.inner.cart_lines(cart)
    }

    fn commit_checkout(
        &self,
        _cart: CheckoutSessionId,
        _order: NewOrder,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>> {
        let error = (self.error)();
        Box::pin(async move { Err(error) })
    }

    fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> BoxFuture<'_, Result<Vec<Order>, RepositoryError>> {
        self.inner.list_orders(status)
    }

    fn get_order(&self, id: OrderId) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>> {
        self.inner.get_order(id)
    }

    fn latest_order(&self) -> BoxFuture<'_, Result<Option<Order>, RepositoryError>> {
        self.inner.latest_order()
    }

    fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> BoxFuture<'_, Result<Order, RepositoryError>> {
        self.inner.update_order_status(id, status)
    }
}

/// A store holding the starter catalogue.
///
/// Product IDs follow catalogue order: 1 Whole Chicken (50 units),
/// 2 Chicken Thighs (30), 3 Chicken Wings (0), 4 Chicken Breast (25),
/// 5 Chicken Drumsticks (8), 6 Ground Chicken (40).
#[must_use]
pub fn catalogue_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_products(seed::catalogue()))
}

/// Application state over `store` and `resolver` with default delivery
/// settings (1 s debounce, 3 attempts from 500 ms).
#[must_use]
pub fn app_state<S: Store + 'static>(store: Arc<S>, resolver: Arc<FakeResolver>) -> AppState {
    AppState::with_delivery(&DeliveryConfig::default(), IDLE_TIMEOUT, store, resolver)
}

/// Wait until the session's fee lookup has settled.
///
/// Only meaningful once an address long enough to resolve has been entered.
pub async fn settled_fee(session: &CheckoutSession) -> FeeState {
    let mut states = session.recalculator().subscribe();
    let state = tokio::time::timeout(
        FEE_TIMEOUT,
        states.wait_for(|s| matches!(s, FeeState::Ready { .. } | FeeState::Failed { .. })),
    )
    .await
    .unwrap()
    .unwrap();
    state.clone()
}
