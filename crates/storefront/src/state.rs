//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::checkout::{OrderAssembler, SessionRegistry};
use crate::config::{DeliveryConfig, StorefrontConfig};
use crate::db::Store;
use crate::delivery::{DistanceResolver, FeeEstimator};
use crate::services::{CartService, OrderHub};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the order hub and live checkout sessions.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn Store>,
    cart: CartService,
    hub: OrderHub,
    sessions: SessionRegistry,
}

impl AppState {
    /// Create a new application state from the loaded configuration.
    #[must_use]
    pub fn new(
        config: &StorefrontConfig,
        store: Arc<dyn Store>,
        resolver: Arc<dyn DistanceResolver>,
    ) -> Self {
        Self::with_delivery(&config.delivery, config.session_idle_timeout, store, resolver)
    }

    /// Create application state from the delivery settings alone.
    ///
    /// Used where no full configuration is available, such as tests.
    #[must_use]
    pub fn with_delivery(
        delivery: &DeliveryConfig,
        session_idle_timeout: Duration,
        store: Arc<dyn Store>,
        resolver: Arc<dyn DistanceResolver>,
    ) -> Self {
        let estimator = FeeEstimator::new(resolver)
            .with_pricing(delivery.pricing)
            .with_retry(delivery.retry)
            .with_origin(delivery.origin.clone())
            .with_min_address_len(delivery.min_address_len);

        let hub = OrderHub::new(Arc::clone(&store));
        let assembler = OrderAssembler::new(Arc::clone(&store), hub.clone());
        let sessions = SessionRegistry::new(
            estimator,
            delivery.debounce,
            assembler,
            session_idle_timeout,
        );

        Self {
            inner: Arc::new(AppStateInner {
                cart: CartService::new(Arc::clone(&store)),
                store,
                hub,
                sessions,
            }),
        }
    }

    /// Get a reference to the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get a reference to the order hub.
    #[must_use]
    pub fn hub(&self) -> &OrderHub {
        &self.inner.hub
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }
}
