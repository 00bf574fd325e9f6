//! Shared order state for the admin and delivery views.
//!
//! Checkout publishes placed orders here; dashboards read the latest order,
//! list orders, or subscribe to a stream of [`OrderEvent`]s instead of
//! polling the store.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::instrument;

use mbuli_core::{OrderId, OrderStatus};

use crate::db::{RepositoryError, Store};
use crate::models::Order;

const EVENT_CAPACITY: usize = 64;

/// A change to the order book.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order: Order },
    StatusChanged { order: Order },
}

impl OrderEvent {
    /// SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "order_placed",
            Self::StatusChanged { .. } => "order_status_changed",
        }
    }

    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Placed { order } | Self::StatusChanged { order } => order,
        }
    }
}

/// Order book shared between checkout and the dashboards.
#[derive(Clone)]
pub struct OrderHub {
    store: Arc<dyn Store>,
    latest: Arc<RwLock<Option<Order>>>,
    events: broadcast::Sender<OrderEvent>,
}

impl OrderHub {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            latest: Arc::new(RwLock::new(None)),
            events,
        }
    }

    /// Record a freshly placed order as the latest and tell subscribers.
    pub fn publish_placed(&self, order: &Order) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(order.clone());
        // No subscribers is fine.
        let _ = self.events.send(OrderEvent::Placed {
            order: order.clone(),
        });
    }

    /// Subscribe to order events. Slow receivers may observe `Lagged`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.events.subscribe()
    }

    /// The most recently placed order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store lookup fails.
    pub async fn latest_order(&self) -> Result<Option<Order>, RepositoryError> {
        let cached = self
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match cached {
            Some(order) => Ok(Some(order)),
            None => {
                let order = self.store.latest_order().await?;
                if let Some(ref order) = order {
                    self.latest
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .get_or_insert_with(|| order.clone());
                }
                Ok(order)
            }
        }
    }

    /// Orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store lookup fails.
    pub async fn orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        self.store.list_orders(status).await
    }

    /// Orders still awaiting delivery (pending or processing).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store lookup fails.
    pub async fn open_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = self.store.list_orders(None).await?;
        orders.retain(|o| o.status.is_open());
        Ok(orders)
    }

    /// Get one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store lookup fails.
    pub async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.store.get_order(id).await
    }

    /// Advance an order's status and tell subscribers.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict` from
    /// the store.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let order = self.store.update_order_status(id, status).await?;

        {
            let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = latest.as_mut().filter(|cached| cached.id == order.id) {
                cached.clone_from(&order);
            }
        }

        tracing::info!("Order status updated");
        let _ = self.events.send(OrderEvent::StatusChanged {
            order: order.clone(),
        });
        Ok(order)
    }
}
