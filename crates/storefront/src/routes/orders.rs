//! Order route handlers for the admin and delivery dashboards.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::instrument;

use mbuli_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::models::Order;
use crate::state::AppState;

/// Query parameters for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
    /// Only orders still awaiting delivery. Ignored when `status` is set.
    #[serde(default)]
    pub open: bool,
}

/// Status update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// List orders, newest first.
///
/// GET /api/orders
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    let orders = match query.status {
        Some(status) => state.hub().orders(Some(status)).await?,
        None if query.open => state.hub().open_orders().await?,
        None => state.hub().orders(None).await?,
    };
    Ok(Json(orders))
}

/// The most recently placed order.
///
/// GET /api/orders/latest
#[instrument(skip(state))]
pub async fn latest(State(state): State<AppState>) -> Result<Json<Order>> {
    state
        .hub()
        .latest_order()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// Order detail.
///
/// GET /api/orders/{id}
#[instrument(skip(state), fields(order_id = %id))]
pub async fn show(State(state): State<AppState>, Path(id): Path<OrderId>) -> Result<Json<Order>> {
    state
        .hub()
        .order(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// Move an order to a new status.
///
/// PATCH /api/orders/{id}/status
#[instrument(skip(state, request), fields(order_id = %id, status = %request.status))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let order = state.hub().update_status(id, request.status).await?;
    Ok(Json(order))
}

/// Stream order events as they happen.
///
/// GET /api/orders/events
///
/// Each event is named after its kind (`order_placed`,
/// `order_status_changed`) and carries the order as JSON. A subscriber that
/// falls behind skips the events it missed.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut receiver = state.hub().subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let data = serde_json::to_string(event.order()).unwrap_or_default();
                    yield Ok(Event::default().event(event.name()).data(data));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Order event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
