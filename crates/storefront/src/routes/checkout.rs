//! Checkout session route handlers.
//!
//! Address edits return immediately; the fee is recalculated in the
//! background and shows up in the checkout view once resolved. Toasts raised
//! along the way are collected per session and drained by the client.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use mbuli_core::{CheckoutSessionId, Tzs};

use crate::checkout::{
    CheckoutError, CheckoutPhase, CheckoutSession, SessionSnapshot, ValidationError,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CartSummary, Order};
use crate::services::Notification;
use crate::state::AppState;

/// Look up a live checkout session.
pub(super) async fn live_session(
    state: &AppState,
    id: CheckoutSessionId,
) -> Result<Arc<CheckoutSession>> {
    state
        .sessions()
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound("Checkout session".to_string()))
}

/// Look up a live checkout session that can still change.
///
/// A placed session is closed; its cart can no longer be edited.
pub(super) async fn open_session(
    state: &AppState,
    id: CheckoutSessionId,
) -> Result<Arc<CheckoutSession>> {
    let session = live_session(state, id).await?;
    if session.phase() == CheckoutPhase::Placed {
        return Err(ValidationError::AlreadyPlaced.into());
    }
    Ok(session)
}

/// Contact details request body.
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub phone: String,
}

/// Address edit request body.
#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub address: String,
}

/// Everything the checkout page shows.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    pub cart: CartSummary,
    /// Subtotal plus delivery fee; absent until a fee is known.
    pub total: Option<Tzs>,
}

/// Outcome of an order attempt, with the toasts it raised.
#[derive(Debug, Serialize)]
pub struct PlaceOrderResponse {
    pub order: Option<Order>,
    pub notifications: Vec<Notification>,
}

/// Start a checkout session.
///
/// POST /api/sessions
#[instrument(skip(state))]
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.sessions().create().await;
    (StatusCode::CREATED, Json(session.snapshot()))
}

/// Abandon a session. Its cart is emptied and any fee lookup is dropped.
///
/// DELETE /api/sessions/{id}
#[instrument(skip(state), fields(session = %id))]
pub async fn abandon(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
) -> Result<StatusCode> {
    let session = live_session(&state, id).await?;
    session.recalculator().reset();
    for line in state.cart().summary(id).await?.lines {
        state.cart().remove_item(id, line.product_id).await?;
    }
    state.sessions().remove(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Update name and phone.
///
/// PUT /api/sessions/{id}/contact
#[instrument(skip(state, request), fields(session = %id))]
pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
    Json(request): Json<ContactRequest>,
) -> Result<Json<SessionSnapshot>> {
    let session = live_session(&state, id).await?;
    session.set_contact(&request.name, &request.phone)?;
    Ok(Json(session.snapshot()))
}

/// Record an address edit. The fee follows once typing settles.
///
/// PUT /api/sessions/{id}/address
#[instrument(skip(state, request), fields(session = %id, address_len = request.address.len()))]
pub async fn update_address(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
    Json(request): Json<AddressRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>)> {
    let session = live_session(&state, id).await?;
    session.set_address(&request.address)?;
    Ok((StatusCode::ACCEPTED, Json(session.snapshot())))
}

/// Phase, fee state, cart and total.
///
/// GET /api/sessions/{id}/checkout
#[instrument(skip(state), fields(session = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
) -> Result<Json<CheckoutView>> {
    let session = live_session(&state, id).await?;
    let snapshot = session.snapshot();
    let cart = state.cart().summary(id).await?;

    let total = snapshot
        .fee
        .quote()
        .map(|quote| cart.subtotal.checked_add(quote.fee))
        .transpose()
        .map_err(CheckoutError::from)?;

    Ok(Json(CheckoutView {
        session: snapshot,
        cart,
        total,
    }))
}

/// Drain pending toasts.
///
/// GET /api/sessions/{id}/notifications
pub async fn notifications(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
) -> Result<Json<Vec<Notification>>> {
    let session = live_session(&state, id).await?;
    Ok(Json(session.drain_notifications()))
}

/// Place the order.
///
/// POST /api/sessions/{id}/orders
///
/// The response carries the order (if any) and every toast raised by the
/// attempt, so the outcome is reported exactly once.
#[instrument(skip(state), fields(session = %id))]
pub async fn place_order(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
) -> Result<Response> {
    let session = live_session(&state, id).await?;
    add_breadcrumb("checkout", "Place order", None);

    let result = session.place_order().await;
    let notifications = session.drain_notifications();

    let (status, order) = match result {
        Ok(order) => (StatusCode::CREATED, Some(order)),
        Err(e) => (AppError::from(e).status(), None),
    };

    Ok((
        status,
        Json(PlaceOrderResponse {
            order,
            notifications,
        }),
    )
        .into_response())
}
