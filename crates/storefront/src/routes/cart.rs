//! Cart route handlers.
//!
//! Every cart belongs to a live checkout session; requests for an unknown or
//! expired session are 404s. Once the session's order is placed the cart is
//! read-only.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use mbuli_core::{CheckoutSessionId, ProductId};

use super::checkout::{live_session, open_session};
use crate::error::{Result, add_breadcrumb};
use crate::models::CartSummary;
use crate::state::AppState;

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// Update quantity request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// Cart summary.
///
/// GET /api/sessions/{id}/cart
#[instrument(skip(state), fields(session = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
) -> Result<Json<CartSummary>> {
    live_session(&state, id).await?;
    Ok(Json(state.cart().summary(id).await?))
}

/// Add a product, or more of one already in the cart.
///
/// POST /api/sessions/{id}/cart/items
#[instrument(skip(state, request), fields(session = %id, product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    Path(id): Path<CheckoutSessionId>,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartSummary>> {
    open_session(&state, id).await?;
    let summary = state
        .cart()
        .add_item(id, request.product_id, request.quantity)
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", &request.product_id.to_string())]),
    );
    Ok(Json(summary))
}

/// Set a line's quantity. Zero or less removes it.
///
/// PATCH /api/sessions/{id}/cart/items/{product_id}
#[instrument(skip(state, request), fields(session = %id, product_id = %product_id))]
pub async fn update(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(CheckoutSessionId, ProductId)>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartSummary>> {
    open_session(&state, id).await?;
    let summary = state
        .cart()
        .set_quantity(id, product_id, request.quantity)
        .await?;
    Ok(Json(summary))
}

/// Remove a line.
///
/// DELETE /api/sessions/{id}/cart/items/{product_id}
#[instrument(skip(state), fields(session = %id, product_id = %product_id))]
pub async fn remove(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(CheckoutSessionId, ProductId)>,
) -> Result<Json<CartSummary>> {
    open_session(&state, id).await?;
    Ok(Json(state.cart().remove_item(id, product_id).await?))
}
