//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                    - Liveness
//! GET    /health/ready                              - Store connectivity
//!
//! # Catalogue
//! GET    /api/products?stock_status=in-stock        - Product listing
//! GET    /api/products/{id}                         - Product detail
//!
//! # Checkout sessions
//! POST   /api/sessions                              - Start a checkout session
//! DELETE /api/sessions/{id}                         - Abandon a session
//! GET    /api/sessions/{id}/cart                    - Cart summary
//! POST   /api/sessions/{id}/cart/items              - Add item
//! PATCH  /api/sessions/{id}/cart/items/{product_id} - Set quantity (<= 0 removes)
//! DELETE /api/sessions/{id}/cart/items/{product_id} - Remove item
//! PUT    /api/sessions/{id}/contact                 - Name and phone
//! PUT    /api/sessions/{id}/address                 - Address edit (debounced fee)
//! GET    /api/sessions/{id}/checkout                - Phase, fee and totals
//! GET    /api/sessions/{id}/notifications           - Drain pending toasts
//! POST   /api/sessions/{id}/orders                  - Place order
//!
//! # Orders (admin and delivery dashboards)
//! GET    /api/orders?status=pending&open=true       - Order list
//! GET    /api/orders/latest                         - Most recent order
//! GET    /api/orders/events                         - SSE order stream
//! GET    /api/orders/{id}                           - Order detail
//! PATCH  /api/orders/{id}/status                    - Advance status
//! ```

pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the checkout session routes router.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::create_session))
        .route("/{id}", delete(checkout::abandon))
        .route("/{id}/cart", get(cart::show))
        .route("/{id}/cart/items", post(cart::add))
        .route(
            "/{id}/cart/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
        .route("/{id}/contact", put(checkout::update_contact))
        .route("/{id}/address", put(checkout::update_address))
        .route("/{id}/checkout", get(checkout::show))
        .route("/{id}/notifications", get(checkout::notifications))
        .route("/{id}/orders", post(checkout::place_order))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/latest", get(orders::latest))
        .route("/events", get(orders::events))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", patch(orders::update_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/products", product_routes())
        .nest("/api/sessions", session_routes())
        .nest("/api/orders", order_routes())
}
