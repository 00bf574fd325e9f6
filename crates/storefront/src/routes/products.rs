//! Product catalogue route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use mbuli_core::{ProductId, StockStatus};

use crate::error::{AppError, Result};
use crate::models::Product;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub stock_status: Option<StockStatus>,
}

/// List products.
///
/// GET /api/products
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = state.store().list_products(query.stock_status).await?;
    Ok(Json(products))
}

/// Product detail.
///
/// GET /api/products/{id}
#[instrument(skip(state), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .store()
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
}
