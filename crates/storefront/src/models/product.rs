//! Product catalogue types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mbuli_core::{ProductId, StockStatus, Tzs};

/// A product offered in the shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name (e.g., "Whole Chicken").
    pub name: String,
    /// Short marketing description.
    pub description: String,
    /// Current unit price.
    pub price: Tzs,
    /// Product photo URL.
    pub image_url: Option<String>,
    /// Units on hand.
    pub stock_units: u32,
    /// Availability derived from `stock_units`.
    pub stock_status: StockStatus,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether the product can be added to a cart.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        !matches!(self.stock_status, StockStatus::OutOfStock)
    }
}

/// Parameters for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Tzs,
    pub image_url: Option<String>,
    pub stock_units: u32,
}

impl NewProduct {
    /// The stock status a product created from these parameters starts with.
    #[must_use]
    pub const fn stock_status(&self) -> StockStatus {
        StockStatus::from_units(self.stock_units)
    }
}
