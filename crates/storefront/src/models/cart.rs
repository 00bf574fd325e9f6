//! Cart types.
//!
//! A cart belongs to exactly one checkout session. Items keep the unit price
//! the product had when it was first added, so a later catalogue price
//! change does not alter a cart the customer is already checking out.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mbuli_core::{MoneyError, ProductId, StockStatus, Tzs};

/// A stored cart row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price snapshot taken when the product was added.
    pub unit_price: Tzs,
    pub added_at: DateTime<Utc>,
}

/// A cart item joined with the product it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: Tzs,
    /// Units currently on hand for the product.
    pub stock_units: u32,
    pub stock_status: StockStatus,
}

impl CartLine {
    /// Price of the line (`unit_price * quantity`).
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the line total does not fit.
    pub fn line_total(&self) -> Result<Tzs, MoneyError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Cart contents with derived totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    /// Total number of units across all lines.
    pub item_count: u32,
    pub subtotal: Tzs,
}

impl CartSummary {
    /// Summarize cart lines.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the subtotal does not fit.
    pub fn from_lines(lines: Vec<CartLine>) -> Result<Self, MoneyError> {
        let subtotal = Tzs::try_sum(
            lines
                .iter()
                .map(CartLine::line_total)
                .collect::<Result<Vec<_>, _>>()?,
        )?;
        let item_count = lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity));

        Ok(Self {
            lines,
            item_count,
            subtotal,
        })
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, price: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            product_name: format!("Product {id}"),
            image_url: None,
            quantity,
            unit_price: Tzs::new(price).unwrap(),
            stock_units: 50,
            stock_status: StockStatus::InStock,
        }
    }

    #[test]
    fn test_summary_totals() {
        let summary = CartSummary::from_lines(vec![line(1, 15_000, 2), line(2, 9_000, 1)]).unwrap();
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.subtotal.as_i64(), 39_000);
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_empty_summary() {
        let summary = CartSummary::from_lines(Vec::new()).unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.subtotal, Tzs::ZERO);
        assert_eq!(summary.item_count, 0);
    }
}
