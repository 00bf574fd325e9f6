//! Cart + fee → order.
//!
//! The assembler owns the only path from a cart to an order. Every check
//! runs before the store is touched, and the store writes the order, stock
//! and cart in one unit, so a failure leaves the cart as it was.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use mbuli_core::{CheckoutSessionId, MoneyError};

use crate::db::{RepositoryError, Store};
use crate::delivery::FeeQuote;
use crate::models::{CartLine, CartSummary, CustomerDetails, NewOrder, Order, OrderLine};
use crate::services::OrderHub;

/// Checkout input that cannot produce an order.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please fill in: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("the delivery fee has not been calculated yet")]
    FeeUnavailable,

    #[error("your cart is empty")]
    EmptyCart,

    #[error("only {available} of {product} available")]
    InsufficientStock { product: String, available: u32 },

    #[error("an order is already being placed")]
    PlacementInProgress,

    #[error("this checkout has already been completed")]
    AlreadyPlaced,
}

/// Errors from placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("order total overflow: {0}")]
    Total(#[from] MoneyError),

    /// The order could not be saved; the cart is untouched.
    #[error("failed to save order: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Build the order for `lines` without touching the store.
///
/// # Errors
///
/// Returns a validation error for blank customer fields, a missing fee, an
/// empty cart, or a line that exceeds stock on hand.
pub fn assemble(
    customer: &CustomerDetails,
    lines: Vec<CartLine>,
    quote: Option<&FeeQuote>,
) -> Result<NewOrder, CheckoutError> {
    let missing = customer.missing_fields();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing).into());
    }
    let quote = quote.ok_or(ValidationError::FeeUnavailable)?;
    if lines.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }
    if let Some(short) = lines.iter().find(|l| l.quantity > l.stock_units) {
        return Err(ValidationError::InsufficientStock {
            product: short.product_name.clone(),
            available: short.stock_units,
        }
        .into());
    }

    let summary = CartSummary::from_lines(lines)?;
    let total = summary.subtotal.checked_add(quote.fee)?;

    Ok(NewOrder {
        customer: CustomerDetails {
            name: customer.name.trim().to_string(),
            phone: customer.phone.trim().to_string(),
            address: customer.address.trim().to_string(),
        },
        lines: summary
            .lines
            .into_iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect(),
        subtotal: summary.subtotal,
        delivery_fee: quote.fee,
        distance_km: quote.distance_km.get(),
        total,
    })
}

/// Turns a cart and a resolved fee into a persisted order.
#[derive(Clone)]
pub struct OrderAssembler {
    store: Arc<dyn Store>,
    hub: OrderHub,
}

impl OrderAssembler {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, hub: OrderHub) -> Self {
        Self { store, hub }
    }

    /// Place the order for `cart`.
    ///
    /// On success the order is stored, stock is decremented, the cart is
    /// empty and the order is published to the hub.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` without touching the store, or
    /// `CheckoutError::Persistence` if the write fails, in which case the
    /// cart is unchanged.
    #[instrument(skip(self, customer, quote), fields(cart = %cart))]
    pub async fn place_order(
        &self,
        cart: CheckoutSessionId,
        customer: &CustomerDetails,
        quote: Option<&FeeQuote>,
    ) -> Result<Order, CheckoutError> {
        let lines = self.store.cart_lines(cart).await?;
        let order = assemble(customer, lines, quote)?;

        let order = self.store.commit_checkout(cart, order).await?;
        tracing::info!(
            order_id = %order.id,
            total = order.total.as_i64(),
            "Order placed"
        );

        self.hub.publish_placed(&order);
        Ok(order)
    }
}
