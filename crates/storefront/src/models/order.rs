//! Order types.
//!
//! An order is immutable once created. Only its status moves afterwards,
//! and only through the admin and delivery views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mbuli_core::{OrderId, OrderStatus, ProductId, Tzs};

/// Contact and delivery details entered at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub phone: String,
    pub address: String,
}

impl CustomerDetails {
    /// Names of the required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("phone", &self.phone),
            ("address", &self.address),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Tzs,
}

/// An order ready to be persisted.
///
/// Built by the order assembler; `total` is always `subtotal + delivery_fee`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer: CustomerDetails,
    pub lines: Vec<OrderLine>,
    pub subtotal: Tzs,
    pub delivery_fee: Tzs,
    pub distance_km: f64,
    pub total: Tzs,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub lines: Vec<OrderLine>,
    pub subtotal: Tzs,
    pub delivery_fee: Tzs,
    /// Estimated driving distance the fee was derived from.
    pub distance_km: f64,
    pub total: Tzs,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a persisted order from its parameters.
    #[must_use]
    pub fn from_new(id: OrderId, order: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_name: order.customer.name,
            customer_phone: order.customer.phone,
            delivery_address: order.customer.address,
            lines: order.lines,
            subtotal: order.subtotal,
            delivery_fee: order.delivery_fee,
            distance_km: order.distance_km,
            total: order.total,
            status: OrderStatus::Pending,
            created_at,
        }
    }
}
