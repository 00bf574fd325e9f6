//! Status enums for orders and products.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a customer order.
///
/// Orders are created as `Pending` by checkout. The admin and delivery
/// dashboards move them forward; checkout never changes a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Whether the order still needs to be delivered.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Whether an order in this status may move to `next`.
    ///
    /// Pending -> Processing -> Completed, and any open order may be
    /// cancelled. Completed and cancelled orders are final.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Completed | Self::Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Availability of a product in the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "stock_status", rename_all = "kebab-case")
)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus {
    #[default]
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Units at or below which a product is reported as low on stock.
    pub const LOW_STOCK_THRESHOLD: u32 = 10;

    /// Derive the status from the number of units on hand.
    #[must_use]
    pub const fn from_units(units: u32) -> Self {
        if units == 0 {
            Self::OutOfStock
        } else if units <= Self::LOW_STOCK_THRESHOLD {
            Self::LowStock
        } else {
            Self::InStock
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InStock => write!(f, "in-stock"),
            Self::LowStock => write!(f, "low-stock"),
            Self::OutOfStock => write!(f, "out-of-stock"),
        }
    }
}

impl std::str::FromStr for StockStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-stock" => Ok(Self::InStock),
            "low-stock" => Ok(Self::LowStock),
            "out-of-stock" => Ok(Self::OutOfStock),
            _ => Err(format!("invalid stock status: {s}")),
        }
    }
}
