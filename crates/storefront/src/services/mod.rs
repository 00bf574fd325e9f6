//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart operations (add, set quantity, remove, summary)
//! - `hub` - Shared order book for the admin and delivery views
//! - `notifications` - Toast notifications surfaced to the customer

pub mod cart;
pub mod hub;
pub mod notifications;

pub use cart::{CartError, CartService};
pub use hub::{OrderEvent, OrderHub};
pub use notifications::{Notification, NotificationLog, NotificationVariant, Notifier};
