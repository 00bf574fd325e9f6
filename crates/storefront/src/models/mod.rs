//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database row types.

pub mod cart;
pub mod order;
pub mod product;

pub use cart::{CartItem, CartLine, CartSummary};
pub use order::{CustomerDetails, NewOrder, Order, OrderLine};
pub use product::{NewProduct, Product};
