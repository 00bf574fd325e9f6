//! Checkout: customer details, debounced delivery fee, order placement.
//!
//! - [`assembler`] - Validates a cart + fee and commits the order
//! - [`session`] - Per-customer state machine and notifications
//! - [`registry`] - Live sessions with idle expiry

pub mod assembler;
pub mod registry;
pub mod session;

pub use assembler::{CheckoutError, OrderAssembler, ValidationError, assemble};
pub use registry::SessionRegistry;
pub use session::{CheckoutPhase, CheckoutSession, SessionSnapshot};
