//! Delivery-fee estimation.
//!
//! # Pipeline
//!
//! ```text
//! address ──► FeeRecalculator (debounce, stale-result discard)
//!               │
//!               ▼
//!             FeeEstimator ──► RetryPolicy ──► DistanceResolver
//!               │
//!               ▼
//!             PricingPolicy (rate, clamp, round) ──► FeeQuote
//! ```
//!
//! The resolver is a black box that turns an origin/destination pair into a
//! driving distance. The storefront uses [`crate::claude::ClaudeDistanceResolver`].

pub mod estimator;
pub mod pricing;
pub mod recalculator;
pub mod resolver;
pub mod retry;

pub use estimator::{EstimationError, FeeEstimate, FeeEstimator, FeeQuote};
pub use pricing::{PricingError, PricingPolicy};
pub use recalculator::{FeeRecalculator, FeeState};
pub use resolver::{DistanceKm, DistanceResolver, InvalidDistance, ResolveError, RouteQuery};
pub use retry::RetryPolicy;
