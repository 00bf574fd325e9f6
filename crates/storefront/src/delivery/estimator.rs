//! Address to delivery-fee estimation.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use mbuli_core::Tzs;

use super::pricing::{PricingError, PricingPolicy};
use super::resolver::{DistanceKm, DistanceResolver, InvalidDistance, ResolveError, RouteQuery};
use super::retry::RetryPolicy;

/// Where every delivery starts.
pub const DEFAULT_ORIGIN: &str = "Mbuli's Feast Farm, Mbezi Beach, Dar es Salaam, Tanzania";

/// Shorter addresses are treated as still being typed.
pub const DEFAULT_MIN_ADDRESS_LEN: usize = 10;

/// A priced delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeeQuote {
    /// Authoritative fee for checkout.
    pub fee: Tzs,
    /// Informational driving distance.
    pub distance_km: DistanceKm,
}

/// Outcome of an estimate that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeeEstimate {
    /// The address is too short to be worth resolving.
    Incomplete,
    Quoted(FeeQuote),
}

/// Why an estimate failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EstimationError {
    #[error("address could not be resolved: {0}")]
    Unresolvable(String),

    #[error("distance service failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("distance service returned an {0}")]
    InvalidDistance(#[from] InvalidDistance),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl From<(u32, ResolveError)> for EstimationError {
    fn from((attempts, error): (u32, ResolveError)) -> Self {
        match error {
            ResolveError::Unresolvable(message) => Self::Unresolvable(message),
            ResolveError::Transient(message) => Self::Exhausted { attempts, message },
        }
    }
}

/// Resolves a destination into a priced delivery.
#[derive(Clone)]
pub struct FeeEstimator {
    resolver: Arc<dyn DistanceResolver>,
    pricing: PricingPolicy,
    retry: RetryPolicy,
    origin: String,
    min_address_len: usize,
}

impl FeeEstimator {
    /// Create an estimator with the default pricing, retry policy and origin.
    #[must_use]
    pub fn new(resolver: Arc<dyn DistanceResolver>) -> Self {
        Self {
            resolver,
            pricing: PricingPolicy::default(),
            retry: RetryPolicy::default(),
            origin: DEFAULT_ORIGIN.to_string(),
            min_address_len: DEFAULT_MIN_ADDRESS_LEN,
        }
    }

    #[must_use]
    pub const fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    #[must_use]
    pub const fn with_min_address_len(mut self, min_address_len: usize) -> Self {
        self.min_address_len = min_address_len;
        self
    }

    #[must_use]
    pub const fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether `address` is long enough to send to the resolver.
    #[must_use]
    pub fn is_resolvable(&self, address: &str) -> bool {
        address.trim().chars().count() >= self.min_address_len
    }

    /// Estimate the delivery fee for `address`.
    ///
    /// Returns [`FeeEstimate::Incomplete`] without calling the resolver when
    /// the trimmed address is shorter than the minimum length.
    ///
    /// # Errors
    ///
    /// Returns `EstimationError` if the address cannot be resolved, the
    /// resolver keeps failing, or it returns a negative or non-finite distance.
    #[instrument(skip(self, address), fields(address_len = address.len()))]
    pub async fn estimate_fee(&self, address: &str) -> Result<FeeEstimate, EstimationError> {
        let destination = address.trim();
        if !self.is_resolvable(destination) {
            return Ok(FeeEstimate::Incomplete);
        }

        let route = RouteQuery {
            origin: self.origin.clone(),
            destination: destination.to_string(),
        };

        let km = self
            .retry
            .run(
                |attempt| {
                    tracing::debug!(attempt, "Resolving delivery distance");
                    self.resolver.resolve(&route)
                },
                ResolveError::is_transient,
            )
            .await?;

        let distance_km = DistanceKm::new(km)?;
        let fee = self.pricing.fee_for(distance_km)?;

        tracing::info!(distance_km = km, fee = fee.as_i64(), "Delivery fee estimated");
        Ok(FeeEstimate::Quoted(FeeQuote { fee, distance_km }))
    }
}
