//! Distance resolution seam.

use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

/// A driving route to measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteQuery {
    /// Where deliveries leave from.
    pub origin: String,
    /// Customer-supplied delivery address.
    pub destination: String,
}

/// Errors a resolver can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Network or service hiccup; worth retrying.
    #[error("distance service unavailable: {0}")]
    Transient(String),

    /// The address cannot be resolved no matter how often we ask.
    #[error("address could not be resolved: {0}")]
    Unresolvable(String),
}

impl ResolveError {
    /// Whether a retry could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A distance the resolver returned that is not a usable number of kilometres.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
#[error("invalid distance: {0} km")]
pub struct InvalidDistance(pub f64);

/// A finite, non-negative driving distance in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct DistanceKm(f64);

impl DistanceKm {
    /// Validate a raw distance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDistance` for negative, NaN or infinite values.
    pub fn new(km: f64) -> Result<Self, InvalidDistance> {
        if km.is_finite() && km >= 0.0 {
            Ok(Self(km))
        } else {
            Err(InvalidDistance(km))
        }
    }

    /// The distance in kilometres.
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

/// Turns a route into a driving distance.
///
/// Implementations return the raw number they got; validation happens in the
/// estimator so a bad upstream value is reported rather than clamped.
pub trait DistanceResolver: Send + Sync {
    /// Resolve the driving distance for `route`, in kilometres.
    fn resolve<'a>(&'a self, route: &'a RouteQuery) -> BoxFuture<'a, Result<f64, ResolveError>>;
}
