//! Distance-to-fee pricing.
//!
//! `fee = km * rate`, clamped to `[min_fee, max_fee]`, then rounded half-up
//! to the nearest `rounding_step`. Both bounds must be multiples of the step
//! so rounding never leaves the range.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use mbuli_core::{MoneyError, Tzs};

use super::resolver::DistanceKm;

/// Shillings charged per kilometre.
pub const DEFAULT_RATE_PER_KM: u32 = 250;
/// Lowest fee charged, whatever the distance.
pub const DEFAULT_MIN_FEE: u32 = 1_500;
/// Highest fee charged, whatever the distance.
pub const DEFAULT_MAX_FEE: u32 = 6_000;
/// Fees are quoted in multiples of this.
pub const DEFAULT_ROUNDING_STEP: u32 = 100;

/// Errors from building or applying a [`PricingPolicy`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("minimum fee {min} exceeds maximum fee {max}")]
    InvertedBounds { min: Tzs, max: Tzs },

    #[error("rounding step must be greater than zero")]
    ZeroStep,

    #[error("fee bound {bound} is not a multiple of {step}")]
    UnalignedBound { bound: Tzs, step: Tzs },

    #[error("fee out of range: {0}")]
    Money(#[from] MoneyError),
}

/// Pricing constants for delivery fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    rate_per_km: Tzs,
    min_fee: Tzs,
    max_fee: Tzs,
    rounding_step: Tzs,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            rate_per_km: Tzs::from_shillings(DEFAULT_RATE_PER_KM),
            min_fee: Tzs::from_shillings(DEFAULT_MIN_FEE),
            max_fee: Tzs::from_shillings(DEFAULT_MAX_FEE),
            rounding_step: Tzs::from_shillings(DEFAULT_ROUNDING_STEP),
        }
    }
}

impl PricingPolicy {
    /// Build a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `min_fee > max_fee`, the step is zero, or either
    /// bound is not a multiple of the step.
    pub fn new(
        rate_per_km: Tzs,
        min_fee: Tzs,
        max_fee: Tzs,
        rounding_step: Tzs,
    ) -> Result<Self, PricingError> {
        if min_fee > max_fee {
            return Err(PricingError::InvertedBounds {
                min: min_fee,
                max: max_fee,
            });
        }
        if rounding_step == Tzs::ZERO {
            return Err(PricingError::ZeroStep);
        }
        for bound in [min_fee, max_fee] {
            if bound.as_i64() % rounding_step.as_i64() != 0 {
                return Err(PricingError::UnalignedBound {
                    bound,
                    step: rounding_step,
                });
            }
        }

        Ok(Self {
            rate_per_km,
            min_fee,
            max_fee,
            rounding_step,
        })
    }

    #[must_use]
    pub const fn rate_per_km(&self) -> Tzs {
        self.rate_per_km
    }

    #[must_use]
    pub const fn min_fee(&self) -> Tzs {
        self.min_fee
    }

    #[must_use]
    pub const fn max_fee(&self) -> Tzs {
        self.max_fee
    }

    #[must_use]
    pub const fn rounding_step(&self) -> Tzs {
        self.rounding_step
    }

    /// Fee for a driving distance.
    ///
    /// Distances too large to represent saturate to the maximum fee.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::Money` if the rounded fee cannot be represented,
    /// which cannot happen for a policy built through [`PricingPolicy::new`].
    pub fn fee_for(&self, distance: DistanceKm) -> Result<Tzs, PricingError> {
        let km = Decimal::from_f64(distance.get()).unwrap_or(Decimal::MAX);
        let raw = km
            .checked_mul(self.rate_per_km.to_decimal())
            .unwrap_or(Decimal::MAX);
        let clamped = raw.clamp(self.min_fee.to_decimal(), self.max_fee.to_decimal());

        let step = self.rounding_step.to_decimal();
        let steps = clamped
            .checked_div(step)
            .ok_or(PricingError::ZeroStep)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let fee = steps.checked_mul(step).ok_or(MoneyError::Overflow)?;

        Ok(Tzs::from_decimal(fee)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fee(km: f64) -> i64 {
        PricingPolicy::default()
            .fee_for(DistanceKm::new(km).unwrap())
            .unwrap()
            .as_i64()
    }

    #[test]
    fn test_zero_distance_charges_floor() {
        assert_eq!(fee(0.0), 1_500);
    }

    #[test]
    fn test_floor_distance() {
        assert_eq!(fee(6.0), 1_500);
    }

    #[test]
    fn test_ceiling_distance() {
        assert_eq!(fee(24.0), 6_000);
        assert_eq!(fee(250.0), 6_000);
    }

    #[test]
    fn test_within_bounds() {
        assert_eq!(fee(10.0), 2_500);
    }

    #[test]
    fn test_rounds_half_up() {
        // 2750 sits exactly between 2700 and 2800
        assert_eq!(fee(11.0), 2_800);
        assert_eq!(fee(10.1), 2_500);
        assert_eq!(fee(10.3), 2_600);
    }

    #[test]
    fn test_bounds_hold_over_range() {
        for tenth in 0..=1_000 {
            let fee = fee(f64::from(tenth) / 10.0);
            assert!((1_500..=6_000).contains(&fee), "fee {fee} out of bounds");
            assert_eq!(fee % 100, 0, "fee {fee} not rounded");
        }
    }

    #[test]
    fn test_huge_distance_saturates() {
        assert_eq!(fee(f64::MAX), 6_000);
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let err = PricingPolicy::new(
            Tzs::from_shillings(250),
            Tzs::from_shillings(7_000),
            Tzs::from_shillings(6_000),
            Tzs::from_shillings(100),
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::InvertedBounds { .. }));
    }

    #[test]
    fn test_rejects_unaligned_bound() {
        let err = PricingPolicy::new(
            Tzs::from_shillings(250),
            Tzs::from_shillings(1_550),
            Tzs::from_shillings(6_000),
            Tzs::from_shillings(100),
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::UnalignedBound { .. }));
    }

    #[test]
    fn test_rejects_zero_step() {
        let err = PricingPolicy::new(
            Tzs::from_shillings(250),
            Tzs::from_shillings(1_500),
            Tzs::from_shillings(6_000),
            Tzs::ZERO,
        )
        .unwrap_err();
        assert_eq!(err, PricingError::ZeroStep);
    }
}
