//! Money amounts in Tanzanian shillings.
//!
//! Prices, delivery fees and order totals are quoted in whole shillings, so
//! the amount is stored as an integer. Arithmetic is checked; an overflow is
//! an error rather than a wrapped total.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing or combining [`Tzs`] amounts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount has a fractional part.
    #[error("amount must be a whole number of shillings")]
    Fractional,
    /// The amount does not fit in 64 bits.
    #[error("amount overflow")]
    Overflow,
}

/// A non-negative amount of Tanzanian shillings.
///
/// ```
/// use mbuli_core::Tzs;
///
/// let price = Tzs::new(15_000).unwrap();
/// let line = price.checked_mul(2).unwrap();
/// assert_eq!(line.to_string(), "30,000 TZS");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct Tzs(i64);

impl Tzs {
    /// Zero shillings.
    pub const ZERO: Self = Self(0);

    /// ISO 4217 currency code.
    pub const CURRENCY_CODE: &'static str = "TZS";

    /// Create an amount from whole shillings.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` if `amount` is below zero.
    pub const fn new(amount: i64) -> Result<Self, MoneyError> {
        if amount < 0 {
            return Err(MoneyError::Negative);
        }
        Ok(Self(amount))
    }

    /// Create an amount from an unsigned number of shillings.
    #[must_use]
    pub fn from_shillings(amount: u32) -> Self {
        Self(i64::from(amount))
    }

    /// Convert an exact decimal amount.
    ///
    /// # Errors
    ///
    /// Returns an error if the decimal is negative, fractional, or too large.
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        if !amount.fract().is_zero() {
            return Err(MoneyError::Fractional);
        }
        amount.to_i64().map(Self).ok_or(MoneyError::Overflow)
    }

    /// The amount in whole shillings.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// The amount as an exact decimal.
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the sum does not fit.
    pub const fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        match self.0.checked_add(other.0) {
            Some(sum) => Ok(Self(sum)),
            None => Err(MoneyError::Overflow),
        }
    }

    /// Multiply by a quantity.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the product does not fit.
    pub fn checked_mul(self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Sum an iterator of amounts, failing on overflow.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the total does not fit.
    pub fn try_sum<I>(amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |acc, amount| acc.checked_add(amount))
    }
}

impl fmt::Display for Tzs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        write!(f, "{grouped} {}", Self::CURRENCY_CODE)
    }
}

impl TryFrom<i64> for Tzs {
    type Error = MoneyError;

    fn try_from(amount: i64) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Tzs> for i64 {
    fn from(amount: Tzs) -> Self {
        amount.0
    }
}

impl<'a> Sum<&'a Self> for Tzs {
    /// Saturating sum, for display totals only. Use [`Tzs::try_sum`] when
    /// the result is persisted.
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        Self(iter.fold(0_i64, |acc, amount| acc.saturating_add(amount.0)))
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Tzs {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Tzs {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Tzs {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
