//! Money as an integer count of minor currency units.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing an [`Amount`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    /// The value was zero or negative.
    #[error("amount must be a positive number of minor units (got {0})")]
    NotPositive(i64),
}

/// An amount of money in minor currency units (cents, paise, ...).
///
/// Charged amounts are immutable once an order is created, so the type only
/// needs construction and read access. Construction rejects non-positive
/// values; everything downstream can rely on `amount > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Construct an amount from a count of minor units.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::NotPositive`] if `minor_units <= 0`.
    pub const fn new(minor_units: i64) -> Result<Self, AmountError> {
        if minor_units <= 0 {
            return Err(AmountError::NotPositive(minor_units));
        }
        Ok(Self(minor_units))
    }

    /// The raw count of minor units.
    #[must_use]
    pub const fn minor_units(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Amount {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Amount {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Amount {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_amount() {
        let amount = Amount::new(50_000).unwrap();
        assert_eq!(amount.minor_units(), 50_000);
    }

    #[test]
    fn test_zero_rejected() {
        assert_eq!(Amount::new(0), Err(AmountError::NotPositive(0)));
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(Amount::new(-1), Err(AmountError::NotPositive(-1)));
    }

    #[test]
    fn test_serde_rejects_non_positive() {
        assert!(serde_json::from_str::<Amount>("0").is_err());
        let amount: Amount = serde_json::from_str("500").unwrap();
        assert_eq!(amount.minor_units(), 500);
    }
}
