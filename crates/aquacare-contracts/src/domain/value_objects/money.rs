//! Money Value Object
//!
//! Rupee amounts. Contracts, plans and collections are all priced in INR, so
//! the currency is fixed and only the amount varies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Non-negative INR amount
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Create a validated amount
    pub fn inr(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self(amount.round_dp(2)))
    }

    /// Whole rupees; cannot be negative by construction.
    pub fn rupees(amount: u32) -> Self {
        Self(Decimal::from(amount))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INR {:.2}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount cannot be negative")]
    Negative,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_negative() {
        assert!(matches!(Money::inr(dec!(-1)), Err(MoneyError::Negative)));
        assert!(Money::inr(dec!(0)).is_ok());
    }

    #[test]
    fn test_sum_and_display() {
        let total: Money = vec![Money::rupees(1499), Money::inr(dec!(0.5)).unwrap()]
            .into_iter()
            .sum();
        assert_eq!(total.amount(), dec!(1499.5));
        assert_eq!(total.to_string(), "INR 1499.50");
    }
}
