//! Exact decimal money values.
//!
//! All ledger arithmetic goes through `rust_decimal::Decimal`; floats only ever appear
//! at the input boundary (`Amount::from_f64`) and are rejected when non-finite.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Number of fractional digits of the currency unit.
pub const CURRENCY_SCALE: u32 = 2;

/// Signed monetary value (totals, balances, differences).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Round half away from zero to the currency unit.
    pub fn round_to_currency(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Comparisons against zero happen at currency precision so residue below the
    /// smallest unit never keeps a settled balance open.
    pub fn is_settled(self) -> bool {
        self.round_to_currency().0 <= Decimal::ZERO
    }

    pub fn is_positive(self) -> bool {
        self.round_to_currency().0 > Decimal::ZERO
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.round_to_currency().0)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::invalid_amount("amount", format!("unparsable '{s}': {e}")))
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl ValueObject for Money {}

/// Strictly positive amount expressed in whole currency units (at most two
/// fractional digits). The only amount type a ledger entry or payment accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Validate `value` for the request field `field`.
    pub fn for_field(field: &'static str, value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::invalid_amount(
                field,
                format!("must be greater than zero (got {value})"),
            ));
        }
        if value.normalize().scale() > CURRENCY_SCALE {
            return Err(DomainError::invalid_amount(
                field,
                format!("more than {CURRENCY_SCALE} decimal places (got {value})"),
            ));
        }
        Ok(Self(value))
    }

    pub fn new(value: Decimal) -> DomainResult<Self> {
        Self::for_field("amount", value)
    }

    /// Parse user input such as `"250.00"`.
    pub fn parse(field: &'static str, input: &str) -> DomainResult<Self> {
        let value = Decimal::from_str(input.trim()).map_err(|e| {
            DomainError::invalid_amount(field, format!("unparsable '{input}': {e}"))
        })?;
        Self::for_field(field, value)
    }

    /// Accept a float from a loosely typed caller; rounded to the currency unit.
    pub fn from_f64(field: &'static str, value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::invalid_amount(field, "must be a finite number"));
        }
        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| DomainError::invalid_amount(field, "out of range"))?;
        Self::for_field(field, Money(decimal).round_to_currency().0)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn money(&self) -> Money {
        Money(self.0)
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl From<Amount> for Money {
    fn from(value: Amount) -> Self {
        Money(value.0)
    }
}

impl ValueObject for Amount {}
