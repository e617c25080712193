//! Money type with integer minor units and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are stored as `i64` minor units (cents for USD). Arithmetic is
//! checked and only ever combines values of the same currency.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by money arithmetic and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined.
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left operand.
        left: Currency,
        /// Currency of the right operand.
        right: Currency,
    },

    /// The result does not fit in the minor-unit range.
    #[error("Amount overflow")]
    Overflow,

    /// The decimal value has more fractional digits than the currency allows.
    #[error("Amount {amount} has more precision than {currency} allows")]
    PrecisionLoss {
        /// The offending amount.
        amount: Decimal,
        /// The target currency.
        currency: Currency,
    },

    /// The currency code is not three ASCII letters.
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    /// The amount string could not be parsed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// ISO 4217 currency code.
///
/// Any three-letter alphabetic code is accepted; codes are normalized to
/// uppercase. The minor-unit exponent comes from a fixed table and defaults
/// to 2 for codes the table does not list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// US Dollar
    pub const USD: Self = Self(*b"USD");
    /// Euro
    pub const EUR: Self = Self(*b"EUR");
    /// Pound Sterling
    pub const GBP: Self = Self(*b"GBP");
    /// Canadian Dollar
    pub const CAD: Self = Self(*b"CAD");
    /// Australian Dollar
    pub const AUD: Self = Self(*b"AUD");
    /// Japanese Yen
    pub const JPY: Self = Self(*b"JPY");

    /// Parses and normalizes a currency code.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidCurrency` unless the code is exactly three
    /// ASCII letters.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let bytes = code.trim().as_bytes();
        match bytes {
            [a, b, c] if bytes.iter().all(u8::is_ascii_alphabetic) => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(MoneyError::InvalidCurrency(code.to_string())),
        }
    }

    /// Returns the three-letter code.
    #[must_use]
    pub fn code(&self) -> &str {
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Number of fractional digits in the currency's minor unit.
    #[must_use]
    pub const fn minor_unit_exponent(&self) -> u32 {
        match &self.0 {
            b"JPY" | b"KRW" | b"VND" | b"CLP" | b"ISK" | b"XAF" | b"XOF" => 0,
            b"BHD" | b"KWD" | b"OMR" | b"JOD" | b"TND" => 3,
            _ => 2,
        }
    }

    /// Returns the display symbol, if the currency has one in the fixed table.
    #[must_use]
    pub const fn symbol(&self) -> Option<&'static str> {
        match &self.0 {
            b"USD" => Some("$"),
            b"CAD" => Some("CA$"),
            b"AUD" => Some("A$"),
            b"NZD" => Some("NZ$"),
            b"EUR" => Some("€"),
            b"GBP" => Some("£"),
            b"JPY" => Some("¥"),
            b"INR" => Some("₹"),
            b"CHF" => Some("CHF"),
            b"MXN" => Some("MX$"),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

/// A monetary amount in integer minor units of one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the smallest currency unit (e.g., cents).
    pub minor_units: i64,
    /// ISO 4217 currency.
    pub currency: Currency,
}

impl Money {
    /// Creates a Money value from minor units.
    #[must_use]
    pub const fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::from_minor(0, currency)
    }

    /// Converts a decimal amount in major units (e.g., `12.34` dollars).
    ///
    /// # Errors
    ///
    /// Returns `PrecisionLoss` if the value has more fractional digits than
    /// the currency's minor unit, or `Overflow` if it does not fit.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        let exponent = currency.minor_unit_exponent();
        if amount.normalize().scale() > exponent {
            return Err(MoneyError::PrecisionLoss { amount, currency });
        }
        let minor = amount
            .checked_mul(Decimal::from(10_i64.pow(exponent)))
            .and_then(|v| v.to_i64())
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(minor, currency))
    }

    /// Parses a major-unit string such as `"1234.50"`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for unparseable input, otherwise as
    /// [`Money::from_decimal`].
    pub fn parse(amount: &str, currency: Currency) -> Result<Self, MoneyError> {
        let value = Decimal::from_str(amount.trim())
            .map_err(|_| MoneyError::InvalidAmount(amount.to_string()))?;
        Self::from_decimal(value, currency)
    }

    /// Returns the amount in major units with the currency's scale.
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.minor_units, self.currency.minor_unit_exponent())
    }

    /// Adds two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` or `Overflow`.
    pub fn add(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        self.minor_units
            .checked_add(other.minor_units)
            .map(|m| Self::from_minor(m, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Subtracts `other` from `self`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` or `Overflow`.
    pub fn subtract(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        self.minor_units
            .checked_sub(other.minor_units)
            .map(|m| Self::from_minor(m, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Multiplies by a decimal scalar, rounding to the nearest minor unit
    /// with Banker's Rounding (MidpointNearestEven).
    ///
    /// # Errors
    ///
    /// Returns `Overflow` if the product does not fit.
    pub fn multiply(&self, factor: Decimal) -> Result<Self, MoneyError> {
        Decimal::from(self.minor_units)
            .checked_mul(factor)
            .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
            .and_then(|v| v.to_i64())
            .map(|m| Self::from_minor(m, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Compares two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` when currencies differ.
    pub fn compare(&self, other: &Self) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.minor_units.cmp(&other.minor_units))
    }

    /// Sums an iterator of amounts, starting from zero in `currency`.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` or `Overflow`.
    pub fn sum<'a, I>(currency: Currency, amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        amounts
            .into_iter()
            .try_fold(Self::zero(currency), |acc, m| acc.add(m))
    }

    /// Returns the negated amount.
    ///
    /// # Errors
    ///
    /// Returns `Overflow` for `i64::MIN`.
    pub fn negate(&self) -> Result<Self, MoneyError> {
        self.minor_units
            .checked_neg()
            .map(|m| Self::from_minor(m, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Returns the absolute amount.
    ///
    /// # Errors
    ///
    /// Returns `Overflow` for `i64::MIN`.
    pub fn abs(&self) -> Result<Self, MoneyError> {
        self.minor_units
            .checked_abs()
            .map(|m| Self::from_minor(m, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Returns `self`, or zero if `self` is negative.
    #[must_use]
    pub const fn floor_at_zero(&self) -> Self {
        if self.minor_units < 0 {
            Self::zero(self.currency)
        } else {
            *self
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.minor_units > 0
    }

    fn ensure_same_currency(&self, other: &Self) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            })
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    #[test]
    fn test_currency_normalizes_case() {
        let currency = Currency::new("usd").unwrap();
        assert_eq!(currency, Currency::USD);
        assert_eq!(currency.to_string(), "USD");
    }

    #[rstest]
    #[case("")]
    #[case("US")]
    #[case("USDX")]
    #[case("U$D")]
    fn test_currency_rejects_malformed(#[case] code: &str) {
        assert!(matches!(
            Currency::new(code),
            Err(MoneyError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn test_currency_serde_as_string() {
        let json = serde_json::to_string(&Currency::EUR).unwrap();
        assert_eq!(json, "\"EUR\"");
        let parsed: Currency = serde_json::from_str("\"gbp\"").unwrap();
        assert_eq!(parsed, Currency::GBP);
        assert!(serde_json::from_str::<Currency>("\"12\"").is_err());
    }

    #[test]
    fn test_minor_unit_exponent() {
        assert_eq!(Currency::USD.minor_unit_exponent(), 2);
        assert_eq!(Currency::JPY.minor_unit_exponent(), 0);
        assert_eq!(Currency::new("KWD").unwrap().minor_unit_exponent(), 3);
        assert_eq!(Currency::new("XYZ").unwrap().minor_unit_exponent(), 2);
    }

    #[test]
    fn test_add_and_subtract() {
        assert_eq!(usd(150).add(&usd(250)).unwrap(), usd(400));
        assert_eq!(usd(150).subtract(&usd(250)).unwrap(), usd(-100));
    }

    #[test]
    fn test_mixed_currency_rejected() {
        let eur = Money::from_minor(100, Currency::EUR);
        assert_eq!(
            usd(100).add(&eur),
            Err(MoneyError::CurrencyMismatch {
                left: Currency::USD,
                right: Currency::EUR,
            })
        );
        assert!(usd(100).subtract(&eur).is_err());
        assert!(usd(100).compare(&eur).is_err());
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(usd(i64::MAX).add(&usd(1)), Err(MoneyError::Overflow));
        assert_eq!(usd(i64::MIN).negate(), Err(MoneyError::Overflow));
    }

    #[rstest]
    #[case(10_000, dec!(2), 20_000)]
    #[case(333, dec!(0.5), 166)] // 166.5 -> 166 (even)
    #[case(335, dec!(0.5), 168)] // 167.5 -> 168 (even)
    #[case(1_000, dec!(1.25), 1_250)]
    #[case(2_500, dec!(0.333), 832)] // 832.5 -> 832
    fn test_multiply_uses_bankers_rounding(
        #[case] minor: i64,
        #[case] factor: Decimal,
        #[case] expected: i64,
    ) {
        assert_eq!(usd(minor).multiply(factor).unwrap(), usd(expected));
    }

    #[test]
    fn test_from_decimal_and_back() {
        let money = Money::from_decimal(dec!(1234.56), Currency::USD).unwrap();
        assert_eq!(money.minor_units, 123_456);
        assert_eq!(money.to_decimal(), dec!(1234.56));

        let yen = Money::from_decimal(dec!(500), Currency::JPY).unwrap();
        assert_eq!(yen.minor_units, 500);
    }

    #[test]
    fn test_from_decimal_rejects_excess_precision() {
        assert!(matches!(
            Money::from_decimal(dec!(1.005), Currency::USD),
            Err(MoneyError::PrecisionLoss { .. })
        ));
        assert!(matches!(
            Money::from_decimal(dec!(1.5), Currency::JPY),
            Err(MoneyError::PrecisionLoss { .. })
        ));
        // Trailing zeros are not extra precision.
        assert!(Money::from_decimal(dec!(1.500), Currency::USD).is_ok());
    }

    #[test]
    fn test_parse() {
        assert_eq!(Money::parse(" 12.30 ", Currency::USD).unwrap(), usd(1230));
        assert!(matches!(
            Money::parse("twelve", Currency::USD),
            Err(MoneyError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_predicates_and_compare() {
        assert!(usd(0).is_zero());
        assert!(usd(-1).is_negative());
        assert!(usd(1).is_positive());
        assert_eq!(usd(5).compare(&usd(7)).unwrap(), Ordering::Less);
        assert_eq!(usd(-5).floor_at_zero(), usd(0));
        assert_eq!(usd(5).floor_at_zero(), usd(5));
    }

    #[test]
    fn test_sum() {
        let amounts = [usd(100), usd(250), usd(-50)];
        assert_eq!(Money::sum(Currency::USD, &amounts).unwrap(), usd(300));
        assert_eq!(Money::sum(Currency::USD, std::iter::empty()).unwrap(), usd(0));
    }

    #[test]
    fn test_display() {
        assert_eq!(usd(50_000).to_string(), "500.00 USD");
        assert_eq!(Money::from_minor(-7, Currency::USD).to_string(), "-0.07 USD");
        assert_eq!(Money::from_minor(1200, Currency::JPY).to_string(), "1200 JPY");
    }

    #[test]
    fn test_money_serde_shape() {
        let json = serde_json::to_value(usd(1234)).unwrap();
        assert_eq!(json["minor_units"], 1234);
        assert_eq!(json["currency"], "USD");
    }
}
